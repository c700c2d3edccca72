//! Pagination types shared by every listing query.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Page size is kept at least 1
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size: page_size.max(1),
        }
    }

    /// Cap the page size at `max`
    pub fn clamped(self, max: u32) -> Self {
        Self::new(self.page, self.page_size.min(max.max(1)))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Slice an already ordered collection
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset() as usize)
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = i64::from(request.page_size);
        Self {
            content,
            page: request.page,
            page_size: request.page_size,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offset() {
        let request = PageRequest::new(3, 10);
        assert_eq!(request.offset(), 30);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn test_page_request_clamped() {
        assert_eq!(PageRequest::new(0, 500).clamped(100).page_size, 100);
        assert_eq!(PageRequest::new(0, 0).page_size, 1);
    }

    #[test]
    fn test_slice() {
        let items: Vec<i32> = (1..=25).collect();
        assert_eq!(PageRequest::new(2, 10).slice(&items), vec![21, 22, 23, 24, 25]);
        assert!(PageRequest::new(3, 10).slice(&items).is_empty());
    }

    #[test]
    fn test_total_pages() {
        let page: Page<i32> = Page::new(vec![], PageRequest::new(0, 10), 21);
        assert_eq!(page.total_pages, 3);

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
