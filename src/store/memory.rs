//! In-memory store
//!
//! Whole-state store behind one async mutex. A unit of work holds the lock
//! for its whole lifetime and edits a staged copy, which replaces the shared
//! state on commit. Units of work are therefore serialized and atomic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    Car, CarId, CarView, DomainError, Engine, EngineId, NewCar, NewEngine, NewUser, Role, RoleId,
    User, UserId, UserSummary, ROLE_ADMIN, ROLE_USER,
};

use super::{
    AccountRepository, CatalogRepository, Page, PageRequest, Store, StoreError, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct State {
    engines: BTreeMap<EngineId, Engine>,
    cars: BTreeMap<CarId, Car>,
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn car_view(&self, car: &Car) -> Option<CarView> {
        self.engines
            .get(&car.engine_id)
            .map(|engine| CarView::new(car, engine))
    }

    fn require_engine(&self, id: EngineId) -> Result<(), StoreError> {
        if self.engines.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(DomainError::engine_not_found(id)))
        }
    }

    fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username() == username)
    }
}

/// Store kept entirely in process memory
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Create an empty store with the `ROLE_ADMIN` (1) and `ROLE_USER` (2) roles
    pub fn new() -> Self {
        let mut state = State::default();
        for (id, name) in [(1, ROLE_ADMIN), (2, ROLE_USER)] {
            state.roles.insert(
                id,
                Role {
                    id,
                    name: name.to_string(),
                },
            );
        }
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit of work over [`InMemoryStore`]
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx { guard, staged })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.user_by_username(username).cloned())
    }

    async fn find_car_view(&self, id: CarId) -> Result<Option<CarView>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.cars.get(&id).and_then(|car| state.car_view(car)))
    }

    async fn list_cars(&self, page: PageRequest) -> Result<Page<CarView>, StoreError> {
        let state = self.state.lock().await;
        let views: Vec<CarView> = state
            .cars
            .values()
            .filter_map(|car| state.car_view(car))
            .collect();
        Ok(Page::new(page.slice(&views), page, views.len() as i64))
    }

    async fn list_user_cars(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<CarView>, StoreError> {
        let state = self.state.lock().await;
        let views: Vec<CarView> = state
            .users
            .get(&user_id)
            .map(|user| {
                user.car_ids()
                    .iter()
                    .filter_map(|id| state.cars.get(id))
                    .filter_map(|car| state.car_view(car))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Page::new(page.slice(&views), page, views.len() as i64))
    }

    async fn list_engines(
        &self,
        capacity: Option<f64>,
        page: PageRequest,
    ) -> Result<Page<Engine>, StoreError> {
        let state = self.state.lock().await;
        let engines: Vec<Engine> = state
            .engines
            .values()
            .filter(|e| capacity.map_or(true, |c| e.capacity == c))
            .cloned()
            .collect();
        Ok(Page::new(page.slice(&engines), page, engines.len() as i64))
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<UserSummary>, StoreError> {
        let state = self.state.lock().await;
        let users: Vec<UserSummary> = state
            .users
            .values()
            .map(|u| UserSummary {
                id: u.id(),
                username: u.username().to_string(),
                balance_in_cents: u.balance().cents(),
                owned_cars_count: u.car_ids().len() as i64,
            })
            .collect();
        Ok(Page::new(page.slice(&users), page, users.len() as i64))
    }
}

impl AccountRepository for InMemoryTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.staged.user_by_username(username).cloned())
    }

    async fn find_role(&mut self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.staged.roles.get(&id).cloned())
    }

    async fn insert_user(&mut self, new: NewUser) -> Result<User, StoreError> {
        if self.staged.user_by_username(&new.username).is_some() {
            return Err(StoreError::Conflict(format!(
                "Username '{}' is already taken",
                new.username
            )));
        }

        let mut roles = Vec::with_capacity(new.role_ids.len());
        for role_id in &new.role_ids {
            let role = self.staged.roles.get(role_id).cloned().ok_or_else(|| {
                StoreError::Conflict(format!("Role with id {} does not exist", role_id))
            })?;
            roles.push(role);
        }

        let id = self.staged.next_id();
        let user = User::from_parts(
            id,
            new.username,
            new.password_hash,
            new.balance,
            BTreeSet::new(),
            roles,
            Utc::now(),
        );
        self.staged.users.insert(id, user.clone());
        Ok(user)
    }

    async fn save_user(&mut self, user: &User) -> Result<(), StoreError> {
        if let Some(car_id) = user
            .car_ids()
            .iter()
            .find(|id| !self.staged.cars.contains_key(id))
        {
            return Err(StoreError::Conflict(format!(
                "Car with id {} does not exist",
                car_id
            )));
        }
        self.staged.users.insert(user.id(), user.clone());
        Ok(())
    }
}

impl CatalogRepository for InMemoryTx {
    async fn lock_car(&mut self, id: CarId) -> Result<Option<Car>, StoreError> {
        Ok(self.staged.cars.get(&id).cloned())
    }

    async fn find_car(&mut self, id: CarId) -> Result<Option<Car>, StoreError> {
        Ok(self.staged.cars.get(&id).cloned())
    }

    async fn find_engine(&mut self, id: EngineId) -> Result<Option<Engine>, StoreError> {
        Ok(self.staged.engines.get(&id).cloned())
    }

    async fn insert_car(&mut self, new: NewCar) -> Result<Car, StoreError> {
        self.staged.require_engine(new.engine_id)?;
        let car = Car {
            id: self.staged.next_id(),
            model: new.model,
            year: new.year,
            driveable: new.driveable,
            price_in_cents: new.price_in_cents,
            sales_count: 0,
            engine_id: new.engine_id,
        };
        self.staged.cars.insert(car.id, car.clone());
        Ok(car)
    }

    async fn save_car(&mut self, car: &Car) -> Result<(), StoreError> {
        if !self.staged.cars.contains_key(&car.id) {
            return Err(StoreError::Conflict(format!(
                "Car with id {} does not exist",
                car.id
            )));
        }
        self.staged.require_engine(car.engine_id)?;
        self.staged.cars.insert(car.id, car.clone());
        Ok(())
    }

    async fn delete_car(&mut self, id: CarId) -> Result<bool, StoreError> {
        if self.staged.cars.remove(&id).is_none() {
            return Ok(false);
        }
        for user in self.staged.users.values_mut() {
            user.forget_car(id);
        }
        Ok(true)
    }

    async fn insert_engine(&mut self, new: NewEngine) -> Result<Engine, StoreError> {
        let engine = Engine {
            id: self.staged.next_id(),
            horse_power: new.horse_power,
            capacity: new.capacity,
        };
        self.staged.engines.insert(engine.id, engine.clone());
        Ok(engine)
    }

    async fn save_engine(&mut self, engine: &Engine) -> Result<(), StoreError> {
        match self.staged.engines.get_mut(&engine.id) {
            Some(stored) => {
                *stored = engine.clone();
                Ok(())
            }
            None => Err(StoreError::Conflict(format!(
                "Engine with id {} does not exist",
                engine.id
            ))),
        }
    }

    async fn delete_engine(&mut self, id: EngineId) -> Result<bool, StoreError> {
        let referencing = self
            .staged
            .cars
            .values()
            .filter(|c| c.engine_id == id)
            .count();
        if referencing > 0 {
            return Err(StoreError::Conflict(format!(
                "Engine with id {} is referenced by {} car(s)",
                id, referencing
            )));
        }
        Ok(self.staged.engines.remove(&id).is_some())
    }
}

impl UnitOfWork for InMemoryTx {
    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Balance;

    async fn seed_car(store: &InMemoryStore, price: i64) -> Car {
        let mut tx = store.begin().await.unwrap();
        let engine = tx
            .insert_engine(NewEngine::new(150, 2.0).unwrap())
            .await
            .unwrap();
        let car = tx
            .insert_car(NewCar::new("Golf", 2004, true, price, engine.id).unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        car
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            balance: Balance::new(10_000).unwrap(),
            role_ids: BTreeSet::from([2]),
        }
    }

    #[tokio::test]
    async fn test_commit_makes_changes_visible() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 5_000).await;

        let view = store.find_car_view(car.id).await.unwrap().unwrap();
        assert_eq!(view.price_in_cents, 5_000);
        assert_eq!(view.engine.horse_power, 150);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 5_000).await;

        {
            let mut tx = store.begin().await.unwrap();
            let mut locked = tx.lock_car(car.id).await.unwrap().unwrap();
            locked.record_sale();
            tx.save_car(&locked).await.unwrap();
            tx.insert_user(new_user("rollback_user")).await.unwrap();
            // dropped here
        }

        let view = store.find_car_view(car.id).await.unwrap().unwrap();
        assert_eq!(view.sales_count, 0);
        assert!(store
            .find_user_by_username("rollback_user")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_user_resolves_roles() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let user = tx.insert_user(new_user("roles_user")).await.unwrap();
        assert!(user.has_role(ROLE_USER));
        assert!(user.car_ids().is_empty());

        let duplicate = tx.insert_user(new_user("roles_user")).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_engine_in_use_is_rejected() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 5_000).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.delete_engine(car.engine_id).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        assert!(tx.delete_car(car.id).await.unwrap());
        assert!(tx.delete_engine(car.engine_id).await.unwrap());
        tx.commit().await.unwrap();

        let engines = store.list_engines(None, PageRequest::default()).await.unwrap();
        assert_eq!(engines.total_elements, 0);
    }

    #[tokio::test]
    async fn test_delete_car_removes_ownership() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 1_000).await;

        let mut tx = store.begin().await.unwrap();
        let mut user = tx.insert_user(new_user("owner_user")).await.unwrap();
        user.purchase(&car).unwrap();
        tx.save_user(&user).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete_car(car.id).await.unwrap();
        tx.commit().await.unwrap();

        let user = store.find_user(user.id()).await.unwrap().unwrap();
        assert!(user.car_ids().is_empty());
        assert_eq!(user.balance().cents(), 9_000);
    }

    #[tokio::test]
    async fn test_list_engines_capacity_filter() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for capacity in [1.6, 2.0, 2.0] {
            tx.insert_engine(NewEngine::new(100, capacity).unwrap())
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        let all = store.list_engines(None, PageRequest::default()).await.unwrap();
        let two_litre = store
            .list_engines(Some(2.0), PageRequest::default())
            .await
            .unwrap();

        assert_eq!(all.total_elements, 3);
        assert_eq!(two_litre.total_elements, 2);
    }

    #[tokio::test]
    async fn test_update_engine_and_car_in_place() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 1_000).await;

        let mut tx = store.begin().await.unwrap();
        let mut engine = tx.find_engine(car.engine_id).await.unwrap().unwrap();
        engine.update(NewEngine::new(180, 2.5).unwrap());
        tx.save_engine(&engine).await.unwrap();

        let mut locked = tx.lock_car(car.id).await.unwrap().unwrap();
        locked.update(NewCar::new("Golf GTI", 2006, true, 1_500, engine.id).unwrap());
        tx.save_car(&locked).await.unwrap();

        let mut orphan = locked.clone();
        orphan.engine_id = 999;
        assert!(matches!(
            tx.save_car(&orphan).await,
            Err(StoreError::NotFound(DomainError::NotFound(_)))
        ));
        tx.commit().await.unwrap();

        let view = store.find_car_view(car.id).await.unwrap().unwrap();
        assert_eq!(view.model, "Golf GTI");
        assert_eq!(view.price_in_cents, 1_500);
        assert_eq!(view.engine.horse_power, 180);
        assert_eq!(view.engine.capacity, 2.5);
    }

    #[tokio::test]
    async fn test_insert_car_with_unknown_engine_is_not_found() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx
            .insert_car(NewCar::new("Lada", 1985, true, 100, 42).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Engine with id 42 not found");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_missing_engine_or_car_is_a_conflict() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 1_000).await;

        let mut tx = store.begin().await.unwrap();
        let ghost_engine = Engine {
            id: 500,
            horse_power: 90,
            capacity: 1.2,
        };
        assert!(tx.save_engine(&ghost_engine).await.unwrap_err().is_conflict());

        let mut ghost_car = car.clone();
        ghost_car.id = 501;
        assert!(tx.save_car(&ghost_car).await.unwrap_err().is_conflict());
        tx.commit().await.unwrap();

        assert!(store
            .list_engines(None, PageRequest::default())
            .await
            .unwrap()
            .content
            .iter()
            .all(|e| e.id != 500));
        assert!(store.find_car_view(501).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_counts_cars() {
        let store = InMemoryStore::new();
        let car = seed_car(&store, 1_000).await;

        let mut tx = store.begin().await.unwrap();
        let mut buyer = tx.insert_user(new_user("buyer_one")).await.unwrap();
        tx.insert_user(new_user("buyer_two")).await.unwrap();
        buyer.purchase(&car).unwrap();
        tx.save_user(&buyer).await.unwrap();
        tx.commit().await.unwrap();

        let page = store.list_users(PageRequest::new(0, 1)).await.unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.content[0].username, "buyer_one");
        assert_eq!(page.content[0].owned_cars_count, 1);

        let cars = store
            .list_user_cars(buyer.id(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(cars.content.len(), 1);
        assert_eq!(cars.content[0].id, car.id);
    }
}
