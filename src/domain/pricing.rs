//! Pricing policy
//!
//! Resale payout is always derived from the car's current price.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::money::Cents;

/// Share of the current price paid back on resale (0.8)
pub const DEPRECIATION_FACTOR: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

/// Payout for selling a car currently priced at `price_in_cents`,
/// rounded half-up to whole cents.
pub fn resale_price(price_in_cents: Cents) -> Cents {
    let payout = (Decimal::from(price_in_cents) * DEPRECIATION_FACTOR)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    // |price * 0.8| <= |price|, so this always fits
    payout.to_i64().unwrap_or(price_in_cents)
}
