use thiserror::Error;

use crate::models::CurveType;

/// Bonding-curve price math, in integer base units (lamport-style).
///
/// All rounding is integer floor, matching on-chain settlement. Selling is
/// the buy integral evaluated over the reversed supply window, so
/// `sell_refund(supply, n) == buy_cost(supply - n, n)` for every curve.

/// Linear price increase per unit of supply.
pub const SLOPE: u64 = 100;
/// Denominator of the exponential multiplier: price = base * (SCALE_UNIT + supply) / SCALE_UNIT.
pub const SCALE_UNIT: u64 = 10_000;
/// Coefficient of the log2 term on the logarithmic curve.
pub const LOG_SCALE: u64 = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("amount must be positive")]
    InvalidAmount,

    #[error("sell amount {amount} exceeds circulating supply {supply}")]
    InsufficientSupply { supply: u64, amount: u64 },
}

/// Cost to buy `amount` units at `supply` circulating, in base units.
pub fn buy_cost(
    supply: u64,
    amount: u64,
    curve: CurveType,
    base_price: u64,
) -> Result<u64, PricingError> {
    if amount == 0 {
        return Err(PricingError::InvalidAmount);
    }

    let cost = match curve {
        CurveType::Linear => {
            // Trapezoid over the supply window; (start + end) * amount is
            // always even so the /2 is exact.
            let start = base_price as u128 + supply as u128 * SLOPE as u128;
            let end = base_price as u128 + (supply + amount) as u128 * SLOPE as u128;
            (start + end) * amount as u128 / 2
        }
        CurveType::Exponential => {
            let mut total: u128 = 0;
            for i in 0..amount {
                total += unit_price_exponential(supply + i, base_price);
            }
            total
        }
        CurveType::Logarithmic => {
            let mut total: u128 = 0;
            for i in 1..=amount {
                total += unit_price_logarithmic(supply + i, base_price);
            }
            total
        }
    };

    Ok(cost.min(u64::MAX as u128) as u64)
}

/// Refund for selling `amount` units at `supply` circulating.
///
/// Equals the buy cost of the same units starting from `supply - amount`.
pub fn sell_refund(
    supply: u64,
    amount: u64,
    curve: CurveType,
    base_price: u64,
) -> Result<u64, PricingError> {
    if amount == 0 {
        return Err(PricingError::InvalidAmount);
    }
    if amount > supply {
        return Err(PricingError::InsufficientSupply { supply, amount });
    }

    buy_cost(supply - amount, amount, curve, base_price)
}

/// Average per-unit price of a buy, floor-rounded.
pub fn average_price(
    supply: u64,
    amount: u64,
    curve: CurveType,
    base_price: u64,
) -> Result<u64, PricingError> {
    Ok(buy_cost(supply, amount, curve, base_price)? / amount)
}

/// Spot price of the next unit at the given supply.
pub fn price_at_supply(supply: u64, curve: CurveType, base_price: u64) -> u64 {
    match curve {
        CurveType::Linear => base_price.saturating_add(supply.saturating_mul(SLOPE)),
        CurveType::Exponential => unit_price_exponential(supply, base_price) as u64,
        CurveType::Logarithmic => unit_price_logarithmic(supply + 1, base_price) as u64,
    }
}

/// Total base units locked in the curve from 0 to `supply` — the definite
/// integral of the per-unit price, used for market-cap estimation.
pub fn total_value(supply: u64, curve: CurveType, base_price: u64) -> u64 {
    if supply == 0 {
        return 0;
    }
    // Same accumulation as a buy of the whole supply from zero.
    buy_cost(0, supply, curve, base_price).unwrap_or(u64::MAX)
}

fn unit_price_exponential(supply: u64, base_price: u64) -> u128 {
    base_price as u128 * (SCALE_UNIT as u128 + supply as u128) / SCALE_UNIT as u128
}

fn unit_price_logarithmic(supply: u64, base_price: u64) -> u128 {
    // supply here is already the 1-based index; log2(0) never occurs.
    let log_term = (LOG_SCALE as f64 * (supply as f64).log2()).floor();
    base_price as u128 + log_term as u128
}
