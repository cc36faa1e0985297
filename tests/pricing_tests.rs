use trendoracle::models::CurveType;
use trendoracle::pricing::{
    average_price, buy_cost, price_at_supply, sell_refund, total_value, PricingError,
};

const BASE: u64 = 1_000_000;

const ALL_CURVES: [CurveType; 3] = [
    CurveType::Linear,
    CurveType::Exponential,
    CurveType::Logarithmic,
];

#[test]
fn linear_reference_price() {
    // base=1,000,000, slope=100, supply=0, amount=10
    assert_eq!(buy_cost(0, 10, CurveType::Linear, BASE).unwrap(), 10_005_000);
    assert_eq!(average_price(0, 10, CurveType::Linear, BASE).unwrap(), 1_000_500);
}

#[test]
fn exponential_reference_price() {
    // Per-unit prices 1,000,000 / 1,000,100 / 1,000,200
    assert_eq!(buy_cost(0, 3, CurveType::Exponential, BASE).unwrap(), 3_000_300);
}

#[test]
fn curve_symmetry_holds_across_the_grid() {
    for curve in ALL_CURVES {
        for supply in [1u64, 2, 10, 99, 1_000, 12_345] {
            for amount in [1u64, 2, 7, 50] {
                if amount > supply {
                    continue;
                }
                assert_eq!(
                    sell_refund(supply, amount, curve, BASE).unwrap(),
                    buy_cost(supply - amount, amount, curve, BASE).unwrap(),
                    "symmetry broken: curve={curve} supply={supply} amount={amount}"
                );
            }
        }
    }
}

#[test]
fn buying_then_selling_everything_is_lossless() {
    for curve in ALL_CURVES {
        let cost = buy_cost(0, 25, curve, BASE).unwrap();
        let refund = sell_refund(25, 25, curve, BASE).unwrap();
        assert_eq!(cost, refund, "curve={curve}");
    }
}

#[test]
fn invalid_amount_is_rejected_before_any_math() {
    for curve in ALL_CURVES {
        assert_eq!(buy_cost(100, 0, curve, BASE), Err(PricingError::InvalidAmount));
        assert_eq!(sell_refund(100, 0, curve, BASE), Err(PricingError::InvalidAmount));
    }
}

#[test]
fn selling_more_than_supply_is_rejected() {
    let err = sell_refund(5, 6, CurveType::Linear, BASE).unwrap_err();
    assert_eq!(err, PricingError::InsufficientSupply { supply: 5, amount: 6 });
}

#[test]
fn cost_is_monotonic_in_supply() {
    // Later buyers always pay at least as much for the same amount.
    for curve in ALL_CURVES {
        let early = buy_cost(0, 10, curve, BASE).unwrap();
        let late = buy_cost(5_000, 10, curve, BASE).unwrap();
        assert!(late > early, "curve={curve}");
    }
}

#[test]
fn total_value_accumulates_incremental_buys() {
    for curve in ALL_CURVES {
        let step1 = buy_cost(0, 30, curve, BASE).unwrap();
        let step2 = buy_cost(30, 12, curve, BASE).unwrap();
        assert_eq!(total_value(42, curve, BASE), step1 + step2, "curve={curve}");
    }
}

#[test]
fn spot_price_matches_single_unit_cost() {
    // Exponential and logarithmic curves price unit-by-unit, so a one-unit
    // buy costs exactly the spot price.
    for curve in [CurveType::Exponential, CurveType::Logarithmic] {
        for supply in [0u64, 1, 500, 9_999] {
            assert_eq!(
                price_at_supply(supply, curve, BASE),
                buy_cost(supply, 1, curve, BASE).unwrap(),
                "curve={curve} supply={supply}"
            );
        }
    }
}

#[test]
fn linear_single_unit_cost_is_the_trapezoid_midpoint() {
    // The linear curve integrates the trapezoid, so one unit costs the spot
    // price plus half a slope step.
    for supply in [0u64, 1, 500, 9_999] {
        assert_eq!(
            buy_cost(supply, 1, CurveType::Linear, BASE).unwrap(),
            price_at_supply(supply, CurveType::Linear, BASE) + trendoracle::pricing::SLOPE / 2,
            "supply={supply}"
        );
    }
}
