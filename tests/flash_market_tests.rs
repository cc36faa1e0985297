use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use trendoracle::models::{Direction, FlashPosition, TrendHistoryPoint};
use trendoracle::services::payout::calculate_payouts;
use trendoracle::services::spike_detector::{velocity_between, VelocitySpikeDetector};

fn history_point(score: f64, at_secs: i64) -> TrendHistoryPoint {
    TrendHistoryPoint {
        id: Uuid::new_v4(),
        item_id: Uuid::nil(),
        score,
        factors: json!({}),
        weights: json!({}),
        timestamp: Utc.timestamp_opt(at_secs, 0).unwrap(),
    }
}

fn stake(direction: &str, amount: i64) -> FlashPosition {
    FlashPosition {
        id: Uuid::new_v4(),
        market_id: Uuid::nil(),
        user_wallet: format!("w_{direction}_{amount}"),
        direction: direction.into(),
        stake: Decimal::from(amount),
        payout: None,
        profit_loss: None,
        is_resolved: false,
        created_at: None,
    }
}

// ---------------------------------------------------------------------------
// Spike detection
// ---------------------------------------------------------------------------

#[test]
fn reference_spike_scenario() {
    // Scores [80 (t=10s), 60 (t=9s)], threshold 5 → velocity 20, detected.
    let detector = VelocitySpikeDetector::new(5.0, Duration::from_millis(120_000));
    let history = [history_point(80.0, 10), history_point(60.0, 9)];

    let check = detector.evaluate(Uuid::new_v4(), &history);
    assert_eq!(check.velocity, 20.0);
    assert!(check.detected);
}

#[test]
fn two_breaches_inside_cooldown_fire_once() {
    let detector = VelocitySpikeDetector::new(5.0, Duration::from_millis(120_000));
    let item_id = Uuid::new_v4();
    let history = [history_point(80.0, 10), history_point(60.0, 9)];

    let detections = (0..2)
        .filter(|_| detector.evaluate(item_id, &history).detected)
        .count();
    assert_eq!(detections, 1);
}

#[test]
fn resolution_velocity_uses_the_same_formula_as_detection() {
    let initial = velocity_between(&history_point(80.0, 10), &history_point(60.0, 9));
    let fin = velocity_between(&history_point(85.0, 70), &history_point(80.0, 69));

    // velocity dropped from 20 to 5 → change is negative → "down" wins
    let change = fin - initial;
    assert!(change < 0.0);

    let winning = if change >= 0.0 { Direction::Up } else { Direction::Down };
    assert_eq!(winning, Direction::Down);
}

#[test]
fn flat_velocity_resolves_up() {
    // velocity_change == 0 counts as continuation.
    let initial = velocity_between(&history_point(80.0, 10), &history_point(60.0, 9));
    let fin = velocity_between(&history_point(100.0, 70), &history_point(80.0, 69));
    let change = fin - initial;
    assert_eq!(change, 0.0);

    let winning = if change >= 0.0 { Direction::Up } else { Direction::Down };
    assert_eq!(winning, Direction::Up);
}

// ---------------------------------------------------------------------------
// Payout conservation
// ---------------------------------------------------------------------------

#[test]
fn payouts_conserve_the_pool_when_winners_exist() {
    let positions = vec![
        stake("up", 100),
        stake("up", 300),
        stake("down", 150),
        stake("down", 50),
    ];
    let outcomes = calculate_payouts(&positions, Direction::Up);

    let winners_total = Decimal::from(400);
    let losers_total = Decimal::from(200);
    let paid: Decimal = outcomes.iter().map(|o| o.payout).sum();

    assert_eq!(paid, winners_total + losers_total);
}

#[test]
fn zero_winners_pays_zero_everywhere() {
    let positions = vec![stake("down", 500), stake("down", 123)];
    let outcomes = calculate_payouts(&positions, Direction::Up);

    assert!(outcomes.iter().all(|o| o.payout == Decimal::ZERO));
    // The pot is retained by the house, so losses stay with the losers.
    assert_eq!(outcomes[0].profit_loss, Decimal::from(-500));
    assert_eq!(outcomes[1].profit_loss, Decimal::from(-123));
}

#[test]
fn winner_payout_is_proportional_to_stake() {
    let positions = vec![stake("up", 100), stake("up", 400), stake("down", 250)];
    let outcomes = calculate_payouts(&positions, Direction::Up);

    // 100/500 of 250 = 50; 400/500 of 250 = 200
    assert_eq!(outcomes[0].payout, Decimal::from(150));
    assert_eq!(outcomes[1].payout, Decimal::from(600));
    assert_eq!(outcomes[0].profit_loss, Decimal::from(50));
    assert_eq!(outcomes[1].profit_loss, Decimal::from(200));
}

#[test]
fn every_position_is_settled_exactly_once() {
    let positions = vec![
        stake("up", 10),
        stake("down", 20),
        stake("up", 30),
        stake("down", 40),
    ];
    let outcomes = calculate_payouts(&positions, Direction::Down);

    assert_eq!(outcomes.len(), positions.len());
    let mut ids: Vec<Uuid> = outcomes.iter().map(|o| o.position_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), positions.len());
}
