use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Direction, FlashPosition};

/// Settlement amounts for a single position of a resolved market.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutOutcome {
    pub position_id: Uuid,
    pub payout: Decimal,
    pub profit_loss: Decimal,
}

/// Split a resolved market's pooled stakes between winners and losers.
///
/// Winners share the losing pool pro-rata by stake and get their own stake
/// back; losers forfeit theirs. With winners present the full pool is
/// redistributed: `Σ payout == winners_total + losers_total`. With no
/// winners every payout is 0 and the pool is retained by the house.
pub fn calculate_payouts(
    positions: &[FlashPosition],
    winning_side: Direction,
) -> Vec<PayoutOutcome> {
    let winning = winning_side.as_str();

    let winners_total: Decimal = positions
        .iter()
        .filter(|p| p.direction == winning)
        .map(|p| p.stake)
        .sum();
    let losers_total: Decimal = positions
        .iter()
        .filter(|p| p.direction != winning)
        .map(|p| p.stake)
        .sum();

    positions
        .iter()
        .map(|position| {
            if position.direction == winning && winners_total > Decimal::ZERO {
                let share = position.stake / winners_total;
                let payout = position.stake + losers_total * share;
                PayoutOutcome {
                    position_id: position.id,
                    payout,
                    profit_loss: payout - position.stake,
                }
            } else {
                PayoutOutcome {
                    position_id: position.id,
                    payout: Decimal::ZERO,
                    profit_loss: -position.stake,
                }
            }
        })
        .collect()
}
