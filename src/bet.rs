use crate::structure::{BetBound, RoundLimits};
use crate::Chips;
use serde::{Deserialize, Serialize};

/// The discretionary actions a player can be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PossibleAction {
    Check,
    Call,
    Raise,
    Fold,
}

/// Resolved limits for one player's next bet, all in chips-to-put-in.
///
/// `min`/`max` bound a call-and-raise; `call` is what merely staying in
/// costs (or the minimum opening bet when nobody has bet yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BetLimits {
    pub min: Chips,
    pub max: Chips,
    pub call: Chips,
}

/// Everything about the table the limit rules can reference.
#[derive(Debug, Clone, Copy)]
pub struct BetContext {
    /// Highest per-round total among players who have not folded.
    pub highest_bet: Chips,
    /// The acting player's current per-round total.
    pub bet: Chips,
    pub money: Chips,
    /// Captured pot plus every live bet on the table.
    pub pot_and_bets: Chips,
    /// Largest raise increment seen this round.
    pub last_increment: Chips,
    pub big_blind: Chips,
    pub level: usize,
    pub cap_left: u8,
}

/// Resolve a round's configured limits against the current table state.
pub fn bet_limits(limits: &RoundLimits, ctx: &BetContext) -> BetLimits {
    let to_call = (ctx.highest_bet - ctx.bet).max(0);
    let base_min = match limits.min {
        Some(BetBound::Amount(a)) => a,
        Some(BetBound::Big) => ctx.big_blind,
        Some(BetBound::Pot) => ctx.pot_and_bets,
        None => 0,
    };
    // The opening bet must reach the configured minimum even when there is
    // nothing to call yet.
    let call = to_call.max(base_min).min(ctx.money);
    if ctx.cap_left == 0 {
        return BetLimits {
            min: 0,
            max: 0,
            call,
        };
    }
    if let Some(fixed) = limits.fixed_amount(ctx.level) {
        let amount = (to_call + fixed).min(ctx.money);
        return BetLimits {
            min: amount,
            max: amount,
            call,
        };
    }
    let increment = base_min.max(ctx.last_increment);
    let min = (to_call + increment).min(ctx.money);
    let max = match limits.max {
        None => ctx.money,
        Some(BetBound::Amount(a)) => (to_call + a).min(ctx.money),
        Some(BetBound::Big) => (to_call + ctx.big_blind).min(ctx.money),
        // Pot limit: call, then raise at most the pot as it stands after
        // the call.
        Some(BetBound::Pot) => (to_call + ctx.pot_and_bets + to_call).max(min).min(ctx.money),
    };
    BetLimits {
        min: min.min(max),
        max,
        call,
    }
}
