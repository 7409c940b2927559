use common::{Direction, OrderPlan};
use strategy::StrategyProfile;

/// Hard ceiling on a single order's quantity. Compiled-in constant — not
/// user-configurable — as a last-resort safeguard against runaway sizing.
pub const MAX_ORDER_QUANTITY: f64 = 100.0;

/// Confidence bands for the risk tiers.
const MEDIUM_CONFIDENCE: f64 = 70.0;
const HIGH_CONFIDENCE: f64 = 85.0;

#[derive(Debug, Clone)]
pub struct SizingInput<'a> {
    pub confidence: f64,
    pub direction: Direction,
    pub entry_price: f64,
    pub balance: f64,
    /// Monetary value of one price unit per quantity unit.
    pub tick_value: f64,
    pub profile: &'a StrategyProfile,
}

/// Size an approved order. Only called after `gate` has passed.
pub fn size(input: &SizingInput) -> OrderPlan {
    let risk_pct = tiered_risk_pct(input.confidence, input.profile);
    let risk_amount = input.balance * risk_pct / 100.0;

    let stop_distance = input.entry_price * input.profile.stop_loss_pct;
    let tick_value = if input.tick_value > 0.0 { input.tick_value } else { 1.0 };

    let raw_quantity = if stop_distance > 0.0 {
        risk_amount / (stop_distance * tick_value)
    } else {
        0.0
    };

    let quantity = raw_quantity
        .min(lot_ceiling(input.balance))
        .min(MAX_ORDER_QUANTITY)
        .max(0.0);

    let (stop_loss, take_profit) = stops_for(
        input.direction,
        input.entry_price,
        input.profile.stop_loss_pct,
        input.profile.take_profit_pct,
    );

    OrderPlan {
        quantity,
        stop_loss,
        take_profit,
        risk_pct,
    }
}

/// Direction-aware stop-loss / take-profit levels.
pub fn stops_for(direction: Direction, entry: f64, sl_pct: f64, tp_pct: f64) -> (f64, f64) {
    match direction {
        Direction::Buy => (entry * (1.0 - sl_pct), entry * (1.0 + tp_pct)),
        Direction::Sell => (entry * (1.0 + sl_pct), entry * (1.0 - tp_pct)),
    }
}

/// Risk percentage tiered by signal confidence, capped at the profile's
/// absolute maximum.
fn tiered_risk_pct(confidence: f64, profile: &StrategyProfile) -> f64 {
    let factor = if confidence < MEDIUM_CONFIDENCE {
        0.5
    } else if confidence < HIGH_CONFIDENCE {
        1.0
    } else {
        1.25
    };
    (profile.risk_per_trade_pct * factor).min(profile.max_risk_per_trade_pct)
}

/// Balance-tiered ceiling on order quantity.
fn lot_ceiling(balance: f64) -> f64 {
    if balance < 1_000.0 {
        1.0
    } else if balance < 10_000.0 {
        5.0
    } else if balance < 100_000.0 {
        20.0
    } else {
        50.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StrategyKind;

    fn profile_with(sl: f64, tp: f64) -> StrategyProfile {
        let mut p = StrategyProfile::defaults_for(StrategyKind::Momentum);
        p.stop_loss_pct = sl;
        p.take_profit_pct = tp;
        p
    }

    #[test]
    fn buy_stops_bracket_entry() {
        let (sl, tp) = stops_for(Direction::Buy, 3.92, 0.015, 0.02);
        assert!((sl - 3.8612).abs() < 1e-9, "stop_loss {sl}");
        assert!((tp - 3.9984).abs() < 1e-9, "take_profit {tp}");
        assert!(tp > 3.92, "take-profit must be strictly above entry");
        assert!(sl < 3.92);
    }

    #[test]
    fn sell_stops_invert() {
        let (sl, tp) = stops_for(Direction::Sell, 3.92, 0.015, 0.02);
        assert!((sl - 3.9788).abs() < 1e-9, "stop_loss {sl}");
        assert!((tp - 3.8416).abs() < 1e-9, "take_profit {tp}");
        assert!(sl > 3.92, "sell stop-loss sits above entry");
        assert!(tp < 3.92);
    }

    #[test]
    fn higher_confidence_risks_more() {
        let profile = profile_with(0.015, 0.03);
        let low = tiered_risk_pct(60.0, &profile);
        let medium = tiered_risk_pct(75.0, &profile);
        let high = tiered_risk_pct(90.0, &profile);
        assert!(low < medium && medium < high);
    }

    #[test]
    fn risk_tier_capped_at_profile_max() {
        let mut profile = profile_with(0.015, 0.03);
        profile.risk_per_trade_pct = 2.0;
        profile.max_risk_per_trade_pct = 2.0;
        // 1.25 × 2.0 = 2.5 would exceed the cap
        assert_eq!(tiered_risk_pct(95.0, &profile), 2.0);
    }

    #[test]
    fn quantity_respects_balance_tier() {
        let profile = profile_with(0.001, 0.002); // tight stop → large raw quantity
        let plan = size(&SizingInput {
            confidence: 90.0,
            direction: Direction::Buy,
            entry_price: 10.0,
            balance: 500.0,
            tick_value: 1.0,
            profile: &profile,
        });
        assert!(plan.quantity <= 1.0, "small accounts cap at 1 lot, got {}", plan.quantity);
    }

    #[test]
    fn quantity_never_exceeds_hard_cap() {
        let profile = profile_with(0.0001, 0.0002);
        let plan = size(&SizingInput {
            confidence: 95.0,
            direction: Direction::Buy,
            entry_price: 1.0,
            balance: 10_000_000.0,
            tick_value: 0.001,
            profile: &profile,
        });
        assert!(plan.quantity <= MAX_ORDER_QUANTITY);
    }

    #[test]
    fn zero_stop_distance_sizes_to_zero() {
        let profile = profile_with(0.015, 0.03);
        let plan = size(&SizingInput {
            confidence: 80.0,
            direction: Direction::Buy,
            entry_price: 0.0,
            balance: 10_000.0,
            tick_value: 1.0,
            profile: &profile,
        });
        assert_eq!(plan.quantity, 0.0);
    }
}
