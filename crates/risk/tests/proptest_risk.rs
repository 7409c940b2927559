use common::{Direction, RejectReason, StrategyKind};
use proptest::prelude::*;
use risk::{gate, size, stops_for, GateInput, SizingInput, MAX_ORDER_QUANTITY};
use strategy::StrategyProfile;

proptest! {
    /// Gating and sizing on randomized inputs must never panic, and the
    /// sized quantity must always respect the hard cap.
    #[test]
    fn sizing_never_panics_and_respects_hard_cap(
        confidence in 0.0f64..100.0f64,
        entry_price in 0.0001f64..1_000_000.0f64,
        balance in 0.0f64..100_000_000.0f64,
        tick_value in 0.0f64..1000.0f64,
    ) {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum);
        let plan = size(&SizingInput {
            confidence,
            direction: Direction::Buy,
            entry_price,
            balance,
            tick_value,
            profile: &profile,
        });
        prop_assert!(plan.quantity >= 0.0);
        prop_assert!(plan.quantity <= MAX_ORDER_QUANTITY);
        prop_assert!(plan.risk_pct <= profile.max_risk_per_trade_pct);
    }

    /// For a BUY the stop sits strictly below entry and the target strictly
    /// above; for a SELL the bracket inverts.
    #[test]
    fn stops_bracket_entry_direction_aware(
        entry in 0.0001f64..1_000_000.0f64,
        sl_pct in 0.0001f64..0.5f64,
        tp_pct in 0.0001f64..0.5f64,
    ) {
        let (buy_sl, buy_tp) = stops_for(Direction::Buy, entry, sl_pct, tp_pct);
        prop_assert!(buy_sl < entry);
        prop_assert!(buy_tp > entry);

        let (sell_sl, sell_tp) = stops_for(Direction::Sell, entry, sl_pct, tp_pct);
        prop_assert!(sell_sl > entry);
        prop_assert!(sell_tp < entry);
    }

    /// Whenever portfolio risk is at or above the limit, the gate must
    /// reject with RiskLimitExceeded no matter what else is true.
    #[test]
    fn portfolio_risk_breach_always_rejects(
        portfolio_risk in 20.0f64..500.0f64,
        open_for_resource in 0u32..10,
        open_for_strategy in 0u32..10,
        cooldown_elapsed in proptest::bool::ANY,
    ) {
        let profile = StrategyProfile::defaults_for(StrategyKind::Grid);
        let result = gate(&GateInput {
            portfolio_risk_pct: portfolio_risk,
            max_portfolio_risk_pct: 20.0,
            open_for_resource,
            open_for_strategy,
            cooldown_elapsed,
            profile: &profile,
        });
        prop_assert_eq!(result, Err(RejectReason::RiskLimitExceeded));
    }
}
