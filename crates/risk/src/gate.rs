use common::RejectReason;
use strategy::StrategyProfile;

/// Everything the gating decision needs, gathered by the executor before
/// the call. Keeping the inputs explicit keeps the function pure and the
/// checks unit-testable without stores or brokers.
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    /// `margin_used / balance * 100` from the account risk snapshot.
    pub portfolio_risk_pct: f64,
    pub max_portfolio_risk_pct: f64,
    /// Open positions for the exact (account, instrument, strategy) key.
    pub open_for_resource: u32,
    /// Open positions for (account, strategy) across all instruments.
    pub open_for_strategy: u32,
    /// Whether the (account, instrument) trade cooldown has elapsed.
    pub cooldown_elapsed: bool,
    pub profile: &'a StrategyProfile,
}

/// Evaluate the risk gates in order. First failing check wins.
pub fn gate(input: &GateInput) -> Result<(), RejectReason> {
    if input.portfolio_risk_pct >= input.max_portfolio_risk_pct {
        return Err(RejectReason::RiskLimitExceeded);
    }

    if input.open_for_resource > 0 && !input.profile.allows_multiple {
        return Err(RejectReason::DuplicatePosition);
    }

    if input.open_for_strategy >= input.profile.max_positions {
        return Err(RejectReason::RiskLimitExceeded);
    }

    if !input.cooldown_elapsed {
        return Err(RejectReason::CooldownActive);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StrategyKind;

    fn passing_input(profile: &StrategyProfile) -> GateInput<'_> {
        GateInput {
            portfolio_risk_pct: 5.0,
            max_portfolio_risk_pct: 20.0,
            open_for_resource: 0,
            open_for_strategy: 0,
            cooldown_elapsed: true,
            profile,
        }
    }

    #[test]
    fn clean_input_passes() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum);
        assert!(gate(&passing_input(&profile)).is_ok());
    }

    #[test]
    fn portfolio_risk_rejects_first() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum);
        let input = GateInput {
            portfolio_risk_pct: 20.0,
            // Even with every other check also failing, the portfolio gate
            // must be the reported reason.
            open_for_resource: 1,
            open_for_strategy: 99,
            cooldown_elapsed: false,
            ..passing_input(&profile)
        };
        assert_eq!(gate(&input), Err(RejectReason::RiskLimitExceeded));
    }

    #[test]
    fn duplicate_rejected_for_single_position_strategy() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum);
        let input = GateInput {
            open_for_resource: 1,
            ..passing_input(&profile)
        };
        assert_eq!(gate(&input), Err(RejectReason::DuplicatePosition));
    }

    #[test]
    fn grid_allows_multiple_positions_on_one_instrument() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Grid);
        let input = GateInput {
            open_for_resource: 3,
            open_for_strategy: 3,
            ..passing_input(&profile)
        };
        assert!(gate(&input).is_ok());
    }

    #[test]
    fn strategy_position_cap_enforced() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum); // max 3
        let input = GateInput {
            open_for_strategy: 3,
            ..passing_input(&profile)
        };
        assert_eq!(gate(&input), Err(RejectReason::RiskLimitExceeded));
    }

    #[test]
    fn cooldown_rejects_last() {
        let profile = StrategyProfile::defaults_for(StrategyKind::Momentum);
        let input = GateInput {
            cooldown_elapsed: false,
            ..passing_input(&profile)
        };
        assert_eq!(gate(&input), Err(RejectReason::CooldownActive));
    }
}
