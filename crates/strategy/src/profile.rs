use serde::{Deserialize, Serialize};

use common::StrategyKind;

/// Weights of the four scoring pillars. Always sum to exactly 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PillarWeights {
    pub base_signal: u8,
    pub trend_confluence: u8,
    pub volatility: u8,
    pub sentiment: u8,
}

impl PillarWeights {
    pub fn sum(&self) -> u32 {
        self.base_signal as u32
            + self.trend_confluence as u32
            + self.volatility as u32
            + self.sentiment as u32
    }
}

/// Full parameter set for one strategy variant.
///
/// Immutable at runtime: a config reload replaces whole profiles, it never
/// mutates fields in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProfile {
    pub kind: StrategyKind,
    pub weights: PillarWeights,
    /// Floor on the confidence score, applied on top of the regime-adjusted
    /// mode threshold.
    pub min_confidence: f64,
    /// Stop-loss distance as a fraction of entry (0.015 = 1.5%).
    pub stop_loss_pct: f64,
    /// Take-profit distance as a fraction of entry.
    pub take_profit_pct: f64,
    /// Max concurrently open positions for this strategy per account.
    pub max_positions: u32,
    pub risk_per_trade_pct: f64,
    /// Absolute ceiling on risk per trade, regardless of confidence tier.
    pub max_risk_per_trade_pct: f64,
    /// Minimum age before drawdown-based exits may fire.
    pub min_hold_secs: i64,
    /// Hard time-based exit horizon.
    pub time_exit_secs: i64,
    /// Per-pair signal-generation cooldown (distinct from the trade cooldown).
    pub generation_cooldown_secs: i64,
    /// Trailing stop distance as a fraction of entry; `None` disables it.
    pub trailing_stop_pct: Option<f64>,
    /// Unrealized profit (as a fraction of entry notional) at which the
    /// trailing stop engages.
    pub trailing_activation_pct: f64,
    /// Intraday strategies close profitable positions near daily session end.
    pub intraday: bool,
    /// Whether multiple open positions per (account, instrument) are allowed.
    pub allows_multiple: bool,
}

impl StrategyProfile {
    /// Built-in defaults for each strategy variant.
    pub fn defaults_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Day => Self {
                kind,
                weights: PillarWeights { base_signal: 40, trend_confluence: 25, volatility: 20, sentiment: 15 },
                min_confidence: 60.0,
                stop_loss_pct: 0.015,
                take_profit_pct: 0.025,
                max_positions: 3,
                risk_per_trade_pct: 1.0,
                max_risk_per_trade_pct: 2.0,
                min_hold_secs: 30 * 60,
                time_exit_secs: 8 * 3600,
                generation_cooldown_secs: 300,
                trailing_stop_pct: Some(0.008),
                trailing_activation_pct: 0.005,
                intraday: true,
                allows_multiple: false,
            },
            StrategyKind::Swing => Self {
                kind,
                weights: PillarWeights { base_signal: 35, trend_confluence: 30, volatility: 20, sentiment: 15 },
                min_confidence: 65.0,
                stop_loss_pct: 0.025,
                take_profit_pct: 0.05,
                max_positions: 2,
                risk_per_trade_pct: 1.0,
                max_risk_per_trade_pct: 2.0,
                min_hold_secs: 2 * 3600,
                time_exit_secs: 5 * 24 * 3600,
                generation_cooldown_secs: 300,
                trailing_stop_pct: Some(0.015),
                trailing_activation_pct: 0.01,
                intraday: false,
                allows_multiple: false,
            },
            StrategyKind::Scalp => Self {
                kind,
                weights: PillarWeights { base_signal: 45, trend_confluence: 15, volatility: 25, sentiment: 15 },
                min_confidence: 55.0,
                stop_loss_pct: 0.005,
                take_profit_pct: 0.008,
                max_positions: 4,
                risk_per_trade_pct: 0.5,
                max_risk_per_trade_pct: 1.0,
                min_hold_secs: 5 * 60,
                time_exit_secs: 3600,
                generation_cooldown_secs: 300,
                trailing_stop_pct: None,
                trailing_activation_pct: 0.003,
                intraday: true,
                allows_multiple: false,
            },
            StrategyKind::MeanReversion => Self {
                kind,
                weights: PillarWeights { base_signal: 40, trend_confluence: 30, volatility: 20, sentiment: 10 },
                min_confidence: 60.0,
                stop_loss_pct: 0.012,
                take_profit_pct: 0.02,
                max_positions: 2,
                risk_per_trade_pct: 1.0,
                max_risk_per_trade_pct: 1.5,
                min_hold_secs: 30 * 60,
                time_exit_secs: 24 * 3600,
                generation_cooldown_secs: 300,
                trailing_stop_pct: None,
                trailing_activation_pct: 0.005,
                intraday: false,
                allows_multiple: false,
            },
            StrategyKind::Momentum => Self {
                kind,
                weights: PillarWeights { base_signal: 35, trend_confluence: 35, volatility: 20, sentiment: 10 },
                min_confidence: 60.0,
                stop_loss_pct: 0.015,
                take_profit_pct: 0.03,
                max_positions: 3,
                risk_per_trade_pct: 1.0,
                max_risk_per_trade_pct: 2.0,
                min_hold_secs: 30 * 60,
                time_exit_secs: 48 * 3600,
                generation_cooldown_secs: 300,
                trailing_stop_pct: Some(0.01),
                trailing_activation_pct: 0.008,
                intraday: false,
                allows_multiple: false,
            },
            StrategyKind::Breakout => Self {
                kind,
                weights: PillarWeights { base_signal: 35, trend_confluence: 25, volatility: 30, sentiment: 10 },
                min_confidence: 65.0,
                stop_loss_pct: 0.02,
                take_profit_pct: 0.04,
                max_positions: 2,
                risk_per_trade_pct: 1.0,
                max_risk_per_trade_pct: 2.0,
                min_hold_secs: 15 * 60,
                time_exit_secs: 24 * 3600,
                generation_cooldown_secs: 120,
                trailing_stop_pct: Some(0.012),
                trailing_activation_pct: 0.01,
                intraday: false,
                allows_multiple: false,
            },
            StrategyKind::Grid => Self {
                kind,
                weights: PillarWeights { base_signal: 40, trend_confluence: 30, volatility: 20, sentiment: 10 },
                min_confidence: 50.0,
                stop_loss_pct: 0.01,
                take_profit_pct: 0.015,
                max_positions: 6,
                risk_per_trade_pct: 0.5,
                max_risk_per_trade_pct: 1.0,
                min_hold_secs: 10 * 60,
                time_exit_secs: 72 * 3600,
                generation_cooldown_secs: 30,
                trailing_stop_pct: None,
                trailing_activation_pct: 0.004,
                intraday: false,
                allows_multiple: true,
            },
        }
    }

    /// Weights must sum to exactly 100.
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.weights.sum();
        if sum != 100 {
            return Err(format!(
                "profile '{}': pillar weights sum to {sum}, expected 100",
                self.kind
            ));
        }
        if self.stop_loss_pct <= 0.0 || self.take_profit_pct <= 0.0 {
            return Err(format!(
                "profile '{}': stop-loss and take-profit must be positive",
                self.kind
            ));
        }
        Ok(())
    }
}

// ─── TOML file config ─────────────────────────────────────────────────────────

/// Top-level strategy config file (TOML). Each entry enables one strategy
/// variant, optionally overriding its built-in defaults.
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[profile]]
/// kind = "momentum"
///
/// [[profile]]
/// kind = "grid"
/// max_positions = 8
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileFileConfig {
    #[serde(rename = "profile")]
    pub profiles: Vec<ProfileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEntry {
    pub kind: StrategyKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub weights: Option<PillarWeights>,
    pub min_confidence: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub max_positions: Option<u32>,
    pub risk_per_trade_pct: Option<f64>,
    pub max_risk_per_trade_pct: Option<f64>,
    pub min_hold_secs: Option<i64>,
    pub time_exit_secs: Option<i64>,
    pub generation_cooldown_secs: Option<i64>,
    pub trailing_stop_pct: Option<f64>,
    pub trailing_activation_pct: Option<f64>,
    pub intraday: Option<bool>,
    pub allows_multiple: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl ProfileFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read strategy config at '{path}': {e}"));
        toml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse strategy config at '{path}': {e}"))
    }

    /// Resolve enabled entries into validated profiles. Panics on an invalid
    /// profile so a bad config never reaches the trading loop.
    pub fn resolve(&self) -> Vec<StrategyProfile> {
        self.profiles
            .iter()
            .filter(|e| e.enabled)
            .map(|e| {
                let profile = e.apply_to(StrategyProfile::defaults_for(e.kind));
                profile
                    .validate()
                    .unwrap_or_else(|msg| panic!("Invalid strategy config: {msg}"));
                profile
            })
            .collect()
    }
}

impl ProfileEntry {
    fn apply_to(&self, mut profile: StrategyProfile) -> StrategyProfile {
        if let Some(w) = self.weights {
            profile.weights = w;
        }
        if let Some(v) = self.min_confidence {
            profile.min_confidence = v;
        }
        if let Some(v) = self.stop_loss_pct {
            profile.stop_loss_pct = v;
        }
        if let Some(v) = self.take_profit_pct {
            profile.take_profit_pct = v;
        }
        if let Some(v) = self.max_positions {
            profile.max_positions = v;
        }
        if let Some(v) = self.risk_per_trade_pct {
            profile.risk_per_trade_pct = v;
        }
        if let Some(v) = self.max_risk_per_trade_pct {
            profile.max_risk_per_trade_pct = v;
        }
        if let Some(v) = self.min_hold_secs {
            profile.min_hold_secs = v;
        }
        if let Some(v) = self.time_exit_secs {
            profile.time_exit_secs = v;
        }
        if let Some(v) = self.generation_cooldown_secs {
            profile.generation_cooldown_secs = v;
        }
        if let Some(v) = self.trailing_stop_pct {
            profile.trailing_stop_pct = Some(v);
        }
        if let Some(v) = self.trailing_activation_pct {
            profile.trailing_activation_pct = v;
        }
        if let Some(v) = self.intraday {
            profile.intraday = v;
        }
        if let Some(v) = self.allows_multiple {
            profile.allows_multiple = v;
        }
        profile
    }
}
