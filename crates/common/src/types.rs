use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a trade or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Coarse trend classification for a single timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

/// Crossover state of a two-line indicator on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crossover {
    Bullish,
    Bearish,
    Neutral,
}

/// MACD values for the latest bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MacdValues {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub crossover: Crossover,
}

/// Full indicator set computed by the collector from one instrument's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: MacdValues,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    /// Trend per timeframe, shortest to longest.
    pub trend_short: TrendDirection,
    pub trend_medium: TrendDirection,
    pub trend_long: TrendDirection,
    /// Aggregate trend strength in [0, 1].
    pub trend_strength: f64,
    /// Current volatility relative to its rolling average. 1.0 = normal.
    pub volatility_ratio: f64,
}

/// Latest market state for one instrument. Immutable once written; the
/// collector replaces the whole snapshot on every successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub instrument: String,
    pub price: f64,
    pub indicators: IndicatorSet,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// Coarse classification of current market behaviour, used to shift the
/// signal acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    StrongTrendUp,
    StrongTrendDown,
    WeakTrend,
    RangeBound,
    HighVolatility,
    LowVolatility,
    NewsPhase,
}

/// How aggressively the bot accepts signals. Sets the base confidence
/// threshold before any regime adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Conservative,
    Neutral,
    Aggressive,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Conservative => write!(f, "conservative"),
            TradingMode::Neutral => write!(f, "neutral"),
            TradingMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Whether orders go to the real execution gateway or the paper simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Paper,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => write!(f, "live"),
            RunMode::Paper => write!(f, "paper"),
        }
    }
}

/// Closed set of strategy variants. Dispatch is always a match on this tag;
/// there is no string-keyed lookup and no fallback variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum StrategyKind {
    Day,
    Swing,
    Scalp,
    MeanReversion,
    Momentum,
    Breakout,
    Grid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::Day,
        StrategyKind::Swing,
        StrategyKind::Scalp,
        StrategyKind::MeanReversion,
        StrategyKind::Momentum,
        StrategyKind::Breakout,
        StrategyKind::Grid,
    ];

    /// Range-seeking strategies trade against extension and are penalized
    /// in strongly trending markets.
    pub fn is_range_seeking(self) -> bool {
        matches!(self, StrategyKind::MeanReversion | StrategyKind::Grid)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyKind::Day => "day",
            StrategyKind::Swing => "swing",
            StrategyKind::Scalp => "scalp",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::Momentum => "momentum",
            StrategyKind::Breakout => "breakout",
            StrategyKind::Grid => "grid",
        };
        write!(f, "{s}")
    }
}

/// The four scoring pillars, retained on every signal for audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PillarScores {
    pub base_signal: f64,
    pub trend_confluence: f64,
    pub volatility: f64,
    pub sentiment: f64,
}

impl PillarScores {
    pub fn total(&self) -> f64 {
        self.base_signal + self.trend_confluence + self.volatility + self.sentiment
    }
}

/// A scored trade candidate emitted by the generator, consumed exactly once
/// by the executor (or discarded when stale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub account: String,
    pub instrument: String,
    pub strategy: StrategyKind,
    pub direction: Direction,
    /// Confidence score in [0, 100].
    pub confidence: f64,
    pub pillars: PillarScores,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.generated_at > max_age
    }
}

/// Lifecycle status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closing,
    Closed,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    TrailingStop,
    PeakDrawdown,
    TimeExit,
    SessionClose,
    WeekClose,
    /// Reconciliation found the broker-side position already gone.
    External,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::TakeProfit => "TAKE_PROFIT",
            CloseReason::StopLoss => "STOP_LOSS",
            CloseReason::TrailingStop => "TRAILING_STOP",
            CloseReason::PeakDrawdown => "PEAK_DRAWDOWN",
            CloseReason::TimeExit => "TIME_EXIT",
            CloseReason::SessionClose => "SESSION_CLOSE",
            CloseReason::WeekClose => "WEEK_CLOSE",
            CloseReason::External => "EXTERNAL",
        };
        write!(f, "{s}")
    }
}

/// An open or closed trading position recorded in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    pub id: String,
    pub account: String,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub strategy: StrategyKind,
    pub status: PositionStatus,
    pub close_reason: Option<CloseReason>,
    /// Broker ticket id, used for close calls and restart reconciliation.
    pub ticket: String,
    /// Highest unrealized profit observed while open. Never lowered.
    pub peak_profit: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Unrealized profit at the given price, direction-aware.
    pub fn unrealized_profit(&self, current_price: f64) -> f64 {
        match self.direction {
            Direction::Buy => (current_price - self.entry_price) * self.quantity,
            Direction::Sell => (self.entry_price - current_price) * self.quantity,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.opened_at
    }
}

/// Read-only account risk snapshot fetched from the execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRiskState {
    pub account: String,
    pub balance: f64,
    pub equity: f64,
    pub margin_used: f64,
}

impl AccountRiskState {
    pub fn portfolio_risk_percent(&self) -> f64 {
        if self.balance <= 0.0 {
            return 100.0;
        }
        self.margin_used / self.balance * 100.0
    }
}

/// A broker-side position as reported by `list_open_positions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub ticket: String,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub current_price: f64,
}

/// Order parameters sent to the execution collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRequest {
    pub account: String,
    pub instrument: String,
    pub direction: Direction,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Approved order parameters produced by the sizing engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderPlan {
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Risk percentage the sizing tier selected, kept for audit logging.
    pub risk_pct: f64,
}

/// Qualitative market sentiment from the advisory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Advisory evaluation of a candidate trade. Purely advisory; its absence
/// must never block signal generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub bullish_arguments: Vec<String>,
    pub bearish_arguments: Vec<String>,
    /// Directional adjustment in [-1, 1]; positive = bullish.
    pub adjustment: f64,
}

/// Expected, frequent rejection outcomes on the decision hot path. These are
/// values, not errors — an actor logs them and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    RiskLimitExceeded,
    DuplicatePosition,
    CooldownActive,
    ReservationConflict,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::RiskLimitExceeded => write!(f, "risk limit exceeded"),
            RejectReason::DuplicatePosition => write!(f, "duplicate position"),
            RejectReason::CooldownActive => write!(f, "cooldown active"),
            RejectReason::ReservationConflict => write!(f, "reservation conflict"),
        }
    }
}

/// Operator-visible escalations. Everything here implies state uncertainty
/// or exhausted retries; routine rejections never reach this channel.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    OpenFailed {
        instrument: String,
        error: String,
    },
    /// Open call timed out after the broker may have accepted it. Not
    /// retried; resolved by reconciliation against `list_open_positions`.
    OpenAmbiguous {
        instrument: String,
        error: String,
    },
    CloseRetriesExhausted {
        position_id: String,
        instrument: String,
        error: String,
    },
    ExternalClose {
        position_id: String,
        ticket: String,
    },
}

/// Current state of the trading core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoreState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreState::Stopped => write!(f, "stopped"),
            CoreState::Running => write!(f, "running"),
            CoreState::Paused => write!(f, "paused"),
        }
    }
}

/// Administrative commands accepted by the core.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Reservation/cooldown resource key: one per (account, instrument).
pub fn resource_key(account: &str, instrument: &str) -> String {
    format!("{account}:{instrument}")
}
