use chrono::NaiveTime;

use crate::{RunMode, TradingMode};

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Execution gateway
    pub execution_url: String,
    pub execution_token: String,

    // Market data
    pub market_data_url: String,

    // Advisory service (optional)
    pub advisory_url: Option<String>,

    // Trading
    pub run_mode: RunMode,
    pub trading_mode: TradingMode,
    pub account_id: String,
    pub instruments: Vec<String>,
    pub paper_balance: f64,
    /// Start trading immediately instead of waiting for a Start command.
    pub auto_start: bool,

    // Actor tick intervals
    pub collector_interval_secs: u64,
    pub generator_interval_secs: u64,
    pub executor_interval_secs: u64,

    // Gating / monitoring
    pub trade_cooldown_secs: i64,
    pub max_portfolio_risk_pct: f64,
    pub signal_max_age_secs: i64,
    pub reservation_ttl_secs: i64,
    pub peak_drawdown_threshold: f64,
    pub session_end_hour_utc: u32,
    pub session_close_window_mins: i64,
    /// UTC windows during which signal generation is suppressed (news phase).
    pub news_windows_utc: Vec<(NaiveTime, NaiveTime)>,

    // Control API
    pub control_port: u16,
    pub control_token: String,

    // Database
    pub database_url: String,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let run_mode = match required_env("RUN_MODE").to_lowercase().as_str() {
            "paper" => RunMode::Paper,
            "live" => RunMode::Live,
            other => panic!("ERROR: RUN_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        let trading_mode = match optional_env("TRADING_MODE")
            .unwrap_or_else(|| "neutral".to_string())
            .to_lowercase()
            .as_str()
        {
            "conservative" => TradingMode::Conservative,
            "neutral" => TradingMode::Neutral,
            "aggressive" => TradingMode::Aggressive,
            other => panic!(
                "ERROR: TRADING_MODE must be 'conservative', 'neutral' or 'aggressive', got: '{other}'"
            ),
        };

        let instruments: Vec<String> = required_env("INSTRUMENTS")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if instruments.is_empty() {
            panic!("INSTRUMENTS must list at least one instrument");
        }

        let news_windows_utc = optional_env("NEWS_WINDOWS_UTC")
            .map(|raw| parse_news_windows(&raw))
            .unwrap_or_default();

        Config {
            execution_url: required_env("EXECUTION_GATEWAY_URL"),
            execution_token: required_env("EXECUTION_GATEWAY_TOKEN"),
            market_data_url: required_env("MARKET_DATA_URL"),
            advisory_url: optional_env("ADVISORY_URL"),
            run_mode,
            trading_mode,
            account_id: required_env("ACCOUNT_ID"),
            instruments,
            paper_balance: parsed_env("PAPER_BALANCE", 10_000.0),
            auto_start: parsed_env("AUTO_START", true),
            collector_interval_secs: parsed_env("COLLECTOR_INTERVAL_SECS", 60),
            generator_interval_secs: parsed_env("GENERATOR_INTERVAL_SECS", 30),
            executor_interval_secs: parsed_env("EXECUTOR_INTERVAL_SECS", 10),
            trade_cooldown_secs: parsed_env("TRADE_COOLDOWN_SECS", 900),
            max_portfolio_risk_pct: parsed_env("MAX_PORTFOLIO_RISK_PCT", 20.0),
            signal_max_age_secs: parsed_env("SIGNAL_MAX_AGE_SECS", 120),
            reservation_ttl_secs: parsed_env("RESERVATION_TTL_SECS", 30),
            peak_drawdown_threshold: parsed_env("PEAK_DRAWDOWN_THRESHOLD", 0.20),
            session_end_hour_utc: parsed_env("SESSION_END_HOUR_UTC", 21),
            session_close_window_mins: parsed_env("SESSION_CLOSE_WINDOW_MINS", 15),
            news_windows_utc,
            control_port: parsed_env("CONTROL_PORT", 8080),
            control_token: required_env("CONTROL_TOKEN"),
            database_url: required_env("DATABASE_URL"),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        }
    }
}

/// Parse "HH:MM-HH:MM,HH:MM-HH:MM" into window pairs. Panics on bad input
/// so a typo is caught at startup, not mid-session.
fn parse_news_windows(raw: &str) -> Vec<(NaiveTime, NaiveTime)> {
    raw.split(',')
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let (from, to) = w
                .split_once('-')
                .unwrap_or_else(|| panic!("NEWS_WINDOWS_UTC entry '{w}' must be 'HH:MM-HH:MM'"));
            let parse = |s: &str| {
                NaiveTime::parse_from_str(s.trim(), "%H:%M")
                    .unwrap_or_else(|_| panic!("NEWS_WINDOWS_UTC contains invalid time '{s}'"))
            };
            (parse(from), parse(to))
        })
        .collect()
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    optional_env(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
