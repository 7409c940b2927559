pub mod bands;
pub mod macd;
pub mod rsi;
pub mod trend;

pub use bands::{bollinger, BollingerBands};
pub use macd::MacdIndicator;
pub use rsi::RsiIndicator;
pub use trend::{classify_trend, trend_strength, volatility_ratio};

use common::{IndicatorSet, TrendDirection};

/// Fixed periods used across the whole pipeline. Every snapshot carries the
/// same indicator set, so these are not per-strategy knobs.
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const SMA_FAST_PERIOD: usize = 20;
pub const SMA_SLOW_PERIOD: usize = 50;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;

/// Minimum history length needed to compute a full indicator set.
pub const MIN_HISTORY: usize = 60;

/// Simple moving average of the last `period` values.
pub fn sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let tail = &closes[closes.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average over the series, seeded with an SMA of the
/// first `period` values.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut value = closes[..period].iter().sum::<f64>() / period as f64;
    for &price in &closes[period..] {
        value = price * k + value * (1.0 - k);
    }
    Some(value)
}

/// Compute the full indicator set from a close-price history (oldest first).
/// Returns `None` until enough history has accumulated.
pub fn compute_indicator_set(closes: &[f64]) -> Option<IndicatorSet> {
    if closes.len() < MIN_HISTORY {
        return None;
    }

    let rsi = RsiIndicator::new(RSI_PERIOD).compute(closes)?;
    let macd = MacdIndicator::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL).compute(closes)?;
    let sma_fast = sma(closes, SMA_FAST_PERIOD)?;
    let sma_slow = sma(closes, SMA_SLOW_PERIOD)?;
    let ema_fast = ema(closes, MACD_FAST)?;
    let ema_slow = ema(closes, MACD_SLOW)?;
    let bands = bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH)?;

    let trend_short = classify_trend(closes, 10);
    let trend_medium = classify_trend(closes, 25);
    let trend_long = classify_trend(closes, 50);

    Some(IndicatorSet {
        rsi,
        macd,
        sma_fast,
        sma_slow,
        ema_fast,
        ema_slow,
        bollinger_upper: bands.upper,
        bollinger_lower: bands.lower,
        trend_short,
        trend_medium,
        trend_long,
        trend_strength: trend_strength(sma_fast, sma_slow),
        volatility_ratio: volatility_ratio(closes),
    })
}

/// Overall trend direction by majority vote across timeframes.
pub fn overall_trend(set: &IndicatorSet) -> TrendDirection {
    let votes = [set.trend_short, set.trend_medium, set.trend_long];
    let ups = votes.iter().filter(|t| **t == TrendDirection::Up).count();
    let downs = votes.iter().filter(|t| **t == TrendDirection::Down).count();
    if ups >= 2 {
        TrendDirection::Up
    } else if downs >= 2 {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    }
}
