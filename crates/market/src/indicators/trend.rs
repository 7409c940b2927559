use common::TrendDirection;

/// Net percentage move below which a window counts as flat.
const FLAT_THRESHOLD_PCT: f64 = 0.15;

/// Divergence between fast and slow SMA (as a fraction of the slow SMA)
/// that maps to full trend strength.
const FULL_STRENGTH_DIVERGENCE: f64 = 0.02;

/// Windows used for the volatility ratio: recent stddev vs rolling baseline.
const VOL_RECENT: usize = 20;
const VOL_BASELINE: usize = 60;

/// Classify the trend over the last `window` closes by net percentage move.
pub fn classify_trend(closes: &[f64], window: usize) -> TrendDirection {
    if window < 2 || closes.len() < window {
        return TrendDirection::Neutral;
    }
    let tail = &closes[closes.len() - window..];
    let first = tail[0];
    let last = tail[window - 1];
    if first <= 0.0 {
        return TrendDirection::Neutral;
    }
    let change_pct = (last - first) / first * 100.0;
    if change_pct > FLAT_THRESHOLD_PCT {
        TrendDirection::Up
    } else if change_pct < -FLAT_THRESHOLD_PCT {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    }
}

/// Trend strength in [0, 1] from the divergence of fast and slow SMAs.
pub fn trend_strength(sma_fast: f64, sma_slow: f64) -> f64 {
    if sma_slow <= 0.0 {
        return 0.0;
    }
    let divergence = (sma_fast - sma_slow).abs() / sma_slow;
    (divergence / FULL_STRENGTH_DIVERGENCE).min(1.0)
}

/// Stddev of recent returns relative to the rolling baseline stddev.
/// 1.0 = normal volatility; > 1 expansion; < 1 contraction.
pub fn volatility_ratio(closes: &[f64]) -> f64 {
    let recent = returns_stddev(closes, VOL_RECENT);
    let baseline = returns_stddev(closes, VOL_BASELINE);
    match (recent, baseline) {
        (Some(r), Some(b)) if b > 0.0 => r / b,
        _ => 1.0,
    }
}

fn returns_stddev(closes: &[f64], window: usize) -> Option<f64> {
    if closes.len() < window + 1 {
        return None;
    }
    let tail = &closes[closes.len() - (window + 1)..];
    let returns: Vec<f64> = tail
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    Some(variance.sqrt())
}
