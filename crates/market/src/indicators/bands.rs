use super::sma;

/// Bollinger band levels around a simple moving average.
#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `period` closes, `width` standard
/// deviations wide. Returns `None` on insufficient data.
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> Option<BollingerBands> {
    if period < 2 || closes.len() < period {
        return None;
    }
    let middle = sma(closes, period)?;
    let tail = &closes[closes.len() - period..];
    let variance = tail.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / period as f64;
    let stddev = variance.sqrt();

    Some(BollingerBands {
        middle,
        upper: middle + width * stddev,
        lower: middle - width * stddev,
    })
}
