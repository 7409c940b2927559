use common::{Crossover, MacdValues};

use super::ema;

/// MACD (Moving Average Convergence/Divergence).
///
/// MACD line = EMA(fast) − EMA(slow); signal = EMA(macd_line, signal_period).
/// Reports the latest line/signal/histogram values plus whether the latest
/// bar produced a crossover.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast < slow, "MACD fast period must be less than slow period");
        Self { fast, slow, signal }
    }

    /// Compute MACD values from close prices (oldest first).
    /// Needs at least `slow + signal` values; returns `None` otherwise.
    pub fn compute(&self, closes: &[f64]) -> Option<MacdValues> {
        if closes.len() < self.slow + self.signal {
            return None;
        }

        // MACD line per bar once the slow EMA is defined
        let macd_line: Vec<f64> = (self.slow..=closes.len())
            .map(|end| {
                let slice = &closes[..end];
                ema(slice, self.fast).unwrap_or(0.0) - ema(slice, self.slow).unwrap_or(0.0)
            })
            .collect();

        if macd_line.len() < self.signal + 1 {
            return None;
        }

        // Signal line for the last two bars (need prev + current for crossover)
        let signal_prev = ema(&macd_line[..macd_line.len() - 1], self.signal)?;
        let signal_curr = ema(&macd_line, self.signal)?;

        let line_prev = macd_line[macd_line.len() - 2];
        let line_curr = *macd_line.last().unwrap();

        let crossover = if line_prev <= signal_prev && line_curr > signal_curr {
            Crossover::Bullish
        } else if line_prev >= signal_prev && line_curr < signal_curr {
            Crossover::Bearish
        } else {
            Crossover::Neutral
        };

        Some(MacdValues {
            line: line_curr,
            signal: signal_curr,
            histogram: line_curr - signal_curr,
            crossover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_returns_none_with_insufficient_data() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices = vec![100.0; 30]; // need >= 35
        assert!(macd.compute(&prices).is_none());
    }

    #[test]
    fn macd_returns_some_with_sufficient_data() {
        let macd = MacdIndicator::new(12, 26, 9);
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert!(macd.compute(&prices).is_some());
    }

    #[test]
    fn macd_histogram_positive_in_uptrend() {
        let macd = MacdIndicator::new(3, 6, 3);
        // Flat then accelerating up: fast EMA pulls ahead of slow
        let mut prices = vec![100.0; 20];
        prices.extend((0..20).map(|i| 100.0 + i as f64 * 2.0));
        let values = macd.compute(&prices).unwrap();
        assert!(values.histogram > 0.0, "histogram {}", values.histogram);
    }

    #[test]
    fn macd_detects_bullish_crossover_after_reversal() {
        let macd = MacdIndicator::new(3, 6, 3);
        // Down, then a sharp reversal — at some bar along the way the MACD
        // line must cross up through its signal line.
        let mut prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 0.5).collect();
        let mut saw_bullish = false;
        for i in 0..20 {
            prices.push(90.0 + i as f64 * 2.0);
            if let Some(v) = macd.compute(&prices) {
                if v.crossover == Crossover::Bullish {
                    saw_bullish = true;
                }
            }
        }
        assert!(saw_bullish, "no bullish crossover detected across the reversal");
    }
}
