use chrono::{DateTime, NaiveTime, Utc};

use common::{IndicatorSet, MarketRegime, TradingMode, TrendDirection};

use market::indicators::overall_trend;

/// Volatility ratio above which the market counts as volatility-driven.
const HIGH_VOL_RATIO: f64 = 1.8;
/// Volatility ratio below which the market counts as unusually quiet.
const LOW_VOL_RATIO: f64 = 0.5;
/// Trend strength at which a trend counts as strong.
const STRONG_TREND: f64 = 0.7;
/// Trend strength at which a trend counts as present at all.
const WEAK_TREND: f64 = 0.35;

/// Classify the current market regime from the indicator set and the
/// configured news windows. Pure; the news check only reads the clock value
/// passed in.
pub fn classify_regime(
    indicators: &IndicatorSet,
    news_windows: &[(NaiveTime, NaiveTime)],
    now: DateTime<Utc>,
) -> MarketRegime {
    if in_news_window(news_windows, now) {
        return MarketRegime::NewsPhase;
    }

    if indicators.volatility_ratio >= HIGH_VOL_RATIO {
        return MarketRegime::HighVolatility;
    }
    if indicators.volatility_ratio <= LOW_VOL_RATIO {
        return MarketRegime::LowVolatility;
    }

    if indicators.trend_strength >= STRONG_TREND {
        return match overall_trend(indicators) {
            TrendDirection::Up => MarketRegime::StrongTrendUp,
            TrendDirection::Down => MarketRegime::StrongTrendDown,
            // Strong SMA divergence without timeframe agreement reads as
            // an unsettled market, not a strong trend.
            TrendDirection::Neutral => MarketRegime::WeakTrend,
        };
    }
    if indicators.trend_strength >= WEAK_TREND {
        return MarketRegime::WeakTrend;
    }
    MarketRegime::RangeBound
}

fn in_news_window(windows: &[(NaiveTime, NaiveTime)], now: DateTime<Utc>) -> bool {
    let t = now.time();
    windows.iter().any(|(from, to)| {
        if from <= to {
            t >= *from && t <= *to
        } else {
            // window wraps midnight
            t >= *from || t <= *to
        }
    })
}

/// Base confidence threshold by trading mode.
pub fn base_threshold(mode: TradingMode) -> f64 {
    match mode {
        TradingMode::Conservative => 70.0,
        TradingMode::Neutral => 60.0,
        TradingMode::Aggressive => 50.0,
    }
}

/// Regime adjustment added to the base threshold. `NewsPhase` never reaches
/// this table; it forces no-signal upstream.
pub fn regime_adjustment(regime: MarketRegime) -> f64 {
    match regime {
        MarketRegime::StrongTrendUp | MarketRegime::StrongTrendDown => -5.0,
        MarketRegime::WeakTrend => 0.0,
        MarketRegime::RangeBound => 5.0,
        MarketRegime::HighVolatility => 10.0,
        MarketRegime::LowVolatility => 0.0,
        MarketRegime::NewsPhase => f64::INFINITY,
    }
}
