//! Component scorers. Each maps raw indicator values to a score in 0..=100.

use crate::domain::indicators::{IndicatorSnapshot, TrendDirection};

/// Score returned when the input needed by a scorer is missing.
pub const NEUTRAL_SCORE: f64 = 50.0;

const MA_CONDITION_POINTS: f64 = 25.0;

/// Moving-average alignment: four independent 25-point conditions.
///
/// A condition whose inputs are missing contributes nothing.
pub fn ma_alignment_score(ind: &IndicatorSnapshot, current_price: f64) -> f64 {
    let mut score = 0.0;

    if let Some(sma_50) = ind.sma_50 {
        if current_price > sma_50 {
            score += MA_CONDITION_POINTS;
        }
    }

    let sma_cross = match (ind.sma_20, ind.sma_50) {
        (Some(s20), Some(s50)) => Some(s20 > s50),
        _ => None,
    };
    let ema_cross = match (ind.ema_20, ind.ema_50) {
        (Some(e20), Some(e50)) => Some(e20 > e50),
        _ => None,
    };

    if sma_cross == Some(true) {
        score += MA_CONDITION_POINTS;
    }
    if ema_cross == Some(true) {
        score += MA_CONDITION_POINTS;
    }

    // Strong alignment bonus: both crosses plus price above the short SMA.
    if let (Some(true), Some(true), Some(sma_20)) = (sma_cross, ema_cross, ind.sma_20) {
        if current_price > sma_20 {
            score += MA_CONDITION_POINTS;
        }
    }

    score
}

pub fn supertrend_score(direction: Option<TrendDirection>) -> f64 {
    match direction {
        Some(TrendDirection::Buy) => 100.0,
        Some(TrendDirection::Sell) => 0.0,
        None => NEUTRAL_SCORE,
    }
}

/// RSI remap favouring the 55..70 band. Each band includes its lower bound.
pub fn rsi_score(rsi: Option<f64>) -> f64 {
    let Some(rsi) = rsi.filter(|v| v.is_finite()) else {
        return NEUTRAL_SCORE;
    };

    if rsi >= 70.0 {
        // Overbought: decays as it deepens.
        (100.0 - (rsi - 70.0) * 2.0).max(0.0)
    } else if rsi >= 55.0 {
        90.0 - (70.0 - rsi) * 2.0
    } else if rsi >= 45.0 {
        50.0 + (rsi - 50.0) * 4.0
    } else if rsi >= 30.0 {
        50.0 - (45.0 - rsi) * 2.0
    } else {
        // Oversold: potential bounce.
        ((30.0 - rsi) * 2.0).min(100.0)
    }
}

/// Volume expansion from `volume_ratio` (current / average volume).
pub fn volume_score(volume_ratio: Option<f64>) -> f64 {
    let Some(ratio) = volume_ratio.filter(|v| v.is_finite()) else {
        return NEUTRAL_SCORE;
    };

    if ratio >= 2.0 {
        (80.0 + (ratio - 2.0) * 20.0).min(100.0)
    } else if ratio >= 1.2 {
        60.0 + (ratio - 1.2) * 25.0
    } else if ratio >= 0.8 {
        40.0 + (ratio - 0.8) * 50.0
    } else {
        (ratio * 50.0).max(20.0)
    }
}

/// Linear remap of an aggregated news sentiment in -1..=1.
pub fn sentiment_score(sentiment: Option<f64>) -> f64 {
    match sentiment.filter(|v| v.is_finite()) {
        Some(s) => (s.clamp(-1.0, 1.0) + 1.0) * 50.0,
        None => NEUTRAL_SCORE,
    }
}
