//! Scoring and signal-generation engine.
//!
//! Everything in here is pure. A [`ScoringEngine`] is a plain value built from an
//! [`EngineConfig`]; there is no global instance.

pub mod components;
pub mod levels;
pub mod rationale;

use crate::config::EngineConfig;
use crate::domain::analysis::{Classification, ComponentScores, SignalStrength, SignalType};
use crate::domain::indicators::IndicatorSnapshot;

/// Component weights in percentage points (they sum to 100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub ma_alignment: f64,
    pub supertrend: f64,
    pub rsi_strength: f64,
    pub volume_expansion: f64,
    pub news_sentiment: f64,
}

impl ScoreWeights {
    pub const STANDARD: Self = Self {
        ma_alignment: 30.0,
        supertrend: 25.0,
        rsi_strength: 15.0,
        volume_expansion: 10.0,
        news_sentiment: 20.0,
    };

    pub fn sum(&self) -> f64 {
        self.ma_alignment
            + self.supertrend
            + self.rsi_strength
            + self.volume_expansion
            + self.news_sentiment
    }
}

const BUY_STRONG_AT: f64 = 85.0;
const BUY_MODERATE_AT: f64 = 75.0;
const SELL_STRONG_AT: f64 = 15.0;
const SELL_MODERATE_AT: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: EngineConfig,
    weights: ScoreWeights,
}

impl ScoringEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            weights: ScoreWeights::STANDARD,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn component_scores(
        &self,
        indicators: &IndicatorSnapshot,
        current_price: f64,
        sentiment: Option<f64>,
    ) -> ComponentScores {
        ComponentScores {
            ma_alignment: components::ma_alignment_score(indicators, current_price),
            supertrend: components::supertrend_score(indicators.supertrend_direction),
            rsi_strength: components::rsi_score(indicators.rsi_14),
            volume_expansion: components::volume_score(indicators.volume_ratio),
            news_sentiment: components::sentiment_score(sentiment),
        }
    }

    /// Weighted total in 0..=100.
    pub fn total_score(&self, scores: &ComponentScores) -> f64 {
        let w = &self.weights;
        let weighted = scores.ma_alignment * w.ma_alignment
            + scores.supertrend * w.supertrend
            + scores.rsi_strength * w.rsi_strength
            + scores.volume_expansion * w.volume_expansion
            + scores.news_sentiment * w.news_sentiment;

        (weighted / 100.0).clamp(0.0, 100.0)
    }

    pub fn classify(&self, total_score: f64) -> Classification {
        if total_score >= self.config.buy_threshold {
            let strength = if total_score >= BUY_STRONG_AT {
                SignalStrength::Strong
            } else if total_score >= BUY_MODERATE_AT {
                SignalStrength::Moderate
            } else {
                SignalStrength::Weak
            };
            Classification {
                signal_type: SignalType::Buy,
                strength,
            }
        } else if total_score <= self.config.sell_threshold {
            let strength = if total_score <= SELL_STRONG_AT {
                SignalStrength::Strong
            } else if total_score <= SELL_MODERATE_AT {
                SignalStrength::Moderate
            } else {
                SignalStrength::Weak
            };
            Classification {
                signal_type: SignalType::Sell,
                strength,
            }
        } else {
            Classification {
                signal_type: SignalType::Hold,
                strength: SignalStrength::Neutral,
            }
        }
    }

    /// `(is_bullish, is_bearish)` from the bias thresholds, independent of [`Self::classify`].
    pub fn bias(&self, total_score: f64) -> (bool, bool) {
        (
            total_score >= self.config.bullish_threshold,
            total_score <= self.config.bearish_threshold,
        )
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
