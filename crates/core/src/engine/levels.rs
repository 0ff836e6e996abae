use crate::config::EngineConfig;
use crate::domain::analysis::SignalType;
use crate::domain::indicators::IndicatorSnapshot;
use serde::{Deserialize, Serialize};

// Stop used when no SuperTrend band is available (2% from entry).
const FALLBACK_STOP_PCT: f64 = 0.02;
// The stop is always at least 5% away from entry.
const MIN_STOP_DISTANCE_PCT: f64 = 0.05;
// Risk multiple for the second target when ATR is missing.
const TARGET_2_RISK_MULTIPLE: f64 = 2.5;

/// Entry / exit prices of a signal plus the derived risk metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    pub risk_amount: f64,
    pub reward_ratio_1: f64,
    pub reward_ratio_2: f64,
}

#[derive(Debug, Clone)]
pub struct LevelGenerator {
    target_1_risk_multiple: f64,
    target_2_atr_multiple: f64,
}

impl LevelGenerator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            target_1_risk_multiple: config.atr_multiplier_sl,
            target_2_atr_multiple: config.atr_multiplier_target,
        }
    }

    /// Levels for a BUY or SELL signal. HOLD has no levels.
    pub fn generate(
        &self,
        signal_type: SignalType,
        indicators: &IndicatorSnapshot,
        current_price: f64,
    ) -> Option<TradeLevels> {
        let ema_20 = indicators.ema_20.unwrap_or(current_price);

        match signal_type {
            SignalType::Buy => {
                let entry = current_price.max(ema_20);
                let stop = indicators
                    .supertrend_lower
                    .unwrap_or(entry * (1.0 - FALLBACK_STOP_PCT));
                let stop_loss = stop.min(entry * (1.0 - MIN_STOP_DISTANCE_PCT));
                let risk = entry - stop_loss;

                let target_1 = entry + risk * self.target_1_risk_multiple;
                let target_2 = match indicators.atr_14 {
                    Some(atr) => entry + atr * self.target_2_atr_multiple,
                    None => entry + risk * TARGET_2_RISK_MULTIPLE,
                };

                Some(TradeLevels {
                    entry,
                    stop_loss,
                    target_1,
                    target_2,
                    risk_amount: risk,
                    reward_ratio_1: reward_ratio(SignalType::Buy, entry, target_1, risk),
                    reward_ratio_2: reward_ratio(SignalType::Buy, entry, target_2, risk),
                })
            }
            SignalType::Sell => {
                let entry = current_price.min(ema_20);
                let stop = indicators
                    .supertrend_upper
                    .unwrap_or(entry * (1.0 + FALLBACK_STOP_PCT));
                let stop_loss = stop.max(entry * (1.0 + MIN_STOP_DISTANCE_PCT));
                let risk = stop_loss - entry;

                let target_1 = entry - risk * self.target_1_risk_multiple;
                let target_2 = match indicators.atr_14 {
                    Some(atr) => entry - atr * self.target_2_atr_multiple,
                    None => entry - risk * TARGET_2_RISK_MULTIPLE,
                };

                Some(TradeLevels {
                    entry,
                    stop_loss,
                    target_1,
                    target_2,
                    risk_amount: risk,
                    reward_ratio_1: reward_ratio(SignalType::Sell, entry, target_1, risk),
                    reward_ratio_2: reward_ratio(SignalType::Sell, entry, target_2, risk),
                })
            }
            SignalType::Hold => None,
        }
    }
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// Reward as a multiple of risk, positive when the target lies in the trade's direction
/// (above entry for BUY, below entry for SELL). Zero when there is no risk to divide by.
pub fn reward_ratio(signal_type: SignalType, entry: f64, target: f64, risk: f64) -> f64 {
    if !risk.is_finite() || risk <= 0.0 {
        return 0.0;
    }

    let reward = match signal_type {
        SignalType::Buy => target - entry,
        SignalType::Sell => entry - target,
        SignalType::Hold => return 0.0,
    };

    let ratio = reward / risk;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicators::TrendDirection;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn bullish() -> IndicatorSnapshot {
        IndicatorSnapshot {
            sma_20: Some(105.0),
            sma_50: Some(100.0),
            ema_20: Some(106.0),
            ema_50: Some(101.0),
            rsi_14: Some(60.0),
            volume_ratio: Some(1.5),
            supertrend_direction: Some(TrendDirection::Buy),
            atr_14: Some(4.0),
            supertrend_lower: Some(98.0),
            ..IndicatorSnapshot::default()
        }
    }

    #[test]
    fn buy_levels_for_reference_scenario() {
        let lv = LevelGenerator::default()
            .generate(SignalType::Buy, &bullish(), 107.0)
            .unwrap();
        assert!(approx(lv.entry, 107.0));
        assert!(approx(lv.stop_loss, 98.0));
        assert!(approx(lv.risk_amount, 9.0));
        assert!(approx(lv.target_1, 120.5));
        assert!(approx(lv.target_2, 115.0));
        assert!(approx(lv.reward_ratio_1, 1.5));
        assert!(approx(lv.reward_ratio_2, 8.0 / 9.0));
    }

    #[test]
    fn buy_entry_uses_ema_when_above_price() {
        let lv = LevelGenerator::default()
            .generate(SignalType::Buy, &bullish(), 104.0)
            .unwrap();
        assert!(approx(lv.entry, 106.0));
    }

    #[test]
    fn buy_stop_is_capped_at_five_percent_below_entry() {
        let ind = IndicatorSnapshot {
            supertrend_lower: Some(105.0),
            ..bullish()
        };
        let lv = LevelGenerator::default()
            .generate(SignalType::Buy, &ind, 107.0)
            .unwrap();
        assert!(approx(lv.stop_loss, 107.0 * 0.95));
        assert!(lv.stop_loss <= lv.entry * 0.95 + 1e-12);
    }

    #[test]
    fn buy_fallbacks_without_band_or_atr() {
        let ind = IndicatorSnapshot {
            ema_20: None,
            atr_14: None,
            supertrend_lower: None,
            ..bullish()
        };
        let lv = LevelGenerator::default()
            .generate(SignalType::Buy, &ind, 100.0)
            .unwrap();
        // The 2% fallback is always inside the 5% floor, so the floor wins.
        assert!(approx(lv.entry, 100.0));
        assert!(approx(lv.stop_loss, 95.0));
        assert!(approx(lv.risk_amount, 5.0));
        assert!(approx(lv.target_1, 107.5));
        assert!(approx(lv.target_2, 112.5));
        assert!(approx(lv.reward_ratio_2, 2.5));
    }

    #[test]
    fn sell_levels_mirror_buy() {
        let ind = IndicatorSnapshot {
            ema_20: Some(99.0),
            atr_14: Some(3.0),
            supertrend_upper: Some(110.0),
            ..IndicatorSnapshot::default()
        };
        let lv = LevelGenerator::default()
            .generate(SignalType::Sell, &ind, 100.0)
            .unwrap();
        assert!(approx(lv.entry, 99.0));
        assert!(approx(lv.stop_loss, 110.0));
        assert!(approx(lv.risk_amount, 11.0));
        assert!(approx(lv.target_1, 99.0 - 16.5));
        assert!(approx(lv.target_2, 93.0));
        // Ratios are positive for targets below a SELL entry.
        assert!(approx(lv.reward_ratio_1, 1.5));
        assert!(approx(lv.reward_ratio_2, 6.0 / 11.0));
    }

    #[test]
    fn sell_stop_is_floored_at_five_percent_above_entry() {
        let ind = IndicatorSnapshot {
            supertrend_upper: Some(101.0),
            ..IndicatorSnapshot::default()
        };
        let lv = LevelGenerator::default()
            .generate(SignalType::Sell, &ind, 100.0)
            .unwrap();
        assert!(approx(lv.stop_loss, 105.0));
        assert!(lv.stop_loss >= lv.entry * 1.05 - 1e-12);
        assert!(approx(lv.target_2, 100.0 - 5.0 * 2.5));
    }

    #[test]
    fn hold_has_no_levels() {
        assert!(LevelGenerator::default()
            .generate(SignalType::Hold, &bullish(), 107.0)
            .is_none());
    }

    #[test]
    fn multipliers_come_from_config() {
        let gen = LevelGenerator::new(&EngineConfig {
            atr_multiplier_target: 3.0,
            atr_multiplier_sl: 2.0,
            ..EngineConfig::default()
        });
        let lv = gen.generate(SignalType::Buy, &bullish(), 107.0).unwrap();
        assert!(approx(lv.target_1, 107.0 + 18.0));
        assert!(approx(lv.target_2, 119.0));
    }

    #[test]
    fn reward_ratio_is_zero_without_risk() {
        assert_eq!(reward_ratio(SignalType::Buy, 100.0, 110.0, 0.0), 0.0);
        assert_eq!(reward_ratio(SignalType::Sell, 100.0, 90.0, -1.0), 0.0);
        assert_eq!(reward_ratio(SignalType::Buy, 100.0, 110.0, f64::NAN), 0.0);

        // Zero price collapses entry and stop onto each other.
        let lv = LevelGenerator::default()
            .generate(SignalType::Buy, &IndicatorSnapshot::default(), 0.0)
            .unwrap();
        assert_eq!(lv.risk_amount, 0.0);
        assert_eq!(lv.reward_ratio_1, 0.0);
        assert_eq!(lv.reward_ratio_2, 0.0);
    }
}
