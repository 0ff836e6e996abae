use crate::domain::analysis::ComponentScores;
use crate::domain::indicators::IndicatorSnapshot;
use crate::domain::signal::Rationale;

pub const STRONG_MA_ALIGNMENT: &str = "Strong moving average alignment";
pub const BULLISH_MA_CROSSOVER: &str = "Bullish MA crossover";
pub const SUPERTREND_BULLISH: &str = "SuperTrend in bullish mode";
pub const SUPERTREND_BEARISH: &str = "SuperTrend in bearish mode";
pub const STRONG_RSI_MOMENTUM: &str = "Strong RSI momentum";
pub const HIGH_VOLUME: &str = "High volume confirmation";
pub const POSITIVE_NEWS: &str = "Positive news sentiment";
pub const RSI_OVERBOUGHT: &str = "RSI overbought";
pub const RSI_OVERSOLD: &str = "RSI oversold";

/// Builds the rationale of a signal from its component scores and raw indicators.
///
/// Rules run in a fixed order and each one is evaluated on its own.
pub fn build_rationale(scores: &ComponentScores, indicators: &IndicatorSnapshot) -> Rationale {
    let mut out = Rationale::default();

    if scores.ma_alignment > 70.0 {
        out.reasons.push(STRONG_MA_ALIGNMENT.to_string());
        out.technical_factors.push(BULLISH_MA_CROSSOVER.to_string());
    }

    if scores.supertrend > 80.0 {
        out.reasons.push(SUPERTREND_BULLISH.to_string());
    }
    if scores.supertrend < 20.0 {
        out.reasons.push(SUPERTREND_BEARISH.to_string());
    }

    if scores.rsi_strength > 70.0 {
        out.technical_factors.push(STRONG_RSI_MOMENTUM.to_string());
    }

    if scores.volume_expansion > 70.0 {
        out.technical_factors.push(HIGH_VOLUME.to_string());
    }

    if scores.news_sentiment > 70.0 {
        out.reasons.push(POSITIVE_NEWS.to_string());
    }

    // Risk flags look at the raw RSI; a missing RSI raises neither.
    if let Some(rsi) = indicators.rsi_14 {
        if rsi > 75.0 {
            out.risk_factors.push(RSI_OVERBOUGHT.to_string());
        }
        if rsi < 25.0 {
            out.risk_factors.push(RSI_OVERSOLD.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scores(v: [f64; 5]) -> ComponentScores {
        ComponentScores {
            ma_alignment: v[0],
            supertrend: v[1],
            rsi_strength: v[2],
            volume_expansion: v[3],
            news_sentiment: v[4],
        }
    }

    #[test]
    fn bullish_setup_collects_reasons_in_order() {
        let ind = IndicatorSnapshot {
            rsi_14: Some(78.0),
            ..IndicatorSnapshot::default()
        };
        let r = build_rationale(&scores([100.0, 100.0, 90.0, 80.0, 75.0]), &ind);
        assert_eq!(
            r.reasons,
            vec![STRONG_MA_ALIGNMENT, SUPERTREND_BULLISH, POSITIVE_NEWS]
        );
        assert_eq!(
            r.technical_factors,
            vec![BULLISH_MA_CROSSOVER, STRONG_RSI_MOMENTUM, HIGH_VOLUME]
        );
        assert_eq!(r.risk_factors, vec![RSI_OVERBOUGHT]);
    }

    #[test]
    fn bearish_setup() {
        let ind = IndicatorSnapshot {
            rsi_14: Some(20.0),
            ..IndicatorSnapshot::default()
        };
        let r = build_rationale(&scores([0.0, 0.0, 20.0, 30.0, 20.0]), &ind);
        assert_eq!(r.reasons, vec![SUPERTREND_BEARISH]);
        assert!(r.technical_factors.is_empty());
        assert_eq!(r.risk_factors, vec![RSI_OVERSOLD]);
    }

    #[test]
    fn thresholds_are_strict() {
        let ind = IndicatorSnapshot {
            rsi_14: Some(75.0),
            ..IndicatorSnapshot::default()
        };
        let r = build_rationale(&scores([70.0, 80.0, 70.0, 70.0, 70.0]), &ind);
        assert_eq!(r, Rationale::default());
    }

    #[test]
    fn missing_rsi_raises_no_risk_flag() {
        let r = build_rationale(&scores([50.0; 5]), &IndicatorSnapshot::default());
        assert!(r.risk_factors.is_empty());
    }

    #[test]
    fn serializes_as_three_buckets() {
        let r = build_rationale(
            &scores([100.0, 50.0, 50.0, 50.0, 50.0]),
            &IndicatorSnapshot::default(),
        );
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({
                "reasons": [STRONG_MA_ALIGNMENT],
                "technical_factors": [BULLISH_MA_CROSSOVER],
                "risk_factors": []
            })
        );
    }
}
