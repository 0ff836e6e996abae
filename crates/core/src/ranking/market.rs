use crate::domain::analysis::{Analysis, SignalType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Share of the universe carrying BUY (or SELL) signals that tips the day's status.
const SIGNAL_SHARE_TILT: f64 = 0.3;
const BULLISH_AVERAGE: f64 = 60.0;
const BEARISH_AVERAGE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketSentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl MarketSentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
            Self::Neutral => "NEUTRAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BULLISH" => Some(Self::Bullish),
            "BEARISH" => Some(Self::Bearish),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Per-date market record written together with a run's analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub trading_date: NaiveDate,
    pub overall_sentiment: MarketSentiment,
    pub total_stocks_analyzed: i32,
    pub bullish_stocks: i32,
    pub bearish_stocks: i32,
}

pub fn derive_market_status(
    trading_date: NaiveDate,
    analyzed: usize,
    buy_signals: usize,
    sell_signals: usize,
) -> MarketStatus {
    let overall_sentiment = if analyzed == 0 {
        MarketSentiment::Neutral
    } else {
        let buy_ratio = buy_signals as f64 / analyzed as f64;
        let sell_ratio = sell_signals as f64 / analyzed as f64;
        if buy_ratio > SIGNAL_SHARE_TILT {
            MarketSentiment::Bullish
        } else if sell_ratio > SIGNAL_SHARE_TILT {
            MarketSentiment::Bearish
        } else {
            MarketSentiment::Neutral
        }
    };

    MarketStatus {
        trading_date,
        overall_sentiment,
        total_stocks_analyzed: clamp_count(analyzed),
        bullish_stocks: clamp_count(buy_signals),
        bearish_stocks: clamp_count(sell_signals),
    }
}

/// Read-side summary of one date's analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub date: NaiveDate,
    pub overall_sentiment: MarketSentiment,
    pub average_score: f64,
    pub total_stocks_analyzed: usize,
    pub bullish_stocks: usize,
    pub bearish_stocks: usize,
    pub neutral_stocks: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub bullish_percentage: f64,
    pub bearish_percentage: f64,
}

pub fn summarize_market(date: NaiveDate, analyses: &[Analysis]) -> Option<MarketSummary> {
    if analyses.is_empty() {
        return None;
    }

    let total = analyses.len();
    let bullish = analyses.iter().filter(|a| a.is_bullish).count();
    let bearish = analyses.iter().filter(|a| a.is_bearish).count();
    let average = analyses.iter().map(|a| a.total_score).sum::<f64>() / total as f64;

    let overall_sentiment = if average >= BULLISH_AVERAGE {
        MarketSentiment::Bullish
    } else if average <= BEARISH_AVERAGE {
        MarketSentiment::Bearish
    } else {
        MarketSentiment::Neutral
    };

    let count_type = |ty: SignalType| {
        analyses
            .iter()
            .filter(|a| a.signal_type() == Some(ty))
            .count()
    };

    Some(MarketSummary {
        date,
        overall_sentiment,
        average_score: round2(average),
        total_stocks_analyzed: total,
        bullish_stocks: bullish,
        bearish_stocks: bearish,
        neutral_stocks: total - bullish - bearish,
        buy_signals: count_type(SignalType::Buy),
        sell_signals: count_type(SignalType::Sell),
        bullish_percentage: round2(bullish as f64 / total as f64 * 100.0),
        bearish_percentage: round2(bearish as f64 / total as f64 * 100.0),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn clamp_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::ComponentScores;
    use crate::engine::ScoringEngine;
    use uuid::Uuid;

    fn analysis(total: f64) -> Analysis {
        let engine = ScoringEngine::default();
        let (is_bullish, is_bearish) = engine.bias(total);
        Analysis {
            stock_id: Uuid::new_v4(),
            symbol: format!("S{total}"),
            analysis_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            scores: ComponentScores {
                ma_alignment: total,
                supertrend: total,
                rsi_strength: total,
                volume_expansion: total,
                news_sentiment: total,
            },
            total_score: total,
            is_bullish,
            is_bearish,
            classification: engine.classify(total),
        }
    }

    #[test]
    fn status_tilts_on_signal_share() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(
            derive_market_status(d, 10, 4, 0).overall_sentiment,
            MarketSentiment::Bullish
        );
        assert_eq!(
            derive_market_status(d, 10, 3, 4).overall_sentiment,
            MarketSentiment::Bearish
        );
        assert_eq!(
            derive_market_status(d, 10, 3, 3).overall_sentiment,
            MarketSentiment::Neutral
        );
        let empty = derive_market_status(d, 0, 0, 0);
        assert_eq!(empty.overall_sentiment, MarketSentiment::Neutral);
        assert_eq!(empty.total_stocks_analyzed, 0);
    }

    #[test]
    fn summary_counts_flags_and_signals() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let analyses = vec![analysis(90.0), analysis(65.0), analysis(50.0), analysis(10.0)];
        let s = summarize_market(d, &analyses).unwrap();
        assert_eq!(s.total_stocks_analyzed, 4);
        assert_eq!(s.bullish_stocks, 2);
        assert_eq!(s.bearish_stocks, 1);
        assert_eq!(s.neutral_stocks, 1);
        assert_eq!(s.buy_signals, 1);
        assert_eq!(s.sell_signals, 1);
        assert_eq!(s.average_score, 53.75);
        assert_eq!(s.bullish_percentage, 50.0);
        assert_eq!(s.bearish_percentage, 25.0);
        assert_eq!(s.overall_sentiment, MarketSentiment::Neutral);
    }

    #[test]
    fn summary_of_nothing_is_none() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(summarize_market(d, &[]).is_none());
    }
}
