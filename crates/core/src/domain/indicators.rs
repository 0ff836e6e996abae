use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Buy,
    Sell,
}

impl TrendDirection {
    /// Parses the stored SuperTrend flag. Anything other than `BUY` / `SELL` is treated as
    /// "no direction".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Latest technical state of one stock, as produced by the daily indicator pipeline.
///
/// Every value may be missing (not enough history yet). Missing values are never read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: Option<NaiveDate>,
    /// Reference (last close) price.
    pub close: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_100: Option<f64>,
    pub ema_20: Option<f64>,
    pub ema_50: Option<f64>,
    pub rsi_14: Option<f64>,
    pub atr_14: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub supertrend_direction: Option<TrendDirection>,
    pub supertrend_upper: Option<f64>,
    pub supertrend_lower: Option<f64>,
}
