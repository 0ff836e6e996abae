use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }

    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStrength {
    Strong,
    Moderate,
    Weak,
    Neutral,
}

impl SignalStrength {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "STRONG",
            Self::Moderate => "MODERATE",
            Self::Weak => "WEAK",
            Self::Neutral => "NEUTRAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STRONG" => Some(Self::Strong),
            "MODERATE" => Some(Self::Moderate),
            "WEAK" => Some(Self::Weak),
            "NEUTRAL" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Higher is stronger conviction; used to order signals.
    pub fn rank(self) -> u8 {
        match self {
            Self::Strong => 3,
            Self::Moderate => 2,
            Self::Weak => 1,
            Self::Neutral => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub signal_type: SignalType,
    pub strength: SignalStrength,
}

/// The five component scores, each in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub ma_alignment: f64,
    pub supertrend: f64,
    pub rsi_strength: f64,
    pub volume_expansion: f64,
    pub news_sentiment: f64,
}

/// One stock's scoring result for one trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub stock_id: Uuid,
    pub symbol: String,
    pub analysis_date: NaiveDate,
    pub scores: ComponentScores,
    pub total_score: f64,
    pub is_bullish: bool,
    pub is_bearish: bool,
    pub classification: Classification,
}

impl Analysis {
    pub fn signal_generated(&self) -> bool {
        self.classification.signal_type.is_actionable()
    }

    /// BUY/SELL classification, `None` for HOLD.
    pub fn signal_type(&self) -> Option<SignalType> {
        self.signal_generated()
            .then_some(self.classification.signal_type)
    }

    pub fn signal_strength(&self) -> Option<SignalStrength> {
        self.signal_generated()
            .then_some(self.classification.strength)
    }
}
