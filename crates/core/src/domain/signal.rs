use crate::domain::analysis::{SignalStrength, SignalType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalStatus {
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "HIT_TARGET_1")]
    HitTarget1,
    #[serde(rename = "HIT_TARGET_2")]
    HitTarget2,
    #[serde(rename = "STOPPED_OUT")]
    StoppedOut,
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::HitTarget1 => "HIT_TARGET_1",
            Self::HitTarget2 => "HIT_TARGET_2",
            Self::StoppedOut => "STOPPED_OUT",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "HIT_TARGET_1" => Some(Self::HitTarget1),
            "HIT_TARGET_2" => Some(Self::HitTarget2),
            "STOPPED_OUT" => Some(Self::StoppedOut),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Structured explanation stored alongside a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub reasons: Vec<String>,
    pub technical_factors: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// A BUY or SELL trade idea derived from an [`crate::domain::analysis::Analysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub stock_id: Uuid,
    pub symbol: String,
    pub signal_date: NaiveDate,
    pub signal_type: SignalType,
    pub signal_strength: SignalStrength,
    pub entry_price: f64,
    pub target_1: f64,
    pub target_2: f64,
    pub stop_loss: f64,
    pub risk_amount: f64,
    pub reward_ratio_1: f64,
    pub reward_ratio_2: f64,
    pub rationale: Rationale,
    pub status: SignalStatus,
    pub expiry_date: NaiveDate,
}

impl Signal {
    /// Lifecycle step for a tracked signal given the latest price.
    ///
    /// Terminal states are sticky. Price levels are checked before expiry, so a signal that
    /// reached its target on the last day is not reported as expired. Target 2 is checked before
    /// target 1 on its own, even when the ATR target sits inside the first one.
    pub fn next_status(&self, price: Option<f64>, today: NaiveDate) -> SignalStatus {
        if self.status.is_terminal() {
            return self.status;
        }

        if let Some(price) = price.filter(|p| p.is_finite()) {
            match self.signal_type {
                SignalType::Buy => {
                    if price <= self.stop_loss {
                        return SignalStatus::StoppedOut;
                    }
                    if price >= self.target_2 {
                        return SignalStatus::HitTarget2;
                    }
                    if price >= self.target_1 {
                        return SignalStatus::HitTarget1;
                    }
                }
                SignalType::Sell => {
                    if price >= self.stop_loss {
                        return SignalStatus::StoppedOut;
                    }
                    if price <= self.target_2 {
                        return SignalStatus::HitTarget2;
                    }
                    if price <= self.target_1 {
                        return SignalStatus::HitTarget1;
                    }
                }
                SignalType::Hold => {}
            }
        }

        if today > self.expiry_date {
            return SignalStatus::Expired;
        }

        SignalStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            stock_id: Uuid::new_v4(),
            symbol: "RELIANCE".to_string(),
            signal_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            signal_type: SignalType::Buy,
            signal_strength: SignalStrength::Strong,
            entry_price: 107.0,
            target_1: 120.5,
            target_2: 115.0,
            stop_loss: 98.0,
            risk_amount: 9.0,
            reward_ratio_1: 1.5,
            reward_ratio_2: 8.0 / 9.0,
            rationale: Rationale::default(),
            status: SignalStatus::Active,
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
        }
    }

    #[test]
    fn buy_signal_transitions_on_price() {
        let s = buy_signal();
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(s.next_status(Some(97.0), today), SignalStatus::StoppedOut);
        assert_eq!(s.next_status(Some(121.0), today), SignalStatus::HitTarget2);
        assert_eq!(s.next_status(Some(110.0), today), SignalStatus::Active);
        assert_eq!(s.next_status(None, today), SignalStatus::Active);
    }

    #[test]
    fn atr_target_inside_first_target_is_reachable() {
        let s = buy_signal();
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(s.next_status(Some(116.0), today), SignalStatus::HitTarget2);
        assert_eq!(s.next_status(Some(115.0), today), SignalStatus::HitTarget2);
        assert_eq!(s.next_status(Some(114.9), today), SignalStatus::Active);

        let mut sell = s.clone();
        sell.signal_type = SignalType::Sell;
        sell.entry_price = 100.0;
        sell.stop_loss = 105.0;
        sell.target_1 = 88.0;
        sell.target_2 = 93.0;
        assert_eq!(sell.next_status(Some(92.0), today), SignalStatus::HitTarget2);
        assert_eq!(sell.next_status(Some(94.0), today), SignalStatus::Active);
        assert_eq!(s.next_status(None, today), SignalStatus::Active);
    }

    #[test]
    fn second_target_wins_when_beyond_first() {
        let mut s = buy_signal();
        s.target_1 = 112.0;
        s.target_2 = 118.0;
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(s.next_status(Some(119.0), today), SignalStatus::HitTarget2);
        assert_eq!(s.next_status(Some(113.0), today), SignalStatus::HitTarget1);
    }

    #[test]
    fn sell_signal_mirrors_buy() {
        let mut s = buy_signal();
        s.signal_type = SignalType::Sell;
        s.entry_price = 100.0;
        s.stop_loss = 105.0;
        s.target_1 = 92.5;
        s.target_2 = 90.0;
        let today = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(s.next_status(Some(106.0), today), SignalStatus::StoppedOut);
        assert_eq!(s.next_status(Some(89.0), today), SignalStatus::HitTarget2);
        assert_eq!(s.next_status(Some(92.0), today), SignalStatus::HitTarget1);
        assert_eq!(s.next_status(Some(99.0), today), SignalStatus::Active);
    }

    #[test]
    fn expires_after_expiry_date_and_terminal_is_sticky() {
        let mut s = buy_signal();
        let after = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(s.next_status(Some(110.0), after), SignalStatus::Expired);
        assert_eq!(
            s.next_status(None, s.expiry_date),
            SignalStatus::Active,
            "expiry day itself is still active"
        );

        s.status = SignalStatus::StoppedOut;
        assert_eq!(s.next_status(Some(200.0), after), SignalStatus::StoppedOut);
    }

    #[test]
    fn status_strings_match_storage_format() {
        for st in [
            SignalStatus::Active,
            SignalStatus::HitTarget1,
            SignalStatus::HitTarget2,
            SignalStatus::StoppedOut,
            SignalStatus::Expired,
        ] {
            assert_eq!(SignalStatus::parse(st.as_str()), Some(st));
            let json = serde_json::to_value(st).unwrap();
            assert_eq!(json, serde_json::Value::String(st.as_str().to_string()));
        }
    }
}
