use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scored news article as stored by the news pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub published_at: DateTime<Utc>,
    pub sentiment_score: f64,
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub price: Option<f64>,
    pub as_of: Option<DateTime<Utc>>,
}
