use crate::ingest::types::ScoredArticle;
use chrono::{DateTime, Utc};

const DEFAULT_RELEVANCE: f64 = 0.5;

/// Recency- and relevance-weighted mean of article sentiment, clamped to -1..=1.
///
/// An article `d` whole days old weighs `1 / (d + 1)` times its relevance (0.5 when unknown).
/// Returns `None` when there is nothing to average.
pub fn aggregate_sentiment(articles: &[ScoredArticle], now: DateTime<Utc>) -> Option<f64> {
    let mut total_score = 0.0;
    let mut total_weight = 0.0;

    for article in articles {
        if !article.sentiment_score.is_finite() {
            continue;
        }

        let days_old = (now - article.published_at).num_days().max(0) as f64;
        let recency_weight = 1.0 / (days_old + 1.0);
        let relevance_weight = article
            .relevance_score
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(DEFAULT_RELEVANCE);

        let weight = recency_weight * relevance_weight;
        total_score += article.sentiment_score * weight;
        total_weight += weight;
    }

    if total_weight <= 0.0 {
        return None;
    }

    Some((total_score / total_weight).clamp(-1.0, 1.0))
}
