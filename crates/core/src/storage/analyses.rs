use crate::domain::analysis::{
    Analysis, Classification, ComponentScores, SignalStrength, SignalType,
};
use crate::ranking::market::{MarketSentiment, MarketStatus};
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// An analysis joined with the stock's descriptive columns.
#[derive(Debug, Clone, Serialize)]
pub struct RankedAnalysis {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub name: Option<String>,
    pub sector: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AnalysisRow {
    stock_id: Uuid,
    symbol: String,
    name: Option<String>,
    sector: Option<String>,
    analysis_date: NaiveDate,
    ma_alignment_score: f64,
    supertrend_score: f64,
    rsi_strength_score: f64,
    volume_expansion_score: f64,
    news_sentiment_score: f64,
    total_score: f64,
    is_bullish: bool,
    is_bearish: bool,
    signal_type: Option<String>,
    signal_strength: Option<String>,
}

impl From<AnalysisRow> for RankedAnalysis {
    fn from(row: AnalysisRow) -> Self {
        let signal_type = row
            .signal_type
            .as_deref()
            .and_then(SignalType::parse)
            .unwrap_or(SignalType::Hold);
        let strength = row
            .signal_strength
            .as_deref()
            .and_then(SignalStrength::parse)
            .unwrap_or(SignalStrength::Neutral);

        Self {
            analysis: Analysis {
                stock_id: row.stock_id,
                symbol: row.symbol,
                analysis_date: row.analysis_date,
                scores: ComponentScores {
                    ma_alignment: row.ma_alignment_score,
                    supertrend: row.supertrend_score,
                    rsi_strength: row.rsi_strength_score,
                    volume_expansion: row.volume_expansion_score,
                    news_sentiment: row.news_sentiment_score,
                },
                total_score: row.total_score,
                is_bullish: row.is_bullish,
                is_bearish: row.is_bearish,
                classification: Classification {
                    signal_type,
                    strength,
                },
            },
            name: row.name,
            sector: row.sector,
        }
    }
}

pub async fn latest_analysis_date(pool: &sqlx::PgPool) -> anyhow::Result<Option<NaiveDate>> {
    let date: Option<NaiveDate> = sqlx::query_scalar("SELECT max(analysis_date) FROM daily_analysis")
        .persistent(false)
        .fetch_one(pool)
        .await
        .context("select latest analysis_date failed")?;
    Ok(date)
}

/// Analyses of one date, highest total score first. `limit = None` returns all of them.
pub async fn fetch_daily_ranking(
    pool: &sqlx::PgPool,
    date: NaiveDate,
    limit: Option<i64>,
) -> anyhow::Result<Vec<RankedAnalysis>> {
    let rows = sqlx::query_as::<_, AnalysisRow>(
        "SELECT a.stock_id, s.symbol, s.name, s.sector, a.analysis_date, \
                a.ma_alignment_score, a.supertrend_score, a.rsi_strength_score, \
                a.volume_expansion_score, a.news_sentiment_score, a.total_score, \
                a.is_bullish, a.is_bearish, a.signal_type, a.signal_strength \
         FROM daily_analysis a \
         JOIN stocks s ON s.id = a.stock_id \
         WHERE a.analysis_date = $1 \
         ORDER BY a.total_score DESC, s.symbol ASC \
         LIMIT $2",
    )
    .persistent(false)
    .bind(date)
    .bind(limit)
    .fetch_all(pool)
    .await
    .with_context(|| format!("select daily_analysis failed (date={date})"))?;

    Ok(rows.into_iter().map(RankedAnalysis::from).collect())
}

pub async fn fetch_market_status(
    pool: &sqlx::PgPool,
    date: NaiveDate,
) -> anyhow::Result<Option<MarketStatus>> {
    let row = sqlx::query_as::<_, (NaiveDate, String, i32, i32, i32)>(
        "SELECT trading_date, overall_sentiment, total_stocks_analyzed, bullish_stocks, bearish_stocks \
         FROM market_status WHERE trading_date = $1",
    )
    .persistent(false)
    .bind(date)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("select market_status failed (date={date})"))?;

    Ok(row.map(
        |(trading_date, sentiment, total_stocks_analyzed, bullish_stocks, bearish_stocks)| {
            MarketStatus {
                trading_date,
                overall_sentiment: MarketSentiment::parse(&sentiment)
                    .unwrap_or(MarketSentiment::Neutral),
                total_stocks_analyzed,
                bullish_stocks,
                bearish_stocks,
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_rows_map_back_to_neutral_classification() {
        let row = AnalysisRow {
            stock_id: Uuid::new_v4(),
            symbol: "TCS".to_string(),
            name: Some("Tata Consultancy Services".to_string()),
            sector: None,
            analysis_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            ma_alignment_score: 25.0,
            supertrend_score: 50.0,
            rsi_strength_score: 50.0,
            volume_expansion_score: 50.0,
            news_sentiment_score: 50.0,
            total_score: 42.5,
            is_bullish: false,
            is_bearish: false,
            signal_type: None,
            signal_strength: None,
        };
        let ranked = RankedAnalysis::from(row);
        assert_eq!(ranked.analysis.classification.signal_type, SignalType::Hold);
        assert_eq!(
            ranked.analysis.classification.strength,
            SignalStrength::Neutral
        );
        assert!(!ranked.analysis.signal_generated());

        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["symbol"], "TCS");
        assert_eq!(json["name"], "Tata Consultancy Services");
        assert_eq!(json["scores"]["ma_alignment"], 25.0);
    }
}
