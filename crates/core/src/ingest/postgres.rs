use crate::domain::indicators::{IndicatorSnapshot, TrendDirection};
use crate::domain::StockRef;
use crate::ingest::provider::HttpQuoteProvider;
use crate::ingest::sentiment::aggregate_sentiment;
use crate::ingest::types::ScoredArticle;
use crate::ingest::MarketDataSource;
use crate::time::ist_market;
use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

type IndicatorRow = (
    NaiveDate,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

/// Reads indicators and news written by the upstream pipelines; live prices come from an
/// optional quote provider.
#[derive(Debug, Clone)]
pub struct PgMarketData {
    pool: sqlx::PgPool,
    news_lookback_hours: i64,
    quotes: Option<HttpQuoteProvider>,
}

impl PgMarketData {
    pub fn new(pool: sqlx::PgPool, news_lookback_hours: i64) -> Self {
        Self {
            pool,
            news_lookback_hours,
            quotes: None,
        }
    }

    pub fn with_quotes(mut self, quotes: HttpQuoteProvider) -> Self {
        self.quotes = Some(quotes);
        self
    }
}

#[async_trait::async_trait]
impl MarketDataSource for PgMarketData {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn list_active_stocks(&self) -> anyhow::Result<Vec<StockRef>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, symbol FROM stocks WHERE is_active ORDER BY symbol ASC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select active stocks failed")?;

        Ok(rows
            .into_iter()
            .map(|(id, symbol)| StockRef { id, symbol })
            .collect())
    }

    async fn get_indicator_snapshot(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<IndicatorSnapshot>> {
        let row = sqlx::query_as::<_, IndicatorRow>(
            "SELECT date, close, sma_20, sma_50, sma_100, ema_20, ema_50, rsi_14, atr_14, \
                    volume_ratio, supertrend_direction, supertrend_upper, supertrend_lower \
             FROM technical_indicators \
             WHERE stock_id = $1 AND date <= $2 \
             ORDER BY date DESC \
             LIMIT 1",
        )
        .persistent(false)
        .bind(stock.id)
        .bind(as_of_date)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select technical_indicators failed (symbol={})", stock.symbol))?;

        Ok(row.map(indicator_row_to_snapshot))
    }

    async fn get_sentiment_score(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<f64>> {
        let until = ist_market::session_close_utc(as_of_date)?.min(Utc::now());
        let since = until - Duration::hours(self.news_lookback_hours);

        let rows = sqlx::query_as::<_, (DateTime<Utc>, f64, Option<f64>)>(
            "SELECT published_at, sentiment_score, relevance_score \
             FROM news_articles \
             WHERE stock_id = $1 AND published_at >= $2 AND published_at <= $3 \
               AND sentiment_score IS NOT NULL \
             ORDER BY published_at DESC",
        )
        .persistent(false)
        .bind(stock.id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select news_articles failed (symbol={})", stock.symbol))?;

        let articles: Vec<ScoredArticle> = rows
            .into_iter()
            .map(|(published_at, sentiment_score, relevance_score)| ScoredArticle {
                published_at,
                sentiment_score,
                relevance_score,
            })
            .collect();

        Ok(aggregate_sentiment(&articles, until))
    }

    async fn get_current_price(&self, stock: &StockRef) -> anyhow::Result<Option<f64>> {
        match &self.quotes {
            Some(quotes) => quotes.fetch_price(&stock.symbol).await,
            None => Ok(None),
        }
    }
}

fn indicator_row_to_snapshot(row: IndicatorRow) -> IndicatorSnapshot {
    let (
        date,
        close,
        sma_20,
        sma_50,
        sma_100,
        ema_20,
        ema_50,
        rsi_14,
        atr_14,
        volume_ratio,
        supertrend_direction,
        supertrend_upper,
        supertrend_lower,
    ) = row;

    IndicatorSnapshot {
        date: Some(date),
        close,
        sma_20,
        sma_50,
        sma_100,
        ema_20,
        ema_50,
        rsi_14,
        atr_14,
        volume_ratio,
        supertrend_direction: supertrend_direction.as_deref().and_then(TrendDirection::parse),
        supertrend_upper,
        supertrend_lower,
    }
}
