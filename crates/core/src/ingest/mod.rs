pub mod postgres;
pub mod provider;
pub mod sentiment;
pub mod types;

use crate::domain::indicators::IndicatorSnapshot;
use crate::domain::StockRef;
use chrono::NaiveDate;

/// Read access to the data the ranking run consumes.
///
/// `Ok(None)` means "no data yet" and is not an error. Implementations are called concurrently
/// for different stocks. Date-bound reads never look past `as_of_date`, so a rerun for an
/// earlier date sees the data that date had.
#[async_trait::async_trait]
pub trait MarketDataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn list_active_stocks(&self) -> anyhow::Result<Vec<StockRef>>;

    /// Latest snapshot dated on or before `as_of_date`.
    async fn get_indicator_snapshot(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<IndicatorSnapshot>>;

    /// Aggregated news sentiment in -1..=1 over the lookback window ending at `as_of_date`'s close.
    async fn get_sentiment_score(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<f64>>;

    async fn get_current_price(&self, stock: &StockRef) -> anyhow::Result<Option<f64>>;
}
