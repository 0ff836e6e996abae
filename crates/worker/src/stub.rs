use chrono::{Datelike, NaiveDate};
use sigrank_core::domain::indicators::{IndicatorSnapshot, TrendDirection};
use sigrank_core::domain::signal::{Signal, SignalStatus};
use sigrank_core::domain::StockRef;
use sigrank_core::ingest::MarketDataSource;
use sigrank_core::ranking::{AnalysisStore, RunBatch};
use uuid::Uuid;

/// Deterministic in-memory universe for `--dry-run`: no database, no quote provider.
#[derive(Debug, Clone)]
pub struct StubMarketData {
    size: usize,
}

impl StubMarketData {
    pub fn new(size: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (1..=5000).contains(&size),
            "stub universe size must be 1..=5000 (got {size})"
        );
        Ok(Self { size })
    }

    fn index_of(&self, stock: &StockRef) -> Option<usize> {
        let i = usize::try_from(stock.id.as_u128()).ok()?;
        (1..=self.size).contains(&i).then_some(i)
    }

    // Position of the stock on a bearish (0) .. bullish (1) axis, shifted per date.
    fn tilt(i: usize, as_of_date: NaiveDate) -> f64 {
        let day = as_of_date.num_days_from_ce().unsigned_abs() as usize;
        ((i * 37 + day) % 100) as f64 / 100.0
    }
}

#[async_trait::async_trait]
impl MarketDataSource for StubMarketData {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn list_active_stocks(&self) -> anyhow::Result<Vec<StockRef>> {
        Ok((1..=self.size)
            .map(|i| StockRef {
                id: Uuid::from_u128(i as u128),
                symbol: format!("STUB{i:04}"),
            })
            .collect())
    }

    async fn get_indicator_snapshot(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<IndicatorSnapshot>> {
        let Some(i) = self.index_of(stock) else {
            return Ok(None);
        };
        let t = Self::tilt(i, as_of_date);
        let close = 100.0 + i as f64;
        let lean = t - 0.5;

        Ok(Some(IndicatorSnapshot {
            date: Some(as_of_date),
            close: Some(close),
            sma_20: Some(close * (1.0 - lean * 0.05)),
            sma_50: Some(close * (1.0 - lean * 0.10)),
            sma_100: Some(close * (1.0 - lean * 0.15)),
            ema_20: Some(close * (1.0 - lean * 0.04)),
            ema_50: Some(close * (1.0 - lean * 0.08)),
            rsi_14: Some(20.0 + 60.0 * t),
            atr_14: Some(close * 0.02),
            volume_ratio: Some(0.5 + 1.5 * t),
            supertrend_direction: Some(if t >= 0.5 {
                TrendDirection::Buy
            } else {
                TrendDirection::Sell
            }),
            supertrend_upper: Some(close * 1.07),
            supertrend_lower: Some(close * 0.93),
        }))
    }

    async fn get_sentiment_score(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<f64>> {
        Ok(self
            .index_of(stock)
            .map(|i| (Self::tilt(i, as_of_date) - 0.5) * 1.6))
    }

    async fn get_current_price(&self, _stock: &StockRef) -> anyhow::Result<Option<f64>> {
        Ok(None)
    }
}

/// Store used by `--dry-run`: logs what would be written and keeps nothing.
#[derive(Debug, Default)]
pub struct DryRunStore;

#[async_trait::async_trait]
impl AnalysisStore for DryRunStore {
    async fn persist_run(&self, batch: &RunBatch) -> anyhow::Result<()> {
        tracing::info!(
            as_of_date = %batch.as_of_date,
            dry_run = true,
            analyses = batch.analyses.len(),
            signals = batch.signals.len(),
            market = batch.market_status.overall_sentiment.as_str(),
            "skipping persistence"
        );
        Ok(())
    }

    async fn active_signals(&self) -> anyhow::Result<Vec<Signal>> {
        Ok(Vec::new())
    }

    async fn update_signal_statuses(
        &self,
        updates: &[(Uuid, SignalStatus)],
    ) -> anyhow::Result<u64> {
        Ok(updates.len() as u64)
    }
}
