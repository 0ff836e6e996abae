//! Daily ranking run: fan out over the active universe, score every stock, persist the batch.

pub mod error;
pub mod lock;
pub mod market;
pub mod run;

use crate::config::{EngineConfig, RankingOptions};
use crate::domain::analysis::{Analysis, SignalType};
use crate::domain::indicators::IndicatorSnapshot;
use crate::domain::signal::{Signal, SignalStatus};
use crate::domain::StockRef;
use crate::engine::levels::{LevelGenerator, TradeLevels};
use crate::engine::rationale::build_rationale;
use crate::engine::ScoringEngine;
use crate::ingest::MarketDataSource;
use crate::time::ist_market;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use error::FetchFailure;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use market::{derive_market_status, MarketStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;
use uuid::Uuid;

const SUMMARY_TOP_N: usize = 5;

/// Everything one run writes. Persisted all-or-nothing.
#[derive(Debug, Clone)]
pub struct RunBatch {
    pub as_of_date: NaiveDate,
    pub analyses: Vec<Analysis>,
    pub signals: Vec<Signal>,
    pub market_status: MarketStatus,
}

/// Write side of a ranking run.
#[async_trait::async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Replaces the date's rows for the batch's stocks in a single transaction.
    async fn persist_run(&self, batch: &RunBatch) -> anyhow::Result<()>;

    async fn active_signals(&self) -> anyhow::Result<Vec<Signal>>;

    async fn update_signal_statuses(&self, updates: &[(Uuid, SignalStatus)])
        -> anyhow::Result<u64>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TopEntry {
    pub symbol: String,
    pub total_score: f64,
    pub signal_type: SignalType,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub as_of_date: NaiveDate,
    pub total_stocks: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub elapsed_ms: u64,
    pub top: Vec<TopEntry>,
}

#[derive(Debug, Clone)]
pub struct RankingOutcome {
    pub summary: RunSummary,
    /// Sorted by total score, highest first.
    pub analyses: Vec<Analysis>,
    pub buy_signals: Vec<Signal>,
    pub sell_signals: Vec<Signal>,
    pub failures: Vec<FetchFailure>,
    pub market_status: MarketStatus,
}

#[derive(Debug)]
struct StockInputs {
    indicators: IndicatorSnapshot,
    price: f64,
    sentiment: Option<f64>,
}

pub struct RankingService<D> {
    engine: ScoringEngine,
    levels: LevelGenerator,
    source: D,
    options: RankingOptions,
}

impl<D: MarketDataSource> RankingService<D> {
    pub fn new(config: EngineConfig, options: RankingOptions, source: D) -> Self {
        Self {
            levels: LevelGenerator::new(&config),
            engine: ScoringEngine::new(config),
            source,
            options,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn options(&self) -> &RankingOptions {
        &self.options
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// Scores one stock from already-fetched inputs. No I/O.
    pub fn evaluate(
        &self,
        stock: &StockRef,
        indicators: &IndicatorSnapshot,
        current_price: f64,
        sentiment: Option<f64>,
        as_of_date: NaiveDate,
    ) -> (Analysis, Option<Signal>) {
        let scores = self
            .engine
            .component_scores(indicators, current_price, sentiment);
        let total_score = self.engine.total_score(&scores);
        let classification = self.engine.classify(total_score);
        let (is_bullish, is_bearish) = self.engine.bias(total_score);

        let expiry_date = as_of_date.checked_add_signed(chrono::Duration::days(i64::from(
            self.engine.config().signal_expiry_days,
        )));
        if expiry_date.is_none() && classification.signal_type.is_actionable() {
            tracing::warn!(symbol = %stock.symbol, %as_of_date, "signal expiry out of range; signal dropped");
        }

        let signal = self
            .levels
            .generate(classification.signal_type, indicators, current_price)
            .zip(expiry_date)
            .filter(|(lv, _)| {
                let ok = levels_are_consistent(classification.signal_type, lv);
                if !ok {
                    tracing::warn!(
                        symbol = %stock.symbol,
                        entry = lv.entry,
                        stop_loss = lv.stop_loss,
                        "inconsistent trade levels; signal dropped"
                    );
                }
                ok
            })
            .map(|(lv, expiry_date)| Signal {
                id: Uuid::new_v4(),
                stock_id: stock.id,
                symbol: stock.symbol.clone(),
                signal_date: as_of_date,
                signal_type: classification.signal_type,
                signal_strength: classification.strength,
                entry_price: lv.entry,
                target_1: lv.target_1,
                target_2: lv.target_2,
                stop_loss: lv.stop_loss,
                risk_amount: lv.risk_amount,
                reward_ratio_1: lv.reward_ratio_1,
                reward_ratio_2: lv.reward_ratio_2,
                rationale: build_rationale(&scores, indicators),
                status: SignalStatus::Active,
                expiry_date,
            });

        let analysis = Analysis {
            stock_id: stock.id,
            symbol: stock.symbol.clone(),
            analysis_date: as_of_date,
            scores,
            total_score,
            is_bullish,
            is_bearish,
            classification,
        };

        (analysis, signal)
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.options.fetch_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(anyhow::anyhow!(
                "timed out after {:?}",
                self.options.fetch_timeout
            )),
        }
    }

    async fn fetch_inputs(
        &self,
        stock: &StockRef,
        as_of_date: NaiveDate,
        live_prices: bool,
    ) -> Result<StockInputs, FetchFailure> {
        let (indicators, sentiment, price) = tokio::join!(
            self.with_timeout(self.source.get_indicator_snapshot(stock, as_of_date)),
            self.with_timeout(self.source.get_sentiment_score(stock, as_of_date)),
            async {
                if live_prices {
                    self.with_timeout(self.source.get_current_price(stock)).await
                } else {
                    Ok(None)
                }
            },
        );

        let indicators = match indicators {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                return Err(FetchFailure::new(stock, "indicators", "no indicator snapshot"))
            }
            Err(err) => return Err(FetchFailure::new(stock, "indicators", format!("{err:#}"))),
        };

        let sentiment = sentiment.unwrap_or_else(|err| {
            tracing::warn!(symbol = %stock.symbol, error = %err, "sentiment unavailable; using neutral");
            None
        });

        let live_price = price.unwrap_or_else(|err| {
            tracing::warn!(symbol = %stock.symbol, error = %err, "live price unavailable; using reference close");
            None
        });

        let price = live_price
            .filter(|p| is_usable_price(*p))
            .or(indicators.close.filter(|p| is_usable_price(*p)))
            .ok_or_else(|| FetchFailure::new(stock, "price", "no live price and no reference close"))?;

        Ok(StockInputs {
            indicators,
            price,
            sentiment,
        })
    }

    /// Full daily run. Per-stock failures are collected; only listing the universe or
    /// persisting the batch fails the run.
    pub async fn rank_all_stocks(
        &self,
        store: &dyn AnalysisStore,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<RankingOutcome> {
        let started = Instant::now();

        let stocks = self
            .source
            .list_active_stocks()
            .await
            .with_context(|| format!("list active stocks failed ({})", self.source.source_name()))?;
        let stocks = dedupe_stocks(stocks);
        let total_stocks = stocks.len();

        // A live quote describes today's session; past dates are scored from their own close.
        let live_prices = as_of_date >= ist_market::resolve_as_of_date(None, Utc::now())?;

        tracing::info!(
            %as_of_date,
            total_stocks,
            concurrency = self.options.concurrency,
            live_prices,
            source = self.source.source_name(),
            "ranking run started"
        );

        let results: Vec<Result<(Analysis, Option<Signal>), FetchFailure>> =
            stream::iter(stocks.iter())
                .map(|stock| async move {
                    let inputs = self.fetch_inputs(stock, as_of_date, live_prices).await?;
                    Ok::<_, FetchFailure>(self.evaluate(
                        stock,
                        &inputs.indicators,
                        inputs.price,
                        inputs.sentiment,
                        as_of_date,
                    ))
                })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect::<Vec<_>>()
                .boxed()
                .await;

        let mut analyses = Vec::with_capacity(results.len());
        let mut signals = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok((analysis, signal)) => {
                    analyses.push(analysis);
                    signals.extend(signal);
                }
                Err(failure) => {
                    tracing::warn!(
                        symbol = %failure.symbol,
                        stage = failure.stage,
                        detail = %failure.detail,
                        "stock skipped"
                    );
                    failures.push(failure);
                }
            }
        }

        sort_analyses(&mut analyses);
        sort_signals(&mut signals, &analyses);

        let (buy_signals, sell_signals): (Vec<Signal>, Vec<Signal>) = signals
            .iter()
            .cloned()
            .partition(|s| s.signal_type == SignalType::Buy);

        let market_status =
            derive_market_status(as_of_date, analyses.len(), buy_signals.len(), sell_signals.len());

        let batch = RunBatch {
            as_of_date,
            analyses,
            signals,
            market_status,
        };

        if let Err(err) = store.persist_run(&batch).await {
            tracing::error!(%as_of_date, error = %err, "persisting ranking run failed");
            return Err(err.context(format!("persist ranking run failed (as_of_date={as_of_date})")));
        }

        let RunBatch {
            analyses,
            market_status,
            ..
        } = batch;

        let summary = RunSummary {
            as_of_date,
            total_stocks,
            analyzed: analyses.len(),
            failed: failures.len(),
            buy_signals: buy_signals.len(),
            sell_signals: sell_signals.len(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            top: analyses
                .iter()
                .take(SUMMARY_TOP_N)
                .map(|a| TopEntry {
                    symbol: a.symbol.clone(),
                    total_score: a.total_score,
                    signal_type: a.classification.signal_type,
                })
                .collect(),
        };

        tracing::info!(
            %as_of_date,
            total_stocks = summary.total_stocks,
            analyzed = summary.analyzed,
            failed = summary.failed,
            buy_signals = summary.buy_signals,
            sell_signals = summary.sell_signals,
            market = market_status.overall_sentiment.as_str(),
            elapsed_ms = summary.elapsed_ms,
            "ranking run persisted"
        );

        Ok(RankingOutcome {
            summary,
            analyses,
            buy_signals,
            sell_signals,
            failures,
            market_status,
        })
    }

    /// Moves ACTIVE signals along their lifecycle. Returns the number of changed signals.
    pub async fn refresh_signals(
        &self,
        store: &dyn AnalysisStore,
        today: NaiveDate,
    ) -> anyhow::Result<usize> {
        let active = store
            .active_signals()
            .await
            .context("load active signals failed")?;
        if active.is_empty() {
            return Ok(0);
        }

        let updates: Vec<Option<(Uuid, SignalStatus)>> = stream::iter(active.iter())
            .map(|signal| async move {
                let price = self.latest_price(signal, today).await;
                let next = signal.next_status(price, today);
                (next != signal.status).then_some((signal.id, next))
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect::<Vec<_>>()
            .boxed()
            .await;
        let updates: Vec<(Uuid, SignalStatus)> = updates.into_iter().flatten().collect();

        if updates.is_empty() {
            tracing::info!(%today, active = active.len(), "no signal status changes");
            return Ok(0);
        }

        let written = store
            .update_signal_statuses(&updates)
            .await
            .context("update signal statuses failed")?;

        tracing::info!(%today, active = active.len(), changed = updates.len(), written, "signal statuses refreshed");
        Ok(updates.len())
    }

    async fn latest_price(&self, signal: &Signal, today: NaiveDate) -> Option<f64> {
        let stock = StockRef {
            id: signal.stock_id,
            symbol: signal.symbol.clone(),
        };

        match self.with_timeout(self.source.get_current_price(&stock)).await {
            Ok(Some(p)) if is_usable_price(p) => return Some(p),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(symbol = %stock.symbol, error = %err, "live price unavailable for signal refresh")
            }
        }

        match self.with_timeout(self.source.get_indicator_snapshot(&stock, today)).await {
            Ok(snapshot) => snapshot
                .and_then(|s| s.close)
                .filter(|p| is_usable_price(*p)),
            Err(err) => {
                tracing::warn!(symbol = %stock.symbol, error = %err, "reference close unavailable for signal refresh");
                None
            }
        }
    }
}

fn is_usable_price(p: f64) -> bool {
    p.is_finite() && p > 0.0
}

fn levels_are_consistent(signal_type: SignalType, lv: &TradeLevels) -> bool {
    match signal_type {
        SignalType::Buy => lv.stop_loss < lv.entry,
        SignalType::Sell => lv.stop_loss > lv.entry,
        SignalType::Hold => false,
    }
}

fn dedupe_stocks(stocks: Vec<StockRef>) -> Vec<StockRef> {
    let mut seen = HashSet::new();
    stocks.into_iter().filter(|s| seen.insert(s.id)).collect()
}

fn sort_analyses(analyses: &mut [Analysis]) {
    analyses.sort_by(|a, b| {
        b.total_score
            .total_cmp(&a.total_score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// Strongest first, then in the analyses' score order.
fn sort_signals(signals: &mut [Signal], analyses: &[Analysis]) {
    let position = |stock_id: Uuid| {
        analyses
            .iter()
            .position(|a| a.stock_id == stock_id)
            .unwrap_or(usize::MAX)
    };
    signals.sort_by(|a, b| {
        b.signal_strength
            .rank()
            .cmp(&a.signal_strength.rank())
            .then_with(|| position(a.stock_id).cmp(&position(b.stock_id)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::SignalStrength;
    use crate::domain::indicators::TrendDirection;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        stocks: Vec<StockRef>,
        indicators: HashMap<String, IndicatorSnapshot>,
        sentiment: HashMap<String, f64>,
        prices: HashMap<String, f64>,
        broken_indicators: HashSet<String>,
        slow_sentiment: HashSet<String>,
        requested_dates: Mutex<Vec<NaiveDate>>,
    }

    impl FakeSource {
        fn with_stock(mut self, symbol: &str, snapshot: IndicatorSnapshot) -> Self {
            self.stocks.push(stock(symbol));
            self.indicators.insert(symbol.to_string(), snapshot);
            self
        }
    }

    #[async_trait::async_trait]
    impl MarketDataSource for FakeSource {
        fn source_name(&self) -> &'static str {
            "fake"
        }

        async fn list_active_stocks(&self) -> anyhow::Result<Vec<StockRef>> {
            Ok(self.stocks.clone())
        }

        async fn get_indicator_snapshot(
            &self,
            stock: &StockRef,
            as_of_date: NaiveDate,
        ) -> anyhow::Result<Option<IndicatorSnapshot>> {
            self.requested_dates.lock().unwrap().push(as_of_date);
            if self.broken_indicators.contains(&stock.symbol) {
                anyhow::bail!("indicator store unreachable");
            }
            Ok(self.indicators.get(&stock.symbol).cloned())
        }

        async fn get_sentiment_score(
            &self,
            stock: &StockRef,
            as_of_date: NaiveDate,
        ) -> anyhow::Result<Option<f64>> {
            self.requested_dates.lock().unwrap().push(as_of_date);
            if self.slow_sentiment.contains(&stock.symbol) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(self.sentiment.get(&stock.symbol).copied())
        }

        async fn get_current_price(&self, stock: &StockRef) -> anyhow::Result<Option<f64>> {
            Ok(self.prices.get(&stock.symbol).copied())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        fail_persist: bool,
        batches: Mutex<Vec<RunBatch>>,
        active: Vec<Signal>,
        updates: Mutex<Vec<(Uuid, SignalStatus)>>,
    }

    #[async_trait::async_trait]
    impl AnalysisStore for MemoryStore {
        async fn persist_run(&self, batch: &RunBatch) -> anyhow::Result<()> {
            if self.fail_persist {
                anyhow::bail!("connection reset");
            }
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }

        async fn active_signals(&self) -> anyhow::Result<Vec<Signal>> {
            Ok(self.active.clone())
        }

        async fn update_signal_statuses(
            &self,
            updates: &[(Uuid, SignalStatus)],
        ) -> anyhow::Result<u64> {
            self.updates.lock().unwrap().extend_from_slice(updates);
            Ok(updates.len() as u64)
        }
    }

    fn stock(symbol: &str) -> StockRef {
        // Stable per symbol so tests can look stocks up again.
        let mut bytes = [0u8; 16];
        for (i, b) in symbol.bytes().take(16).enumerate() {
            bytes[i] = b;
        }
        StockRef {
            id: Uuid::from_bytes(bytes),
            symbol: symbol.to_string(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn bullish() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: Some(107.0),
            sma_20: Some(105.0),
            sma_50: Some(100.0),
            ema_20: Some(106.0),
            ema_50: Some(101.0),
            rsi_14: Some(60.0),
            volume_ratio: Some(1.5),
            supertrend_direction: Some(TrendDirection::Buy),
            atr_14: Some(4.0),
            supertrend_lower: Some(98.0),
            ..IndicatorSnapshot::default()
        }
    }

    fn bearish() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: Some(90.0),
            sma_20: Some(95.0),
            sma_50: Some(100.0),
            ema_20: Some(94.0),
            ema_50: Some(99.0),
            rsi_14: Some(20.0),
            volume_ratio: Some(0.5),
            supertrend_direction: Some(TrendDirection::Sell),
            atr_14: Some(3.0),
            supertrend_upper: Some(97.0),
            ..IndicatorSnapshot::default()
        }
    }

    fn neutral() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: Some(50.0),
            ..IndicatorSnapshot::default()
        }
    }

    fn service(source: FakeSource) -> RankingService<FakeSource> {
        RankingService::new(EngineConfig::default(), RankingOptions::default(), source)
    }

    #[test]
    fn evaluate_reference_scenario_builds_a_buy_signal() {
        let svc = service(FakeSource::default());
        let s = stock("INFY");
        let (analysis, signal) = svc.evaluate(&s, &bullish(), 107.0, Some(0.4), date());

        assert!((analysis.total_score - 86.25).abs() < 1e-9);
        assert!(analysis.is_bullish);
        assert_eq!(analysis.signal_type(), Some(SignalType::Buy));
        assert_eq!(analysis.signal_strength(), Some(SignalStrength::Strong));

        let signal = signal.unwrap();
        assert_eq!(signal.stock_id, s.id);
        assert_eq!(signal.entry_price, 107.0);
        assert_eq!(signal.stop_loss, 98.0);
        assert_eq!(signal.target_2, 115.0);
        assert_eq!(signal.status, SignalStatus::Active);
        assert_eq!(signal.expiry_date, NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());
        assert!(!signal.rationale.reasons.is_empty());
    }

    #[test]
    fn evaluate_hold_has_no_signal() {
        let svc = service(FakeSource::default());
        let (analysis, signal) = svc.evaluate(&stock("TCS"), &neutral(), 50.0, None, date());
        // Only the neutral defaults contribute; no MA condition can hold.
        assert_eq!(analysis.total_score, 35.0);
        assert!(analysis.is_bearish);
        assert!(!analysis.signal_generated());
        assert!(signal.is_none());
    }

    #[test]
    fn unrepresentable_expiry_drops_the_signal_but_keeps_the_analysis() {
        let config = EngineConfig {
            signal_expiry_days: 1_000_000_000,
            ..EngineConfig::default()
        };
        let svc = RankingService::new(config, RankingOptions::default(), FakeSource::default());
        let (analysis, signal) = svc.evaluate(&stock("INFY"), &bullish(), 107.0, Some(0.4), date());

        assert_eq!(analysis.signal_type(), Some(SignalType::Buy));
        assert!(signal.is_none());
    }

    #[tokio::test]
    async fn run_isolates_failures_and_sorts_output() {
        let mut source = FakeSource::default()
            .with_stock("BULL", bullish())
            .with_stock("BEAR", bearish())
            .with_stock("FLAT", neutral())
            .with_stock("BROKEN", bullish());
        source.stocks.push(stock("MISSING"));
        source.stocks.push(stock("BULL"));
        source.broken_indicators.insert("BROKEN".to_string());
        source.sentiment.insert("BULL".to_string(), 0.4);
        source.sentiment.insert("BEAR".to_string(), -0.8);
        source.prices.insert("BULL".to_string(), 107.0);

        let svc = service(source);
        let store = MemoryStore::default();
        let outcome = svc.rank_all_stocks(&store, date()).await.unwrap();

        assert_eq!(outcome.summary.total_stocks, 5);
        assert_eq!(outcome.summary.analyzed, 3);
        assert_eq!(outcome.summary.failed, 2);
        let mut failed: Vec<_> = outcome.failures.iter().map(|f| f.symbol.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["BROKEN", "MISSING"]);

        let order: Vec<_> = outcome.analyses.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(order, vec!["BULL", "FLAT", "BEAR"]);
        assert!(outcome
            .analyses
            .windows(2)
            .all(|w| w[0].total_score >= w[1].total_score));

        assert_eq!(outcome.buy_signals.len(), 1);
        assert_eq!(outcome.sell_signals.len(), 1);
        assert_eq!(outcome.summary.top[0].symbol, "BULL");

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].analyses.len(), 3);
        assert_eq!(batches[0].signals.len(), 2);
        assert_eq!(batches[0].market_status.total_stocks_analyzed, 3);
    }

    #[tokio::test]
    async fn reference_close_stands_in_for_live_price() {
        let source = FakeSource::default().with_stock("BEAR", bearish());
        let svc = service(source);
        let store = MemoryStore::default();
        let outcome = svc.rank_all_stocks(&store, date()).await.unwrap();

        let sell = &outcome.sell_signals[0];
        assert_eq!(sell.entry_price, 90.0);
        assert!(sell.stop_loss >= sell.entry_price * 1.05 - 1e-9);
        assert!(sell.reward_ratio_1 > 0.0);
    }

    #[tokio::test]
    async fn past_date_reads_data_as_of_that_date() {
        let mut source = FakeSource::default().with_stock("BULL", bullish());
        source.prices.insert("BULL".to_string(), 150.0);
        let svc = service(source);

        let outcome = svc
            .rank_all_stocks(&MemoryStore::default(), date())
            .await
            .unwrap();

        let requested = svc.source().requested_dates.lock().unwrap().clone();
        assert_eq!(requested.len(), 2);
        assert!(requested.iter().all(|d| *d == date()));
        assert_eq!(outcome.buy_signals[0].entry_price, 107.0);
    }

    #[tokio::test]
    async fn no_price_at_all_is_a_fetch_failure() {
        let snapshot = IndicatorSnapshot {
            close: None,
            ..bullish()
        };
        let svc = service(FakeSource::default().with_stock("NOPRICE", snapshot));
        let outcome = svc
            .rank_all_stocks(&MemoryStore::default(), date())
            .await
            .unwrap();
        assert_eq!(outcome.summary.analyzed, 0);
        assert_eq!(outcome.failures[0].stage, "price");
    }

    #[tokio::test]
    async fn slow_sentiment_times_out_to_neutral() {
        let mut source = FakeSource::default().with_stock("SLOW", neutral());
        source.slow_sentiment.insert("SLOW".to_string());
        source.sentiment.insert("SLOW".to_string(), 1.0);

        let svc = RankingService::new(
            EngineConfig::default(),
            RankingOptions {
                fetch_timeout: Duration::from_millis(50),
                ..RankingOptions::default()
            },
            source,
        );
        let outcome = svc
            .rank_all_stocks(&MemoryStore::default(), date())
            .await
            .unwrap();
        assert_eq!(outcome.summary.analyzed, 1);
        assert_eq!(outcome.analyses[0].scores.news_sentiment, 50.0);
    }

    #[tokio::test]
    async fn persistence_failure_fails_the_run() {
        let svc = service(FakeSource::default().with_stock("BULL", bullish()));
        let store = MemoryStore {
            fail_persist: true,
            ..MemoryStore::default()
        };
        let err = svc.rank_all_stocks(&store, date()).await.unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }

    #[tokio::test]
    async fn empty_universe_still_persists_a_neutral_day() {
        let svc = service(FakeSource::default());
        let store = MemoryStore::default();
        let outcome = svc.rank_all_stocks(&store, date()).await.unwrap();
        assert_eq!(outcome.summary.total_stocks, 0);
        assert!(outcome.analyses.is_empty());
        assert_eq!(store.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_moves_signals_through_their_lifecycle() {
        let svc = service(FakeSource::default());
        let (_, signal) = svc.evaluate(&stock("INFY"), &bullish(), 107.0, Some(0.4), date());
        let base = signal.unwrap();

        let hit = Signal {
            id: Uuid::new_v4(),
            ..base.clone()
        };
        let stale = Signal {
            id: Uuid::new_v4(),
            stock_id: stock("OLD").id,
            symbol: "OLD".to_string(),
            ..base.clone()
        };

        let mut source = FakeSource::default();
        source.prices.insert("INFY".to_string(), 121.0);
        let svc = service(source);

        let store = MemoryStore {
            active: vec![hit.clone(), stale.clone()],
            ..MemoryStore::default()
        };

        let today = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let changed = svc.refresh_signals(&store, today).await.unwrap();
        assert_eq!(changed, 2);

        let updates: HashMap<Uuid, SignalStatus> =
            store.updates.lock().unwrap().iter().copied().collect();
        assert_eq!(updates[&hit.id], SignalStatus::HitTarget2);
        assert_eq!(updates[&stale.id], SignalStatus::Expired);
    }

    #[test]
    fn signals_sort_by_strength_then_score() {
        let svc = service(FakeSource::default());
        let strong = svc.evaluate(&stock("A"), &bullish(), 107.0, Some(0.4), date());
        let moderate = svc.evaluate(&stock("B"), &bullish(), 107.0, Some(-0.2), date());
        assert_eq!(moderate.0.signal_strength(), Some(SignalStrength::Moderate));

        let mut analyses = vec![moderate.0.clone(), strong.0.clone()];
        sort_analyses(&mut analyses);
        assert_eq!(analyses[0].symbol, "A");
        let mut signals = vec![moderate.1.unwrap(), strong.1.unwrap()];
        sort_signals(&mut signals, &analyses);
        assert_eq!(signals[0].symbol, "A");
    }
}
