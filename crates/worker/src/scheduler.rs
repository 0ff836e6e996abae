use chrono::{NaiveTime, Utc};
use sigrank_core::ingest::MarketDataSource;
use sigrank_core::ranking::lock::RunLock;
use sigrank_core::ranking::run::{is_run_in_progress, run_exclusive};
use sigrank_core::ranking::RankingService;
use sigrank_core::storage::PgStore;
use sigrank_core::time::ist_market;

/// Runs the daily ranking at `at` (IST wall clock) until ctrl-c.
///
/// A tick that finds a run still in progress is skipped, never queued.
pub async fn run_daily<D: MarketDataSource>(
    service: &RankingService<D>,
    store: &PgStore,
    run_lock: &RunLock,
    at: NaiveTime,
) -> anyhow::Result<()> {
    tracing::info!(%at, timezone = "IST", "daily scheduler started");

    loop {
        let now = Utc::now();
        let next = ist_market::next_run_after(now, at)?;
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, wait_secs = wait.as_secs(), "waiting for next daily run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received; scheduler stopping");
                return Ok(());
            }
        }

        let now = Utc::now();
        let as_of_date = ist_market::resolve_as_of_date(None, now)?;
        let today = ist_market::today_ist(now)?;

        match run_exclusive(service, store, run_lock, as_of_date, today).await {
            Ok(outcome) => tracing::info!(
                %as_of_date,
                analyzed = outcome.summary.analyzed,
                failed = outcome.summary.failed,
                buy_signals = outcome.summary.buy_signals,
                sell_signals = outcome.summary.sell_signals,
                "scheduled run finished"
            ),
            Err(err) if is_run_in_progress(&err) => {
                tracing::warn!(%as_of_date, "previous run still in progress; tick skipped")
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(%as_of_date, error = %err, "scheduled run failed");
            }
        }
    }
}
