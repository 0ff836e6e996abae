use crate::ingest::MarketDataSource;
use crate::ranking::error::RunInProgress;
use crate::ranking::lock::RunLock;
use crate::ranking::{RankingOutcome, RankingService};
use crate::storage::lock::RankingRunLock;
use crate::storage::PgStore;
use chrono::NaiveDate;

/// One guarded daily run: in-process single flight, then the cross-process advisory lock shared
/// by all as-of dates, then signal refresh followed by ranking.
///
/// Returns [`RunInProgress`] (inside the `anyhow::Error`) when either lock is taken.
pub async fn run_exclusive<D: MarketDataSource>(
    service: &RankingService<D>,
    store: &PgStore,
    run_lock: &RunLock,
    as_of_date: NaiveDate,
    today: NaiveDate,
) -> anyhow::Result<RankingOutcome> {
    let _guard = run_lock.try_acquire()?;

    let Some(run_guard) = RankingRunLock::try_acquire(store.pool(), as_of_date).await? else {
        tracing::warn!(%as_of_date, "ranking run lock not acquired; another run in progress");
        return Err(RunInProgress.into());
    };

    // A failed refresh leaves statuses as they were; the ranking itself still runs.
    if let Err(err) = service.refresh_signals(store, today).await {
        tracing::error!(%as_of_date, error = %err, "signal refresh failed");
    }

    let result = service.rank_all_stocks(store, as_of_date).await;

    if let Err(err) = run_guard.release().await {
        tracing::warn!(%as_of_date, error = %err, "advisory lock release failed");
    }

    result
}

/// True when `err` means a run was already in progress.
pub fn is_run_in_progress(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RunInProgress>().is_some()
}
