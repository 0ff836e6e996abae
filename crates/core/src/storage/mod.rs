pub mod analyses;
pub mod lock;
pub mod runs;
pub mod signals;

use crate::domain::signal::{Signal, SignalStatus};
use crate::ranking::{AnalysisStore, RunBatch};
use anyhow::Context;
use uuid::Uuid;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Postgres-backed write side of the ranking run.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl AnalysisStore for PgStore {
    async fn persist_run(&self, batch: &RunBatch) -> anyhow::Result<()> {
        runs::persist_run(&self.pool, batch).await
    }

    async fn active_signals(&self) -> anyhow::Result<Vec<Signal>> {
        signals::fetch_active_signals(&self.pool).await
    }

    async fn update_signal_statuses(
        &self,
        updates: &[(Uuid, SignalStatus)],
    ) -> anyhow::Result<u64> {
        signals::update_signal_statuses(&self.pool, updates).await
    }
}
