use anyhow::Context;
use chrono::NaiveDate;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the lock keeps its own pooled connection
// for as long as it is held.
const LOCK_NAMESPACE: i64 = 0x5349_4752_414E; // "SIGRAN"

// One key for every ranking run: runs for different dates share the ACTIVE signal set.
const RANKING_RUN_KEY: i64 = LOCK_NAMESPACE;

/// Cross-process guard: at most one ranking run at a time, whatever its as-of date.
#[derive(Debug)]
pub struct RankingRunLock {
    conn: Option<PoolConnection<Postgres>>,
    as_of_date: NaiveDate,
}

impl RankingRunLock {
    /// `Ok(None)` when another session holds the lock.
    pub async fn try_acquire(
        pool: &sqlx::PgPool,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<Self>> {
        let key = RANKING_RUN_KEY;
        let mut conn = pool
            .acquire()
            .await
            .context("acquire connection for advisory lock failed")?;

        let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;

        Ok(acquired.0.then_some(Self {
            conn: Some(conn),
            as_of_date,
        }))
    }

    pub fn key(&self) -> i64 {
        RANKING_RUN_KEY
    }

    /// Date of the run holding the lock.
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of_date
    }

    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key();
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("SELECT pg_advisory_unlock($1)")
                .persistent(false)
                .bind(key)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("failed to release advisory lock (key={key})"))?;
        }
        Ok(())
    }
}

impl Drop for RankingRunLock {
    fn drop(&mut self) {
        // Not released explicitly: close the session instead of returning a locked
        // connection to the pool.
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}
