use crate::domain::analysis::{SignalStrength, SignalType};
use crate::domain::signal::{Rationale, Signal, SignalStatus};
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

const SIGNAL_COLUMNS: &str = "t.id, t.stock_id, s.symbol, t.signal_date, t.signal_type, \
     t.signal_strength, t.entry_price, t.target_1, t.target_2, t.stop_loss, t.risk_amount, \
     t.reward_ratio_1, t.reward_ratio_2, t.rationale, t.status, t.expiry_date";

const STRENGTH_RANK_SQL: &str = "CASE t.signal_strength \
     WHEN 'STRONG' THEN 3 WHEN 'MODERATE' THEN 2 WHEN 'WEAK' THEN 1 ELSE 0 END";

#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub date: Option<NaiveDate>,
    pub signal_type: Option<SignalType>,
    pub status: Option<SignalStatus>,
    pub limit: Option<i64>,
}

/// An ACTIVE signal with the score of the analysis that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct TopSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub name: Option<String>,
    pub total_score: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    id: Uuid,
    stock_id: Uuid,
    symbol: String,
    signal_date: NaiveDate,
    signal_type: String,
    signal_strength: String,
    entry_price: f64,
    target_1: f64,
    target_2: f64,
    stop_loss: f64,
    risk_amount: f64,
    reward_ratio_1: f64,
    reward_ratio_2: f64,
    rationale: Json<Rationale>,
    status: String,
    expiry_date: NaiveDate,
}

#[derive(Debug, sqlx::FromRow)]
struct TopSignalRow {
    #[sqlx(flatten)]
    signal: SignalRow,
    name: Option<String>,
    total_score: Option<f64>,
}

impl TryFrom<SignalRow> for Signal {
    type Error = anyhow::Error;

    fn try_from(row: SignalRow) -> anyhow::Result<Self> {
        let signal_type = SignalType::parse(&row.signal_type)
            .with_context(|| format!("unknown signal_type {} (id={})", row.signal_type, row.id))?;
        let signal_strength = SignalStrength::parse(&row.signal_strength).with_context(|| {
            format!("unknown signal_strength {} (id={})", row.signal_strength, row.id)
        })?;
        let status = SignalStatus::parse(&row.status)
            .with_context(|| format!("unknown signal status {} (id={})", row.status, row.id))?;

        Ok(Signal {
            id: row.id,
            stock_id: row.stock_id,
            symbol: row.symbol,
            signal_date: row.signal_date,
            signal_type,
            signal_strength,
            entry_price: row.entry_price,
            target_1: row.target_1,
            target_2: row.target_2,
            stop_loss: row.stop_loss,
            risk_amount: row.risk_amount,
            reward_ratio_1: row.reward_ratio_1,
            reward_ratio_2: row.reward_ratio_2,
            rationale: row.rationale.0,
            status,
            expiry_date: row.expiry_date,
        })
    }
}

/// Newest first; within a date, strongest first.
pub async fn fetch_signals(
    pool: &sqlx::PgPool,
    filter: &SignalFilter,
) -> anyhow::Result<Vec<Signal>> {
    let sql = format!(
        "SELECT {SIGNAL_COLUMNS} \
         FROM trading_signals t \
         JOIN stocks s ON s.id = t.stock_id \
         WHERE ($1::date IS NULL OR t.signal_date = $1) \
           AND ($2::text IS NULL OR t.signal_type = $2) \
           AND ($3::text IS NULL OR t.status = $3) \
         ORDER BY t.signal_date DESC, {STRENGTH_RANK_SQL} DESC, s.symbol ASC \
         LIMIT $4"
    );

    let rows = sqlx::query_as::<_, SignalRow>(&sql)
        .persistent(false)
        .bind(filter.date)
        .bind(filter.signal_type.map(SignalType::as_str))
        .bind(filter.status.map(SignalStatus::as_str))
        .bind(filter.limit)
        .fetch_all(pool)
        .await
        .context("select trading_signals failed")?;

    rows.into_iter().map(Signal::try_from).collect()
}

pub async fn fetch_active_signals(pool: &sqlx::PgPool) -> anyhow::Result<Vec<Signal>> {
    fetch_signals(
        pool,
        &SignalFilter {
            status: Some(SignalStatus::Active),
            ..SignalFilter::default()
        },
    )
    .await
}

/// ACTIVE signals of the latest signal date, strongest first, then by analysis score.
pub async fn fetch_top_signals(
    pool: &sqlx::PgPool,
    signal_type: Option<SignalType>,
    limit: i64,
) -> anyhow::Result<Vec<TopSignal>> {
    let sql = format!(
        "SELECT {SIGNAL_COLUMNS}, s.name, a.total_score \
         FROM trading_signals t \
         JOIN stocks s ON s.id = t.stock_id \
         LEFT JOIN daily_analysis a ON a.stock_id = t.stock_id AND a.analysis_date = t.signal_date \
         WHERE t.status = 'ACTIVE' \
           AND t.signal_date = (SELECT max(signal_date) FROM trading_signals WHERE status = 'ACTIVE') \
           AND ($1::text IS NULL OR t.signal_type = $1) \
         ORDER BY {STRENGTH_RANK_SQL} DESC, a.total_score DESC NULLS LAST, s.symbol ASC \
         LIMIT $2"
    );

    let rows = sqlx::query_as::<_, TopSignalRow>(&sql)
        .persistent(false)
        .bind(signal_type.map(SignalType::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("select top trading_signals failed")?;

    rows.into_iter()
        .map(|row| {
            Ok(TopSignal {
                signal: Signal::try_from(row.signal)?,
                name: row.name,
                total_score: row.total_score,
            })
        })
        .collect()
}

pub async fn update_signal_statuses(
    pool: &sqlx::PgPool,
    updates: &[(Uuid, SignalStatus)],
) -> anyhow::Result<u64> {
    if updates.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("begin transaction failed")?;
    let mut affected: u64 = 0;

    for (id, status) in updates {
        // Terminal rows are never touched again.
        let res = sqlx::query(
            "UPDATE trading_signals SET status = $2, updated_at = now() \
             WHERE id = $1 AND status = 'ACTIVE'",
        )
        .persistent(false)
        .bind(id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("update trading_signals status failed (id={id})"))?;
        affected += res.rows_affected();
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}
