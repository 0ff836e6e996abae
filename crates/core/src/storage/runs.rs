use crate::domain::analysis::{Analysis, SignalStrength, SignalType};
use crate::domain::signal::Signal;
use crate::ranking::market::MarketStatus;
use crate::ranking::RunBatch;
use anyhow::Context;
use sqlx::types::Json;
use uuid::Uuid;

const DEFAULT_INSERT_BATCH: usize = 200;

/// Writes a whole run in one transaction: the date's previous rows for these stocks are replaced
/// and the market status is upserted. Any failure rolls everything back.
pub async fn persist_run(pool: &sqlx::PgPool, batch: &RunBatch) -> anyhow::Result<()> {
    let chunk_size: usize = std::env::var("RUN_INSERT_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_INSERT_BATCH);
    anyhow::ensure!(chunk_size >= 1, "RUN_INSERT_BATCH must be >= 1");

    let as_of_date = batch.as_of_date;
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let stock_ids: Vec<Uuid> = batch.analyses.iter().map(|a| a.stock_id).collect();
    if !stock_ids.is_empty() {
        let deleted_signals = sqlx::query(
            "DELETE FROM trading_signals WHERE signal_date = $1 AND stock_id = ANY($2)",
        )
        .persistent(false)
        .bind(as_of_date)
        .bind(stock_ids.as_slice())
        .execute(&mut *tx)
        .await
        .context("delete previous trading_signals failed")?
        .rows_affected();

        let deleted_analyses = sqlx::query(
            "DELETE FROM daily_analysis WHERE analysis_date = $1 AND stock_id = ANY($2)",
        )
        .persistent(false)
        .bind(as_of_date)
        .bind(stock_ids.as_slice())
        .execute(&mut *tx)
        .await
        .context("delete previous daily_analysis failed")?
        .rows_affected();

        if deleted_signals + deleted_analyses > 0 {
            tracing::info!(
                %as_of_date,
                deleted_analyses,
                deleted_signals,
                "replacing previous run rows"
            );
        }
    }

    for chunk in batch.analyses.chunks(chunk_size) {
        insert_analyses(&mut tx, chunk).await?;
    }
    for chunk in batch.signals.chunks(chunk_size) {
        insert_signals(&mut tx, chunk).await?;
    }
    upsert_market_status(&mut tx, &batch.market_status).await?;

    tx.commit().await.context("commit transaction failed")?;
    Ok(())
}

async fn insert_analyses(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    chunk: &[Analysis],
) -> anyhow::Result<()> {
    let mut qb = sqlx::QueryBuilder::new(
        "INSERT INTO daily_analysis (id, stock_id, analysis_date, ma_alignment_score, supertrend_score, \
         rsi_strength_score, volume_expansion_score, news_sentiment_score, total_score, is_bullish, \
         is_bearish, signal_generated, signal_type, signal_strength) ",
    );
    qb.push_values(chunk, |mut b, a| {
        b.push_bind(Uuid::new_v4())
            .push_bind(a.stock_id)
            .push_bind(a.analysis_date)
            .push_bind(a.scores.ma_alignment)
            .push_bind(a.scores.supertrend)
            .push_bind(a.scores.rsi_strength)
            .push_bind(a.scores.volume_expansion)
            .push_bind(a.scores.news_sentiment)
            .push_bind(a.total_score)
            .push_bind(a.is_bullish)
            .push_bind(a.is_bearish)
            .push_bind(a.signal_generated())
            .push_bind(a.signal_type().map(SignalType::as_str))
            .push_bind(a.signal_strength().map(SignalStrength::as_str));
    });

    qb.build()
        .persistent(false)
        .execute(&mut **tx)
        .await
        .context("insert daily_analysis failed")?;
    Ok(())
}

async fn insert_signals(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    chunk: &[Signal],
) -> anyhow::Result<()> {
    let mut qb = sqlx::QueryBuilder::new(
        "INSERT INTO trading_signals (id, stock_id, signal_date, signal_type, signal_strength, \
         entry_price, target_1, target_2, stop_loss, risk_amount, reward_ratio_1, reward_ratio_2, \
         rationale, status, expiry_date) ",
    );
    qb.push_values(chunk, |mut b, s| {
        b.push_bind(s.id)
            .push_bind(s.stock_id)
            .push_bind(s.signal_date)
            .push_bind(s.signal_type.as_str())
            .push_bind(s.signal_strength.as_str())
            .push_bind(s.entry_price)
            .push_bind(s.target_1)
            .push_bind(s.target_2)
            .push_bind(s.stop_loss)
            .push_bind(s.risk_amount)
            .push_bind(s.reward_ratio_1)
            .push_bind(s.reward_ratio_2)
            .push_bind(Json(s.rationale.clone()))
            .push_bind(s.status.as_str())
            .push_bind(s.expiry_date);
    });

    qb.build()
        .persistent(false)
        .execute(&mut **tx)
        .await
        .context("insert trading_signals failed")?;
    Ok(())
}

async fn upsert_market_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    status: &MarketStatus,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO market_status (trading_date, overall_sentiment, total_stocks_analyzed, bullish_stocks, bearish_stocks) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (trading_date) DO UPDATE \
           SET overall_sentiment = EXCLUDED.overall_sentiment, \
               total_stocks_analyzed = EXCLUDED.total_stocks_analyzed, \
               bullish_stocks = EXCLUDED.bullish_stocks, \
               bearish_stocks = EXCLUDED.bearish_stocks, \
               updated_at = now()",
    )
    .persistent(false)
    .bind(status.trading_date)
    .bind(status.overall_sentiment.as_str())
    .bind(status.total_stocks_analyzed)
    .bind(status.bullish_stocks)
    .bind(status.bearish_stocks)
    .execute(&mut **tx)
    .await
    .context("upsert market_status failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::domain::analysis::{Analysis, Classification, ComponentScores};
    use crate::domain::analysis::{SignalStrength, SignalType};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn analysis(signal_type: SignalType, strength: SignalStrength) -> Analysis {
        Analysis {
            stock_id: Uuid::new_v4(),
            symbol: "TCS".to_string(),
            analysis_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            scores: ComponentScores {
                ma_alignment: 50.0,
                supertrend: 50.0,
                rsi_strength: 50.0,
                volume_expansion: 50.0,
                news_sentiment: 50.0,
            },
            total_score: 50.0,
            is_bullish: false,
            is_bearish: false,
            classification: Classification {
                signal_type,
                strength,
            },
        }
    }

    #[test]
    fn hold_rows_store_no_signal_columns() {
        let hold = analysis(SignalType::Hold, SignalStrength::Neutral);
        assert!(!hold.signal_generated());
        assert_eq!(hold.signal_type().map(SignalType::as_str), None);
        assert_eq!(hold.signal_strength().map(SignalStrength::as_str), None);

        let buy = analysis(SignalType::Buy, SignalStrength::Moderate);
        assert_eq!(buy.signal_type().map(SignalType::as_str), Some("BUY"));
        assert_eq!(
            buy.signal_strength().map(SignalStrength::as_str),
            Some("MODERATE")
        );
    }
}
