use anyhow::Context;
use clap::{Parser, Subcommand};
use sigrank_core::config::{EngineConfig, RankingOptions, Settings};
use sigrank_core::ingest::postgres::PgMarketData;
use sigrank_core::ingest::provider::HttpQuoteProvider;
use sigrank_core::ranking::lock::RunLock;
use sigrank_core::ranking::run::{is_run_in_progress, run_exclusive};
use sigrank_core::ranking::{RankingOutcome, RankingService};
use sigrank_core::storage::PgStore;
use sigrank_core::time::ist_market;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod scheduler;
mod stub;

#[derive(Debug, Parser)]
#[command(name = "sigrank_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daily ranking once and exit.
    Run {
        /// Market as-of date (YYYY-MM-DD). Defaults to the latest closed IST business day.
        #[arg(long)]
        as_of_date: Option<String>,

        /// Score a deterministic stub universe without touching the database.
        #[arg(long)]
        dry_run: bool,

        /// Size of the stub universe used by --dry-run.
        #[arg(long, default_value_t = 50)]
        stub_size: usize,
    },
    /// Stay up and run every day at DAILY_ANALYSIS_TIME (HH:MM, IST).
    Schedule,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let config = EngineConfig::from_env()?;
    let options = RankingOptions::from_env()?;

    match args.command {
        Command::Run {
            as_of_date,
            dry_run,
            stub_size,
        } => {
            let now = chrono::Utc::now();
            let as_of_date = ist_market::resolve_as_of_date(as_of_date.as_deref(), now)?;

            if dry_run {
                let source = stub::StubMarketData::new(stub_size)?;
                let service = RankingService::new(config, options, source);
                let outcome = service.rank_all_stocks(&stub::DryRunStore, as_of_date).await?;
                log_outcome(&outcome, true);
                return Ok(());
            }

            let (service, store) = connect(&settings, config, options).await?;
            let today = ist_market::today_ist(now)?;

            match run_exclusive(&service, &store, &RunLock::new(), as_of_date, today).await {
                Ok(outcome) => log_outcome(&outcome, false),
                Err(err) if is_run_in_progress(&err) => {
                    tracing::warn!(%as_of_date, "another run in progress; nothing to do");
                }
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(%as_of_date, error = %err, "ranking run failed");
                    return Err(err);
                }
            }
        }
        Command::Schedule => {
            let at = ist_market::parse_daily_time(
                settings
                    .daily_analysis_time
                    .as_deref()
                    .unwrap_or(ist_market::DEFAULT_DAILY_ANALYSIS_TIME),
            )?;
            let (service, store) = connect(&settings, config, options).await?;
            scheduler::run_daily(&service, &store, &RunLock::new(), at).await?;
        }
    }

    Ok(())
}

async fn connect(
    settings: &Settings,
    config: EngineConfig,
    options: RankingOptions,
) -> anyhow::Result<(RankingService<PgMarketData>, PgStore)> {
    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(options.concurrency.clamp(2, 32) as u32 + 1)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    sigrank_core::storage::migrate(&pool).await?;

    let mut source = PgMarketData::new(pool.clone(), options.news_lookback_hours);
    if settings.quote_provider_base_url.is_some() {
        source = source.with_quotes(HttpQuoteProvider::from_settings(settings)?);
    } else {
        tracing::info!("QUOTE_PROVIDER_BASE_URL not set; using reference close prices");
    }

    Ok((
        RankingService::new(config, options, source),
        PgStore::new(pool),
    ))
}

fn log_outcome(outcome: &RankingOutcome, dry_run: bool) {
    let summary = &outcome.summary;
    for entry in &summary.top {
        tracing::info!(
            symbol = %entry.symbol,
            total_score = entry.total_score,
            signal_type = entry.signal_type.as_str(),
            "top ranked"
        );
    }
    tracing::info!(
        as_of_date = %summary.as_of_date,
        dry_run,
        total_stocks = summary.total_stocks,
        analyzed = summary.analyzed,
        failed = summary.failed,
        buy_signals = summary.buy_signals,
        sell_signals = summary.sell_signals,
        market = outcome.market_status.overall_sentiment.as_str(),
        elapsed_ms = summary.elapsed_ms,
        "daily ranking run complete"
    );
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
