use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sigrank_core::config::{EngineConfig, RankingOptions, Settings};
use sigrank_core::domain::analysis::SignalType;
use sigrank_core::domain::signal::{Signal, SignalStatus};
use sigrank_core::ingest::postgres::PgMarketData;
use sigrank_core::ingest::provider::HttpQuoteProvider;
use sigrank_core::ranking::lock::RunLock;
use sigrank_core::ranking::market::{summarize_market, MarketStatus, MarketSummary};
use sigrank_core::ranking::run::{is_run_in_progress, run_exclusive};
use sigrank_core::ranking::{RankingService, RunSummary};
use sigrank_core::storage::analyses::{self, RankedAnalysis};
use sigrank_core::storage::signals::{self, SignalFilter, TopSignal};
use sigrank_core::storage::PgStore;
use sigrank_core::time::ist_market;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_LIMIT: i64 = 500;

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

    let config = EngineConfig::from_env()?;
    let options = RankingOptions::from_env()?;
    let top_stocks_limit = options.top_stocks_limit;

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
        {
            Ok(pool) => match sigrank_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let runner = match &pool {
        Some(pool) => {
            let mut source = PgMarketData::new(pool.clone(), options.news_lookback_hours);
            if settings.quote_provider_base_url.is_some() {
                source = source.with_quotes(HttpQuoteProvider::from_settings(&settings)?);
            }
            Some(Arc::new(Runner {
                service: RankingService::new(config, options, source),
                store: PgStore::new(pool.clone()),
                run_lock: RunLock::new(),
            }))
        }
        None => None,
    };

    let state = AppState {
        pool,
        runner,
        top_stocks_limit,
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analysis/daily-ranking", get(get_daily_ranking))
        .route("/analysis/top-stocks", get(get_top_stocks))
        .route("/analysis/market-sentiment", get(get_market_sentiment))
        .route("/analysis/run", post(run_analysis))
        .route("/signals", get(get_signals))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

struct Runner {
    service: RankingService<PgMarketData>,
    store: PgStore,
    run_lock: RunLock,
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    runner: Option<Arc<Runner>>,
    top_stocks_limit: usize,
}

impl AppState {
    fn pool(&self) -> Result<&PgPool, StatusCode> {
        self.pool.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

fn parse_signal_type(s: Option<&str>) -> Result<Option<SignalType>, StatusCode> {
    match s.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => match SignalType::parse(&s.to_ascii_uppercase()) {
            Some(t) if t.is_actionable() => Ok(Some(t)),
            _ => Err(StatusCode::BAD_REQUEST),
        },
    }
}

fn parse_status(s: Option<&str>) -> Result<Option<SignalStatus>, StatusCode> {
    match s.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => SignalStatus::parse(&s.to_ascii_uppercase())
            .map(Some)
            .ok_or(StatusCode::BAD_REQUEST),
    }
}

/// Explicit date, else the latest date with analyses. `None` when nothing was analysed yet.
async fn resolve_date(pool: &PgPool, date: Option<NaiveDate>) -> Result<Option<NaiveDate>, StatusCode> {
    match date {
        Some(d) => Ok(Some(d)),
        None => analyses::latest_analysis_date(pool).await.map_err(internal_error),
    }
}

#[derive(Debug, Deserialize)]
struct RankingQuery {
    date: Option<NaiveDate>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct DailyRankingResponse {
    date: NaiveDate,
    total_stocks: usize,
    rankings: Vec<RankedAnalysis>,
}

async fn get_daily_ranking(
    State(state): State<AppState>,
    Query(q): Query<RankingQuery>,
) -> Result<Json<DailyRankingResponse>, StatusCode> {
    let pool = state.pool()?;
    let date = resolve_date(pool, q.date)
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let rankings = analyses::fetch_daily_ranking(pool, date, Some(clamp_limit(q.limit, 50)))
        .await
        .map_err(internal_error)?;

    Ok(Json(DailyRankingResponse {
        date,
        total_stocks: rankings.len(),
        rankings,
    }))
}

#[derive(Debug, Deserialize)]
struct TopStocksQuery {
    limit: Option<i64>,
    signal_type: Option<String>,
}

async fn get_top_stocks(
    State(state): State<AppState>,
    Query(q): Query<TopStocksQuery>,
) -> Result<Json<Vec<TopSignal>>, StatusCode> {
    let pool = state.pool()?;
    let signal_type = parse_signal_type(q.signal_type.as_deref())?;
    let default_limit = i64::try_from(state.top_stocks_limit).unwrap_or(MAX_LIMIT);

    let top = signals::fetch_top_signals(pool, signal_type, clamp_limit(q.limit, default_limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(top))
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct MarketSentimentResponse {
    #[serde(flatten)]
    summary: MarketSummary,
    /// As recorded by the run that produced the date's analyses.
    recorded: Option<MarketStatus>,
}

async fn get_market_sentiment(
    State(state): State<AppState>,
    Query(q): Query<DateQuery>,
) -> Result<Json<MarketSentimentResponse>, StatusCode> {
    let pool = state.pool()?;
    let date = resolve_date(pool, q.date)
        .await?
        .ok_or(StatusCode::NOT_FOUND)?;

    let ranked = analyses::fetch_daily_ranking(pool, date, None)
        .await
        .map_err(internal_error)?;
    let analyses: Vec<_> = ranked.into_iter().map(|r| r.analysis).collect();

    let summary = summarize_market(date, &analyses).ok_or(StatusCode::NOT_FOUND)?;
    let recorded = analyses::fetch_market_status(pool, date)
        .await
        .map_err(internal_error)?;

    Ok(Json(MarketSentimentResponse { summary, recorded }))
}

#[derive(Debug, Deserialize)]
struct SignalsQuery {
    date: Option<NaiveDate>,
    signal_type: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
}

async fn get_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> Result<Json<Vec<Signal>>, StatusCode> {
    let pool = state.pool()?;
    let filter = SignalFilter {
        date: q.date,
        signal_type: parse_signal_type(q.signal_type.as_deref())?,
        status: parse_status(q.status.as_deref())?,
        limit: Some(clamp_limit(q.limit, 100)),
    };

    let out = signals::fetch_signals(pool, &filter)
        .await
        .map_err(internal_error)?;
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    as_of_date: Option<String>,
}

async fn run_analysis(
    State(state): State<AppState>,
    Query(q): Query<RunQuery>,
) -> Result<Json<RunSummary>, StatusCode> {
    let runner = state.runner.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let now = chrono::Utc::now();
    let as_of_date = ist_market::resolve_as_of_date(q.as_of_date.as_deref(), now)
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let today = ist_market::today_ist(now).map_err(internal_error)?;

    match run_exclusive(
        &runner.service,
        &runner.store,
        &runner.run_lock,
        as_of_date,
        today,
    )
    .await
    {
        Ok(outcome) => Ok(Json(outcome.summary)),
        Err(err) if is_run_in_progress(&err) => Err(StatusCode::CONFLICT),
        Err(err) => Err(internal_error(err)),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
