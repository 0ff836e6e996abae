pub mod domain;
pub mod engine;
pub mod ingest;
pub mod ranking;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::str::FromStr;
    use std::time::Duration;

    pub const MAX_SIGNAL_EXPIRY_DAYS: u32 = 365;
    pub const MAX_NEWS_LOOKBACK_HOURS: i64 = 24 * 90;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub quote_provider_base_url: Option<String>,
        pub quote_provider_api_key: Option<String>,
        pub daily_analysis_time: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                quote_provider_base_url: std::env::var("QUOTE_PROVIDER_BASE_URL").ok(),
                quote_provider_api_key: std::env::var("QUOTE_PROVIDER_API_KEY").ok(),
                daily_analysis_time: std::env::var("DAILY_ANALYSIS_TIME").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_quote_provider_base_url(&self) -> anyhow::Result<&str> {
            self.quote_provider_base_url
                .as_deref()
                .context("QUOTE_PROVIDER_BASE_URL is required")
        }
    }

    /// Options of the scoring engine and the level generator.
    ///
    /// The bias thresholds (`bullish_threshold` / `bearish_threshold`) drive the analysis flags
    /// only; BUY/SELL classification uses the signal thresholds.
    #[derive(Debug, Clone, PartialEq)]
    pub struct EngineConfig {
        pub buy_threshold: f64,
        pub sell_threshold: f64,
        pub bullish_threshold: f64,
        pub bearish_threshold: f64,
        pub signal_expiry_days: u32,
        /// ATR multiple added to (or subtracted from) the entry for the second target.
        pub atr_multiplier_target: f64,
        /// Multiple of the stop distance used for the first target.
        pub atr_multiplier_sl: f64,
    }

    impl Default for EngineConfig {
        fn default() -> Self {
            Self {
                buy_threshold: 70.0,
                sell_threshold: 30.0,
                bullish_threshold: 60.0,
                bearish_threshold: 40.0,
                signal_expiry_days: 5,
                atr_multiplier_target: 2.0,
                atr_multiplier_sl: 1.5,
            }
        }
    }

    impl EngineConfig {
        pub fn from_env() -> anyhow::Result<Self> {
            let mut out = Self::default();

            if let Some(v) = env_parse("SCORE_THRESHOLD_BUY")? {
                out.buy_threshold = v;
            }
            if let Some(v) = env_parse("SCORE_THRESHOLD_SELL")? {
                out.sell_threshold = v;
            }
            if let Some(v) = env_parse("BULLISH_THRESHOLD")? {
                out.bullish_threshold = v;
            }
            if let Some(v) = env_parse("BEARISH_THRESHOLD")? {
                out.bearish_threshold = v;
            }
            if let Some(v) = env_parse("SIGNAL_EXPIRY_DAYS")? {
                out.signal_expiry_days = v;
            }
            if let Some(v) = env_parse("ATR_MULTIPLIER_TARGET")? {
                out.atr_multiplier_target = v;
            }
            if let Some(v) = env_parse("ATR_MULTIPLIER_SL")? {
                out.atr_multiplier_sl = v;
            }

            out.validate()?;
            Ok(out)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(
                (0.0..=100.0).contains(&self.buy_threshold)
                    && (0.0..=100.0).contains(&self.sell_threshold),
                "signal thresholds must be within 0..=100 (buy={}, sell={})",
                self.buy_threshold,
                self.sell_threshold
            );
            anyhow::ensure!(
                self.sell_threshold < self.buy_threshold,
                "sell threshold ({}) must be below buy threshold ({})",
                self.sell_threshold,
                self.buy_threshold
            );
            anyhow::ensure!(
                self.bearish_threshold < self.bullish_threshold,
                "bearish threshold ({}) must be below bullish threshold ({})",
                self.bearish_threshold,
                self.bullish_threshold
            );
            anyhow::ensure!(
                (1..=MAX_SIGNAL_EXPIRY_DAYS).contains(&self.signal_expiry_days),
                "SIGNAL_EXPIRY_DAYS must be within 1..={MAX_SIGNAL_EXPIRY_DAYS} (got {})",
                self.signal_expiry_days
            );
            anyhow::ensure!(
                self.atr_multiplier_target > 0.0 && self.atr_multiplier_sl > 0.0,
                "ATR multipliers must be positive (target={}, sl={})",
                self.atr_multiplier_target,
                self.atr_multiplier_sl
            );
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    pub struct RankingOptions {
        /// Max number of stocks fetched at the same time.
        pub concurrency: usize,
        /// Per-call timeout for indicator / sentiment / price lookups.
        pub fetch_timeout: Duration,
        pub news_lookback_hours: i64,
        pub top_stocks_limit: usize,
    }

    impl Default for RankingOptions {
        fn default() -> Self {
            Self {
                concurrency: 8,
                fetch_timeout: Duration::from_secs(10),
                news_lookback_hours: 72,
                top_stocks_limit: 10,
            }
        }
    }

    impl RankingOptions {
        pub fn from_env() -> anyhow::Result<Self> {
            let mut out = Self::default();

            if let Some(n) = env_parse("RANKING_CONCURRENCY")? {
                out.concurrency = n;
            }
            if let Some(secs) = env_parse::<u64>("FETCH_TIMEOUT_SECS")? {
                out.fetch_timeout = Duration::from_secs(secs);
            }
            if let Some(h) = env_parse("NEWS_LOOKBACK_HOURS")? {
                out.news_lookback_hours = h;
            }
            if let Some(n) = env_parse("TOP_STOCKS_LIMIT")? {
                out.top_stocks_limit = n;
            }

            out.validate()?;
            Ok(out)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(self.concurrency >= 1, "RANKING_CONCURRENCY must be >= 1");
            anyhow::ensure!(
                (1..=MAX_NEWS_LOOKBACK_HOURS).contains(&self.news_lookback_hours),
                "NEWS_LOOKBACK_HOURS must be within 1..={MAX_NEWS_LOOKBACK_HOURS} (got {})",
                self.news_lookback_hours
            );
            Ok(())
        }
    }

    fn env_parse<T: FromStr>(key: &str) -> anyhow::Result<Option<T>> {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {s}")),
            _ => Ok(None),
        }
    }

}
