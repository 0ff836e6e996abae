use crate::config::Settings;
use crate::ingest::types::QuoteResponse;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PATH: &str = "/v1/quote";
const DEFAULT_RETRIES: u32 = 3;

/// Live quotes from an external HTTP/JSON provider.
#[derive(Debug, Clone)]
pub struct HttpQuoteProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpQuoteProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_quote_provider_base_url()?.to_string();
        let api_key = settings.quote_provider_api_key.clone();

        let timeout_secs = std::env::var("QUOTE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("QUOTE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let path = std::env::var("QUOTE_PROVIDER_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build quote provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, symbol: &str) -> Result<QuoteResponse> {
        let res = self
            .http
            .get(self.url())
            .headers(self.headers()?)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("quote provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read quote provider response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("quote provider response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("quote provider HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<QuoteResponse>(raw_json)
            .context("failed to parse quote provider response into QuoteResponse")
    }

    /// Latest price for `symbol`, retried with exponential backoff.
    pub async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbol).await {
                Ok(quote) => {
                    validate_quote(&quote, symbol)?;
                    return Ok(quote.price);
                }
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(250 << (attempt - 1));
                    tracing::warn!(symbol, attempt, ?backoff, error = %err, "quote fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn validate_quote(quote: &QuoteResponse, expected_symbol: &str) -> Result<()> {
    anyhow::ensure!(
        quote.symbol.trim().eq_ignore_ascii_case(expected_symbol.trim()),
        "quote symbol mismatch: expected {expected_symbol}, got {}",
        quote.symbol
    );
    if let Some(price) = quote.price {
        anyhow::ensure!(
            price.is_finite() && price > 0.0,
            "quote price must be positive (got {price})"
        );
    }
    Ok(())
}
