use crate::domain::StockRef;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Per-stock data problem. The stock is left out of the run; the batch carries on.
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub stock_id: Uuid,
    pub symbol: String,
    pub stage: &'static str,
    pub detail: String,
}

impl FetchFailure {
    pub fn new(stock: &StockRef, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stock_id: stock.id,
            symbol: stock.symbol.clone(),
            stage,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetch failed (symbol={}, stage={}): {}",
            self.symbol, self.stage, self.detail
        )
    }
}

impl std::error::Error for FetchFailure {}

/// Returned when another ranking run holds the run lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunInProgress;

impl fmt::Display for RunInProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a ranking run is already in progress")
    }
}

impl std::error::Error for RunInProgress {}
