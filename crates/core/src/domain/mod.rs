pub mod analysis;
pub mod indicators;
pub mod signal;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a stock in the active universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockRef {
    pub id: Uuid,
    pub symbol: String,
}
