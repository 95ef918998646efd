use async_trait::async_trait;
use crate::{RawFinancialData, ValuationError};

/// Source of raw per-ticker financial statements.
///
/// Implementations fail with `TickerNotFound` when the symbol is unknown and
/// `DataUnavailable` for transport or upstream failures. The valuation engine
/// never calls a provider directly; it consumes the normalized snapshot.
#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<RawFinancialData, ValuationError>;
}
