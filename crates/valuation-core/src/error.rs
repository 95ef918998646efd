use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// One or more required fields were absent from the provider payload.
    #[error("Data validation failed, missing: {}", fields.join(", "))]
    DataValidation { fields: Vec<String> },

    #[error("Invalid financial data: {0}")]
    InvalidFinancialData(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Ticker not found: {0}")]
    TickerNotFound(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
}

impl ValuationError {
    pub fn missing(field: &str) -> Self {
        ValuationError::DataValidation {
            fields: vec![field.to_string()],
        }
    }

    /// True for errors caused by the caller's input rather than the data provider.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ValuationError::DataValidation { .. }
                | ValuationError::InvalidFinancialData(_)
                | ValuationError::InvalidParameters(_)
        )
    }
}
