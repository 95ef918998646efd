//! Market data providers feeding the valuation engine.

pub mod rate_limit;
pub mod yahoo_finance;

pub use rate_limit::RateLimiter;
pub use yahoo_finance::{parse_quote_summary, YahooConfig, YahooFinanceClient};
