use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use valuation_core::{FinancialDataProvider, RawFinancialData, ValuationError};

use crate::rate_limit::RateLimiter;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const MODULES: &str = "price,summaryProfile,financialData,defaultKeyStatistics,cashflowStatementHistory,incomeStatementHistory";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const DEFAULT_RATE_LIMIT: usize = 60;
const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_WAIT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YahooConfig {
    pub base_url: String,
    /// Requests allowed per `rate_window`
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub timeout: Duration,
}

impl YahooConfig {
    /// Reads `YAHOO_RATE_LIMIT`, `YAHOO_RATE_WINDOW_SECS` and `YAHOO_TIMEOUT_SECS`,
    /// falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            rate_limit: env_or("YAHOO_RATE_LIMIT", DEFAULT_RATE_LIMIT),
            rate_window: Duration::from_secs(env_or("YAHOO_RATE_WINDOW_SECS", DEFAULT_RATE_WINDOW_SECS)),
            timeout: Duration::from_secs(env_or("YAHOO_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            ..Self::default()
        }
    }
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Fundamentals from Yahoo Finance's quoteSummary endpoint.
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self::with_config(YahooConfig::from_env())
    }

    pub fn with_config(config: YahooConfig) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url,
            rate_limiter: RateLimiter::new(config.rate_limit, config.rate_window),
        }
    }

    /// Send with rate limiting and retry on 429.
    async fn send_request(&self, url: &str) -> Result<reqwest::Response, ValuationError> {
        for attempt in 1..=MAX_ATTEMPTS {
            self.rate_limiter.acquire().await;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ValuationError::DataUnavailable(e.to_string()))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            tracing::warn!(
                "Yahoo Finance 429 rate limited, waiting {}s before retry {}/{}",
                RETRY_WAIT_SECS,
                attempt,
                MAX_ATTEMPTS
            );
            tokio::time::sleep(Duration::from_secs(RETRY_WAIT_SECS)).await;
        }

        Err(ValuationError::DataUnavailable(format!(
            "rate limited by Yahoo Finance after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Fetch and parse the quoteSummary payload for `ticker`.
    pub async fn get_financials(&self, ticker: &str) -> Result<RawFinancialData, ValuationError> {
        let symbol = ticker.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ValuationError::missing("ticker"));
        }
        let url = format!("{}/{}?modules={}", self.base_url, symbol, MODULES);

        let response = self.send_request(&url).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ValuationError::TickerNotFound(symbol));
        }
        if !status.is_success() {
            return Err(ValuationError::DataUnavailable(format!(
                "Yahoo Finance returned {} for {}",
                status, symbol
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ValuationError::DataUnavailable(e.to_string()))?;

        parse_quote_summary(&symbol, &json)
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FinancialDataProvider for YahooFinanceClient {
    async fn fetch(&self, ticker: &str) -> Result<RawFinancialData, ValuationError> {
        tracing::debug!("Fetching {} from Yahoo Finance", ticker);
        self.get_financials(ticker).await
    }
}

/// Map a quoteSummary response onto the provider-neutral raw record.
///
/// Statement histories arrive most recent first and are returned oldest first.
/// Fields Yahoo omits stay empty and are left for the normalizer to judge.
pub fn parse_quote_summary(ticker: &str, json: &Value) -> Result<RawFinancialData, ValuationError> {
    let summary = json
        .get("quoteSummary")
        .ok_or_else(|| ValuationError::DataUnavailable("missing quoteSummary".to_string()))?;

    let result = summary
        .get("result")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first());
    let Some(result) = result else {
        let description = summary
            .get("error")
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
            .unwrap_or("no quoteSummary result");
        tracing::debug!("{}: {}", ticker, description);
        return Err(ValuationError::TickerNotFound(ticker.to_string()));
    };

    let price = result.get("price");
    let profile = result.get("summaryProfile");
    let financial = result.get("financialData");
    let stats = result.get("defaultKeyStatistics");

    let cash_flows = statements(result, "cashflowStatementHistory", "cashflowStatements");
    let mut paired = recent_run(
        &cash_flows,
        &["totalCashFromOperatingActivities", "capitalExpenditures"],
    )
    .into_iter();
    let operating_cash_flows = paired.next().unwrap_or_default();
    let capital_expenditures = paired.next().unwrap_or_default();
    let income = statements(result, "incomeStatementHistory", "incomeStatementHistory");

    let symbol = price
        .and_then(|p| p.get("symbol"))
        .and_then(|s| s.as_str())
        .unwrap_or(ticker);

    let current_price = financial
        .and_then(|f| raw_f64(f, "currentPrice"))
        .or_else(|| price.and_then(|p| raw_f64(p, "regularMarketPrice")));

    let shares_outstanding = stats
        .and_then(|s| raw_f64(s, "sharesOutstanding"))
        .or_else(|| stats.and_then(|s| raw_f64(s, "impliedSharesOutstanding")));

    Ok(RawFinancialData {
        ticker: Some(symbol.to_string()),
        current_price,
        shares_outstanding,
        sector: profile.and_then(|p| text(p, "sector")),
        industry: profile.and_then(|p| text(p, "industry")),
        free_cash_flows: series(&cash_flows, "freeCashFlow"),
        operating_cash_flows,
        capital_expenditures,
        net_incomes: series(&income, "netIncome"),
        revenues: series(&income, "totalRevenue"),
        cash: financial.and_then(|f| raw_f64(f, "totalCash")),
        total_debt: financial.and_then(|f| raw_f64(f, "totalDebt")),
    })
}

fn statements<'a>(result: &'a Value, module: &str, key: &str) -> Vec<&'a Value> {
    let mut items: Vec<&Value> = result
        .get(module)
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().collect())
        .unwrap_or_default();
    items.reverse();
    items
}

fn series(statements: &[&Value], field: &str) -> Vec<f64> {
    recent_run(statements, &[field])
        .into_iter()
        .next()
        .unwrap_or_default()
}

/// One column per field covering the most recent unbroken run of years that
/// report every field, oldest first. Columns always have equal length.
fn recent_run(statements: &[&Value], fields: &[&str]) -> Vec<Vec<f64>> {
    let mut columns = vec![Vec::new(); fields.len()];
    for statement in statements.iter().rev() {
        let values: Option<Vec<f64>> = fields.iter().map(|f| raw_f64(statement, f)).collect();
        let Some(values) = values else {
            tracing::debug!("Statement history for {:?} stops at a gap year", fields);
            break;
        };
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    for column in &mut columns {
        column.reverse();
    }
    columns
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; plain numbers are accepted too.
fn raw_f64(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    field
        .get("raw")
        .and_then(|v| v.as_f64())
        .or_else(|| field.as_f64())
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
