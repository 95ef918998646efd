use valuation_core::{
    Caveat, FinancialSnapshot, FreeCashFlowSource, Industry, RawFinancialData, ValuationError,
};

use crate::cache::SnapshotCache;
use crate::industry::IndustryAssumptions;

/// Fraction of net income used as a free cash flow proxy when no cash flow
/// statement is available.
const NET_INCOME_FCF_RATIO: f64 = 0.8;

/// Turns a provider payload into a validated [`FinancialSnapshot`].
///
/// Required fields (ticker, price, shares, some cash flow history) fail hard.
/// Everything else degrades with an explicit [`Caveat`] on the snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FinancialDataNormalizer;

impl FinancialDataNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawFinancialData) -> Result<FinancialSnapshot, ValuationError> {
        let ticker = raw.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let fcf = derive_free_cash_flows(raw);

        let mut missing = Vec::new();
        if ticker.is_none() {
            missing.push("ticker".to_string());
        }
        if raw.current_price.is_none() {
            missing.push("current_price".to_string());
        }
        if raw.shares_outstanding.is_none() {
            missing.push("shares_outstanding".to_string());
        }
        if fcf.is_none() {
            missing.push("free_cash_flows".to_string());
        }
        let (Some(ticker), Some(price), Some(shares), Some((free_cash_flows, fcf_source))) =
            (ticker, raw.current_price, raw.shares_outstanding, fcf)
        else {
            return Err(ValuationError::DataValidation { fields: missing });
        };

        let ticker = normalize_ticker(ticker)?;

        if !price.is_finite() || price <= 0.0 {
            return Err(ValuationError::InvalidFinancialData(format!(
                "current_price must be positive, got {}",
                price
            )));
        }
        if !shares.is_finite() || shares <= 0.0 {
            return Err(ValuationError::InvalidFinancialData(format!(
                "shares_outstanding must be positive, got {}",
                shares
            )));
        }
        if shares.round() > u64::MAX as f64 {
            return Err(ValuationError::InvalidFinancialData(format!(
                "shares_outstanding {} is out of range",
                shares
            )));
        }
        let shares_outstanding = shares.round() as u64;
        if shares_outstanding == 0 {
            return Err(ValuationError::InvalidFinancialData(format!(
                "shares_outstanding {} rounds to zero",
                shares
            )));
        }

        if let Some(bad) = free_cash_flows.iter().find(|v| !v.is_finite()) {
            return Err(ValuationError::InvalidFinancialData(format!(
                "free cash flow history contains a non-finite value ({})",
                bad
            )));
        }

        let mut caveats = Vec::new();
        if fcf_source != FreeCashFlowSource::Reported {
            caveats.push(Caveat::DerivedFreeCashFlow { source: fcf_source });
        }

        let degraded = free_cash_flows.len() < 2;
        if degraded {
            tracing::warn!(
                "{}: only {} year(s) of free cash flow history, valuation confidence reduced",
                ticker,
                free_cash_flows.len()
            );
            caveats.push(Caveat::ShortCashFlowHistory {
                years: free_cash_flows.len(),
            });
        }

        let cash = non_negative("cash", raw.cash)?;
        if cash.is_none() {
            caveats.push(Caveat::MissingCash);
        }
        let total_debt = non_negative("total_debt", raw.total_debt)?;
        if total_debt.is_none() {
            caveats.push(Caveat::MissingDebt);
        }

        let industry_label = raw
            .sector
            .as_deref()
            .or(raw.industry.as_deref())
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        let industry = match classify(raw) {
            Some(industry) => industry,
            None => {
                caveats.push(Caveat::UnmatchedIndustry {
                    label: industry_label.clone(),
                });
                Industry::Default
            }
        };

        let revenues = raw.revenues.iter().copied().filter(|r| r.is_finite()).collect();

        tracing::debug!(
            "Normalized {} ({}): {} year(s) of FCF from {:?}, {} caveat(s)",
            ticker,
            industry,
            free_cash_flows.len(),
            fcf_source,
            caveats.len()
        );

        Ok(FinancialSnapshot {
            ticker,
            current_price: price,
            shares_outstanding,
            industry,
            industry_label,
            free_cash_flows,
            fcf_source,
            revenues,
            cash,
            total_debt,
            degraded,
            caveats,
        })
    }

    /// Normalize and store the snapshot in `cache`.
    pub fn normalize_into(
        &self,
        raw: &RawFinancialData,
        cache: &SnapshotCache,
    ) -> Result<FinancialSnapshot, ValuationError> {
        let snapshot = self.normalize(raw)?;
        cache.insert(snapshot.clone());
        Ok(snapshot)
    }
}

impl Default for FinancialDataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_ticker(ticker: &str) -> Result<String, ValuationError> {
    let valid_chars = ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let has_alphanumeric = ticker.chars().any(|c| c.is_ascii_alphanumeric());
    if !valid_chars || !has_alphanumeric {
        return Err(ValuationError::InvalidFinancialData(format!(
            "ticker '{}' must be alphanumeric",
            ticker
        )));
    }
    Ok(ticker.to_uppercase())
}

fn non_negative(field: &str, value: Option<f64>) -> Result<Option<f64>, ValuationError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValuationError::InvalidFinancialData(format!(
            "{} must be a non-negative number, got {}",
            field, v
        ))),
        other => Ok(other),
    }
}

/// Sector first, then industry; providers put the broad classification in sector.
fn classify(raw: &RawFinancialData) -> Option<Industry> {
    raw.sector
        .as_deref()
        .and_then(IndustryAssumptions::classify)
        .or_else(|| raw.industry.as_deref().and_then(IndustryAssumptions::classify))
}

/// Pick the best available free cash flow history, oldest first.
fn derive_free_cash_flows(raw: &RawFinancialData) -> Option<(Vec<f64>, FreeCashFlowSource)> {
    if !raw.free_cash_flows.is_empty() {
        return Some((raw.free_cash_flows.clone(), FreeCashFlowSource::Reported));
    }

    // Align the two series on their most recent end. Capex sign conventions
    // differ between providers, so it is always subtracted as an outflow.
    let paired = raw.operating_cash_flows.len().min(raw.capital_expenditures.len());
    if paired > 0 {
        let ocf = &raw.operating_cash_flows[raw.operating_cash_flows.len() - paired..];
        let capex = &raw.capital_expenditures[raw.capital_expenditures.len() - paired..];
        let fcf = ocf.iter().zip(capex).map(|(o, c)| o - c.abs()).collect();
        return Some((fcf, FreeCashFlowSource::OperatingLessCapex));
    }

    if !raw.net_incomes.is_empty() {
        let fcf = raw.net_incomes.iter().map(|n| n * NET_INCOME_FCF_RATIO).collect();
        return Some((fcf, FreeCashFlowSource::NetIncomeProxy));
    }

    None
}
