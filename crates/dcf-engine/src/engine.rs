use valuation_core::{
    Caveat, Confidence, FinancialSnapshot, ProjectedCashFlow, ValuationError, ValuationParameters,
    ValuationResult,
};

/// Perpetuity-growth DCF calculator.
///
/// Stateless: every call is a pure function of the snapshot and parameters,
/// so one engine can be shared freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcfEngine;

impl DcfEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(
        &self,
        snapshot: &FinancialSnapshot,
        params: &ValuationParameters,
    ) -> Result<ValuationResult, ValuationError> {
        params.validate()?;

        let base_fcf = snapshot.latest_free_cash_flow().ok_or_else(|| {
            ValuationError::InvalidFinancialData(format!(
                "{} has no free cash flow history",
                snapshot.ticker
            ))
        })?;
        if snapshot.shares_outstanding == 0 {
            return Err(ValuationError::InvalidFinancialData(format!(
                "{} has zero shares outstanding",
                snapshot.ticker
            )));
        }

        let projections = project_cash_flows(base_fcf, params);
        let projection_present_value: f64 = projections.iter().map(|p| p.present_value).sum();

        // validate() bounds the window to at least three years
        let final_year = projections.last().ok_or_else(|| {
            ValuationError::InvalidParameters("projection window is empty".to_string())
        })?;
        let terminal_value = terminal_value(final_year.free_cash_flow, params)?;
        let discounted_terminal_value = terminal_value * final_year.discount_factor;

        let enterprise_value = projection_present_value + discounted_terminal_value;
        let cash = snapshot.cash.unwrap_or(0.0);
        let debt = snapshot.total_debt.unwrap_or(0.0);
        let equity_value = enterprise_value + cash - debt;
        let per_share_value = equity_value / snapshot.shares_outstanding as f64;

        let mut caveats = snapshot.caveats.clone();
        if base_fcf <= 0.0 {
            caveats.push(Caveat::NonPositiveBaseCashFlow { value: base_fcf });
        }
        let confidence = if snapshot.degraded {
            Confidence::Reduced
        } else {
            Confidence::Standard
        };

        tracing::debug!(
            "DCF {}: g={:.4} wacc={:.4} tg={:.4} n={} -> EV {:.2}, {:.4}/share",
            snapshot.ticker,
            params.growth_rate,
            params.wacc,
            params.terminal_growth_rate,
            params.projection_years,
            enterprise_value,
            per_share_value
        );

        Ok(ValuationResult {
            ticker: snapshot.ticker.clone(),
            base_free_cash_flow: base_fcf,
            projections,
            projection_present_value,
            terminal_value,
            discounted_terminal_value,
            enterprise_value,
            cash,
            debt,
            equity_value,
            per_share_value,
            parameters: *params,
            confidence,
            caveats,
        })
    }
}

/// Compound `base_fcf` at the growth rate and discount each year at WACC.
///
/// Growth is constant across the whole window; there is no fade toward the
/// terminal rate.
pub fn project_cash_flows(base_fcf: f64, params: &ValuationParameters) -> Vec<ProjectedCashFlow> {
    (1..=params.projection_years)
        .map(|year| {
            let exponent = year as i32;
            let free_cash_flow = base_fcf * (1.0 + params.growth_rate).powi(exponent);
            let discount_factor = 1.0 / (1.0 + params.wacc).powi(exponent);
            ProjectedCashFlow {
                year,
                free_cash_flow,
                discount_factor,
                present_value: free_cash_flow * discount_factor,
            }
        })
        .collect()
}

/// Gordon growth terminal value at the end of the projection window (undiscounted).
pub fn terminal_value(final_fcf: f64, params: &ValuationParameters) -> Result<f64, ValuationError> {
    let denominator = params.wacc - params.terminal_growth_rate;
    if denominator <= 0.0 {
        return Err(ValuationError::InvalidParameters(format!(
            "wacc ({}) must exceed terminal_growth_rate ({})",
            params.wacc, params.terminal_growth_rate
        )));
    }
    Ok(final_fcf * (1.0 + params.terminal_growth_rate) / denominator)
}
