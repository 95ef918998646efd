use serde::{Deserialize, Serialize};
use valuation_core::{
    FinancialSnapshot, Industry, ValuationError, ValuationParameters, DEFAULT_PROJECTION_YEARS,
};

use crate::industry::IndustryAssumptions;

/// Bounds applied to growth estimated from history. Explicit overrides are not clamped.
pub const MIN_ESTIMATED_GROWTH: f64 = 0.01;
pub const MAX_ESTIMATED_GROWTH: f64 = 0.20;

/// Number of recent year-over-year revenue changes averaged when cash flows can't be used.
const REVENUE_GROWTH_PERIODS: usize = 3;

/// Caller-supplied parameters. Anything left `None` comes from history or the industry table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverrides {
    pub growth_rate: Option<f64>,
    pub wacc: Option<f64>,
    pub terminal_growth_rate: Option<f64>,
    pub projection_years: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthSource {
    Override,
    CashFlowCagr,
    RevenueGrowth,
    IndustryDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedParameters {
    pub parameters: ValuationParameters,
    pub growth_source: GrowthSource,
    pub industry: Industry,
}

impl ParameterOverrides {
    pub fn resolve(&self, snapshot: &FinancialSnapshot) -> Result<ValuationParameters, ValuationError> {
        self.resolve_detailed(snapshot).map(|r| r.parameters)
    }

    /// Resolve and report where the growth rate came from.
    pub fn resolve_detailed(
        &self,
        snapshot: &FinancialSnapshot,
    ) -> Result<ResolvedParameters, ValuationError> {
        let profile = IndustryAssumptions::profile(snapshot.industry);

        let (growth_rate, growth_source) = match self.growth_rate {
            Some(g) => (g, GrowthSource::Override),
            None => estimate_growth_rate(snapshot)
                .unwrap_or((profile.growth_rate, GrowthSource::IndustryDefault)),
        };

        let parameters = ValuationParameters {
            growth_rate,
            wacc: self.wacc.unwrap_or(profile.wacc),
            terminal_growth_rate: self
                .terminal_growth_rate
                .unwrap_or(profile.terminal_growth_rate),
            projection_years: self.projection_years.unwrap_or(DEFAULT_PROJECTION_YEARS),
        };
        parameters.validate()?;

        Ok(ResolvedParameters {
            parameters,
            growth_source,
            industry: snapshot.industry,
        })
    }
}

/// Growth implied by the snapshot's history, clamped to the estimation bounds.
///
/// A full history uses the trailing free cash flow CAGR, falling back to the
/// average of recent revenue growth when the CAGR is undefined (non-positive
/// endpoints). A degraded history only supports single-year revenue growth.
pub fn estimate_growth_rate(snapshot: &FinancialSnapshot) -> Option<(f64, GrowthSource)> {
    let estimate = if snapshot.degraded {
        single_year_growth(&snapshot.revenues).map(|g| (g, GrowthSource::RevenueGrowth))
    } else {
        cagr(&snapshot.free_cash_flows)
            .map(|g| (g, GrowthSource::CashFlowCagr))
            .or_else(|| {
                average_growth(&snapshot.revenues, REVENUE_GROWTH_PERIODS)
                    .map(|g| (g, GrowthSource::RevenueGrowth))
            })
    };

    estimate
        .filter(|(g, _)| g.is_finite())
        .map(|(g, source)| (g.clamp(MIN_ESTIMATED_GROWTH, MAX_ESTIMATED_GROWTH), source))
}

fn cagr(series: &[f64]) -> Option<f64> {
    let (first, last) = (*series.first()?, *series.last()?);
    let periods = series.len().checked_sub(1).filter(|&p| p > 0)?;
    if first <= 0.0 || last <= 0.0 {
        return None;
    }
    Some((last / first).powf(1.0 / periods as f64) - 1.0)
}

fn single_year_growth(series: &[f64]) -> Option<f64> {
    match series {
        [.., prev, last] if *prev > 0.0 => Some(last / prev - 1.0),
        _ => None,
    }
}

fn average_growth(series: &[f64], periods: usize) -> Option<f64> {
    let changes: Vec<f64> = series
        .windows(2)
        .rev()
        .take(periods)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if changes.is_empty() {
        None
    } else {
        Some(changes.iter().sum::<f64>() / changes.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use valuation_core::FreeCashFlowSource;

    fn snapshot(fcf: Vec<f64>, revenues: Vec<f64>, industry: Industry) -> FinancialSnapshot {
        FinancialSnapshot {
            ticker: "TEST".to_string(),
            current_price: 10.0,
            shares_outstanding: 100,
            industry,
            industry_label: None,
            degraded: fcf.len() < 2,
            free_cash_flows: fcf,
            fcf_source: FreeCashFlowSource::Reported,
            revenues,
            cash: Some(0.0),
            total_debt: Some(0.0),
            caveats: vec![],
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let snap = snapshot(vec![100.0, 121.0], vec![], Industry::Technology);
        let overrides = ParameterOverrides {
            growth_rate: Some(0.03),
            wacc: Some(0.07),
            terminal_growth_rate: Some(0.01),
            projection_years: Some(8),
        };
        let resolved = overrides.resolve_detailed(&snap).unwrap();
        assert_eq!(resolved.growth_source, GrowthSource::Override);
        assert_eq!(
            resolved.parameters,
            ValuationParameters {
                growth_rate: 0.03,
                wacc: 0.07,
                terminal_growth_rate: 0.01,
                projection_years: 8,
            }
        );
    }

    #[test]
    fn test_defaults_come_from_industry_table() {
        let snap = snapshot(vec![100.0, 90.0, -5.0], vec![], Industry::Utilities);
        let resolved = ParameterOverrides::default().resolve_detailed(&snap).unwrap();
        let profile = IndustryAssumptions::profile(Industry::Utilities);
        assert_eq!(resolved.growth_source, GrowthSource::IndustryDefault);
        assert_eq!(resolved.parameters.growth_rate, profile.growth_rate);
        assert_eq!(resolved.parameters.wacc, profile.wacc);
        assert_eq!(resolved.parameters.terminal_growth_rate, profile.terminal_growth_rate);
        assert_eq!(resolved.parameters.projection_years, DEFAULT_PROJECTION_YEARS);
    }

    #[test]
    fn test_growth_uses_trailing_cagr() {
        let snap = snapshot(vec![100.0, 110.0, 121.0], vec![], Industry::Default);
        let (g, source) = estimate_growth_rate(&snap).unwrap();
        assert_eq!(source, GrowthSource::CashFlowCagr);
        assert_relative_eq!(g, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_estimated_growth_is_clamped() {
        let fast = snapshot(vec![100.0, 400.0], vec![], Industry::Default);
        assert_eq!(estimate_growth_rate(&fast).unwrap().0, MAX_ESTIMATED_GROWTH);

        let shrinking = snapshot(vec![100.0, 50.0], vec![], Industry::Default);
        assert_eq!(estimate_growth_rate(&shrinking).unwrap().0, MIN_ESTIMATED_GROWTH);
    }

    #[test]
    fn test_degraded_snapshot_uses_single_year_revenue_growth() {
        let snap = snapshot(vec![50.0], vec![80.0, 100.0, 106.0], Industry::Default);
        let (g, source) = estimate_growth_rate(&snap).unwrap();
        assert_eq!(source, GrowthSource::RevenueGrowth);
        assert_relative_eq!(g, 0.06, epsilon = 1e-9);
    }

    #[test]
    fn test_degraded_snapshot_without_revenue_has_no_estimate() {
        let snap = snapshot(vec![50.0], vec![], Industry::Default);
        assert!(estimate_growth_rate(&snap).is_none());
    }

    #[test]
    fn test_negative_cash_flow_endpoint_falls_back_to_revenue_average() {
        let snap = snapshot(
            vec![-10.0, 20.0],
            vec![100.0, 104.0, 110.24, 115.752],
            Industry::Default,
        );
        let (g, source) = estimate_growth_rate(&snap).unwrap();
        assert_eq!(source, GrowthSource::RevenueGrowth);
        assert_relative_eq!(g, (0.04 + 0.06 + 0.05) / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_override_combination_is_rejected() {
        let snap = snapshot(vec![100.0, 110.0], vec![], Industry::Technology);
        let overrides = ParameterOverrides {
            wacc: Some(0.02),
            ..Default::default()
        };
        assert!(matches!(
            overrides.resolve(&snap),
            Err(ValuationError::InvalidParameters(_))
        ));
    }
}
