use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Caveat, ValuationParameters};

/// Whether the valuation rests on a full cash flow history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Standard,
    /// Snapshot had fewer than two years of cash flow history
    Reduced,
}

/// One year of the explicit projection window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCashFlow {
    pub year: u32,
    pub free_cash_flow: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

/// Output of a single DCF run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub base_free_cash_flow: f64,
    pub projections: Vec<ProjectedCashFlow>,
    /// Sum of discounted cash flows over the projection window
    pub projection_present_value: f64,
    pub terminal_value: f64,
    pub discounted_terminal_value: f64,
    pub enterprise_value: f64,
    pub cash: f64,
    pub debt: f64,
    pub equity_value: f64,
    pub per_share_value: f64,
    pub parameters: ValuationParameters,
    pub confidence: Confidence,
    pub caveats: Vec<Caveat>,
}

impl ValuationResult {
    /// Fractional upside of intrinsic value over `price` (negative = downside).
    pub fn upside(&self, price: f64) -> Option<f64> {
        if price > 0.0 {
            Some((self.per_share_value - price) / price)
        } else {
            None
        }
    }

    /// Share of enterprise value contributed by the discounted terminal value.
    pub fn terminal_value_weight(&self) -> Option<f64> {
        if self.enterprise_value != 0.0 {
            Some(self.discounted_terminal_value / self.enterprise_value)
        } else {
            None
        }
    }
}

/// Valuation input perturbed by sensitivity analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDriver {
    GrowthRate,
    Wacc,
    TerminalGrowthRate,
}

impl ValueDriver {
    pub fn name(&self) -> &'static str {
        match self {
            ValueDriver::GrowthRate => "growth_rate",
            ValueDriver::Wacc => "wacc",
            ValueDriver::TerminalGrowthRate => "terminal_growth_rate",
        }
    }

    pub fn value_of(&self, params: &ValuationParameters) -> f64 {
        match self {
            ValueDriver::GrowthRate => params.growth_rate,
            ValueDriver::Wacc => params.wacc,
            ValueDriver::TerminalGrowthRate => params.terminal_growth_rate,
        }
    }

    /// Copy of `params` with this driver shifted by `delta`.
    pub fn shift(&self, params: &ValuationParameters, delta: f64) -> ValuationParameters {
        let value = self.value_of(params) + delta;
        match self {
            ValueDriver::GrowthRate => params.with_growth_rate(value),
            ValueDriver::Wacc => params.with_wacc(value),
            ValueDriver::TerminalGrowthRate => params.with_terminal_growth_rate(value),
        }
    }
}

impl fmt::Display for ValueDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub delta: f64,
    pub parameter_value: f64,
    pub per_share_value: f64,
    /// Fractional change from the base per-share value (0.05 = +5%)
    pub pct_change: f64,
}

/// A perturbation that broke the parameter invariants and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfeasiblePoint {
    pub delta: f64,
    pub parameter_value: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSensitivity {
    pub driver: ValueDriver,
    pub base_value: f64,
    pub points: Vec<SensitivityPoint>,
    pub infeasible: Vec<InfeasiblePoint>,
    /// Largest absolute per-share move among the feasible points
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub ticker: String,
    pub base_per_share_value: f64,
    /// Ordered by descending impact
    pub drivers: Vec<DriverSensitivity>,
}

impl SensitivityResult {
    pub fn driver(&self, driver: ValueDriver) -> Option<&DriverSensitivity> {
        self.drivers.iter().find(|d| d.driver == driver)
    }

    pub fn has_infeasible_points(&self) -> bool {
        self.drivers.iter().any(|d| !d.infeasible.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Bear,
    Base,
    Bull,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Bear, Scenario::Base, Scenario::Bull];

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::Bear => "Bear",
            Scenario::Base => "Base",
            Scenario::Bull => "Bull",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub parameters: ValuationParameters,
    pub valuation: ValuationResult,
    /// (per-share value - current price) / current price
    pub upside: f64,
    pub terminal_growth_clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfeasibleScenario {
    pub scenario: Scenario,
    pub parameters: ValuationParameters,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub ticker: String,
    pub current_price: f64,
    /// Bear, Base, Bull order; infeasible scenarios are omitted
    pub outcomes: Vec<ScenarioOutcome>,
    pub infeasible: Vec<InfeasibleScenario>,
}

impl ScenarioResult {
    pub fn outcome(&self, scenario: Scenario) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ValuationParameters {
        ValuationParameters {
            growth_rate: 0.05,
            wacc: 0.10,
            terminal_growth_rate: 0.02,
            projection_years: 5,
        }
    }

    #[test]
    fn test_driver_shift_only_touches_its_parameter() {
        let shifted = ValueDriver::Wacc.shift(&params(), 0.01);
        assert!((shifted.wacc - 0.11).abs() < 1e-12);
        assert_eq!(shifted.growth_rate, 0.05);
        assert_eq!(shifted.terminal_growth_rate, 0.02);

        let shifted = ValueDriver::TerminalGrowthRate.shift(&params(), -0.01);
        assert!((shifted.terminal_growth_rate - 0.01).abs() < 1e-12);
        assert_eq!(shifted.wacc, 0.10);
    }

    #[test]
    fn test_driver_names_match_serde() {
        for driver in [ValueDriver::GrowthRate, ValueDriver::Wacc, ValueDriver::TerminalGrowthRate] {
            let json = serde_json::to_value(driver).unwrap();
            assert_eq!(json, driver.name());
        }
    }
}
