use serde::{Deserialize, Serialize};
use valuation_core::{
    FinancialSnapshot, InfeasibleScenario, Scenario, ScenarioOutcome, ScenarioResult,
    ValuationError, ValuationParameters,
};

use crate::engine::DcfEngine;

/// Shifts applied to the base case to build Bear and Bull scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOffsets {
    /// Subtracted for Bear, added for Bull
    pub growth_rate: f64,
    /// Added for Bear, subtracted for Bull
    pub wacc: f64,
    /// Gap kept below WACC when terminal growth has to be clamped
    pub terminal_clamp_margin: f64,
}

impl ScenarioOffsets {
    pub fn validate(&self) -> Result<(), ValuationError> {
        let fields = [
            ("growth_rate", self.growth_rate),
            ("wacc", self.wacc),
            ("terminal_clamp_margin", self.terminal_clamp_margin),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ValuationError::InvalidParameters(format!(
                    "scenario offset {} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.terminal_clamp_margin == 0.0 {
            return Err(ValuationError::InvalidParameters(
                "terminal_clamp_margin must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ScenarioOffsets {
    fn default() -> Self {
        Self {
            growth_rate: 0.02,
            wacc: 0.01,
            terminal_clamp_margin: 0.001,
        }
    }
}

/// Bear / Base / Bull valuation runs around a base case.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioModeler {
    engine: DcfEngine,
    offsets: ScenarioOffsets,
}

impl ScenarioModeler {
    pub fn new(engine: DcfEngine) -> Self {
        Self {
            engine,
            offsets: ScenarioOffsets::default(),
        }
    }

    pub fn with_offsets(mut self, offsets: ScenarioOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn offsets(&self) -> &ScenarioOffsets {
        &self.offsets
    }

    /// Parameters for `scenario`, and whether terminal growth had to be clamped.
    pub fn scenario_parameters(
        &self,
        base: &ValuationParameters,
        scenario: Scenario,
    ) -> (ValuationParameters, bool) {
        let (growth_shift, wacc_shift) = match scenario {
            Scenario::Bear => (-self.offsets.growth_rate, self.offsets.wacc),
            Scenario::Base => (0.0, 0.0),
            Scenario::Bull => (self.offsets.growth_rate, -self.offsets.wacc),
        };
        let wacc = base.wacc + wacc_shift;

        // Never wider than the base spread, or a clamped Bull could fall below Base
        let (terminal_growth_rate, clamped) = if base.terminal_growth_rate >= wacc {
            let spread = self
                .offsets
                .terminal_clamp_margin
                .min(base.wacc - base.terminal_growth_rate);
            (wacc - spread, true)
        } else {
            (base.terminal_growth_rate, false)
        };

        let params = ValuationParameters {
            growth_rate: base.growth_rate + growth_shift,
            wacc,
            terminal_growth_rate,
            projection_years: base.projection_years,
        };
        (params, clamped)
    }

    /// Value every scenario independently.
    ///
    /// An invalid base case or offsets fail the call. A derived scenario that
    /// still violates the parameter invariants after clamping is reported in
    /// `infeasible` and the remaining scenarios are returned.
    pub fn model(
        &self,
        snapshot: &FinancialSnapshot,
        base: &ValuationParameters,
    ) -> Result<ScenarioResult, ValuationError> {
        base.validate()?;
        self.offsets.validate()?;
        if !(snapshot.current_price.is_finite() && snapshot.current_price > 0.0) {
            return Err(ValuationError::InvalidFinancialData(format!(
                "{} current_price must be positive for upside calculation",
                snapshot.ticker
            )));
        }

        let mut outcomes = Vec::with_capacity(Scenario::ALL.len());
        let mut infeasible = Vec::new();

        for scenario in Scenario::ALL {
            let (parameters, terminal_growth_clamped) = self.scenario_parameters(base, scenario);
            if terminal_growth_clamped {
                tracing::debug!(
                    "{} {} case: terminal growth clamped to {:.4}",
                    snapshot.ticker,
                    scenario,
                    parameters.terminal_growth_rate
                );
            }

            match self.engine.calculate(snapshot, &parameters) {
                Ok(valuation) => {
                    let upside = (valuation.per_share_value - snapshot.current_price)
                        / snapshot.current_price;
                    outcomes.push(ScenarioOutcome {
                        scenario,
                        parameters,
                        valuation,
                        upside,
                        terminal_growth_clamped,
                    });
                }
                Err(ValuationError::InvalidParameters(reason)) => {
                    tracing::warn!("{} {} case is infeasible: {}", snapshot.ticker, scenario, reason);
                    infeasible.push(InfeasibleScenario {
                        scenario,
                        parameters,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ScenarioResult {
            ticker: snapshot.ticker.clone(),
            current_price: snapshot.current_price,
            outcomes,
            infeasible,
        })
    }
}
