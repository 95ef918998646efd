use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use valuation_core::{
    DriverSensitivity, FinancialSnapshot, InfeasiblePoint, SensitivityPoint, SensitivityResult,
    ValuationError, ValuationParameters, ValueDriver,
};

use crate::engine::DcfEngine;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverDelta {
    pub driver: ValueDriver,
    /// Magnitude of the symmetric shift, fractional (0.01 = 1 percentage point)
    pub delta: f64,
}

/// Which drivers to perturb and by how much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityDeltas {
    pub entries: Vec<DriverDelta>,
}

impl SensitivityDeltas {
    pub fn new(entries: Vec<DriverDelta>) -> Self {
        Self { entries }
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.delta.is_finite() || entry.delta <= 0.0 {
                return Err(ValuationError::InvalidParameters(format!(
                    "sensitivity delta for {} must be positive, got {}",
                    entry.driver, entry.delta
                )));
            }
            if self.entries[..i].iter().any(|e| e.driver == entry.driver) {
                return Err(ValuationError::InvalidParameters(format!(
                    "sensitivity driver {} listed more than once",
                    entry.driver
                )));
            }
        }
        Ok(())
    }
}

impl Default for SensitivityDeltas {
    fn default() -> Self {
        Self::new(vec![
            DriverDelta {
                driver: ValueDriver::GrowthRate,
                delta: 0.02,
            },
            DriverDelta {
                driver: ValueDriver::Wacc,
                delta: 0.01,
            },
            DriverDelta {
                driver: ValueDriver::TerminalGrowthRate,
                delta: 0.01,
            },
        ])
    }
}

/// One-at-a-time sensitivity of per-share value to each driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensitivityAnalyzer {
    engine: DcfEngine,
}

impl SensitivityAnalyzer {
    pub fn new(engine: DcfEngine) -> Self {
        Self { engine }
    }

    /// Shift each driver down and up by its delta and revalue.
    ///
    /// The base case must be valid. Perturbed cases that break the parameter
    /// invariants are recorded as infeasible instead of failing the analysis.
    /// Drivers come back sorted by descending impact, ties in configured order.
    pub fn analyze(
        &self,
        snapshot: &FinancialSnapshot,
        base: &ValuationParameters,
        deltas: &SensitivityDeltas,
    ) -> Result<SensitivityResult, ValuationError> {
        deltas.validate()?;
        let base_value = self.engine.calculate(snapshot, base)?.per_share_value;

        // Each driver is independent; par_iter keeps the configured order.
        let mut drivers = deltas
            .entries
            .par_iter()
            .map(|entry| self.analyze_driver(snapshot, base, base_value, entry))
            .collect::<Result<Vec<_>, _>>()?;

        drivers.sort_by(|a, b| b.impact.partial_cmp(&a.impact).unwrap_or(Ordering::Equal));

        Ok(SensitivityResult {
            ticker: snapshot.ticker.clone(),
            base_per_share_value: base_value,
            drivers,
        })
    }

    fn analyze_driver(
        &self,
        snapshot: &FinancialSnapshot,
        base: &ValuationParameters,
        base_value: f64,
        entry: &DriverDelta,
    ) -> Result<DriverSensitivity, ValuationError> {
        let mut points = Vec::with_capacity(2);
        let mut infeasible = Vec::new();

        for delta in [-entry.delta, entry.delta] {
            let params = entry.driver.shift(base, delta);
            let parameter_value = entry.driver.value_of(&params);
            match self.engine.calculate(snapshot, &params) {
                Ok(result) => points.push(SensitivityPoint {
                    delta,
                    parameter_value,
                    per_share_value: result.per_share_value,
                    pct_change: relative_change(result.per_share_value, base_value),
                }),
                Err(ValuationError::InvalidParameters(reason)) => {
                    tracing::warn!(
                        "{}: {} {:+.4} is infeasible: {}",
                        snapshot.ticker,
                        entry.driver,
                        delta,
                        reason
                    );
                    infeasible.push(InfeasiblePoint {
                        delta,
                        parameter_value,
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let impact = points
            .iter()
            .map(|p| (p.per_share_value - base_value).abs())
            .fold(0.0, f64::max);

        Ok(DriverSensitivity {
            driver: entry.driver,
            base_value: entry.driver.value_of(base),
            points,
            infeasible,
            impact,
        })
    }
}

/// Change relative to the base magnitude; zero when the base value is zero.
fn relative_change(value: f64, base: f64) -> f64 {
    if base.abs() > f64::EPSILON {
        (value - base) / base.abs()
    } else {
        0.0
    }
}
