use serde::Serialize;
use valuation_core::{
    FinancialSnapshot, ScenarioResult, SensitivityResult, ValuationError, ValuationResult,
};

use crate::engine::DcfEngine;
use crate::parameters::{ParameterOverrides, ResolvedParameters};
use crate::scenario::ScenarioModeler;
use crate::sensitivity::{SensitivityAnalyzer, SensitivityDeltas};

/// What to compute on top of the base valuation.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub overrides: ParameterOverrides,
    pub deltas: SensitivityDeltas,
    pub include_sensitivity: bool,
    pub include_scenarios: bool,
}

/// Base valuation plus the optional analyses, as returned to API and CLI callers.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationReport {
    pub snapshot: FinancialSnapshot,
    pub parameters: ResolvedParameters,
    pub valuation: ValuationResult,
    pub upside: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<ScenarioResult>,
}

impl ValuationReport {
    /// Resolve parameters and run the base valuation only.
    pub fn base(
        engine: &DcfEngine,
        snapshot: FinancialSnapshot,
        overrides: &ParameterOverrides,
    ) -> Result<Self, ValuationError> {
        let parameters = overrides.resolve_detailed(&snapshot)?;
        let valuation = engine.calculate(&snapshot, &parameters.parameters)?;
        let upside = valuation.upside(snapshot.current_price);

        tracing::debug!(
            "{} valued at {:.2}/share ({:?} growth {:.4})",
            snapshot.ticker,
            valuation.per_share_value,
            parameters.growth_source,
            parameters.parameters.growth_rate
        );

        Ok(Self {
            snapshot,
            parameters,
            valuation,
            upside,
            sensitivity: None,
            scenarios: None,
        })
    }

    /// Run the base valuation and whichever analyses `options` asks for, sequentially.
    pub fn build(
        engine: &DcfEngine,
        snapshot: FinancialSnapshot,
        options: &ReportOptions,
    ) -> Result<Self, ValuationError> {
        let mut report = Self::base(engine, snapshot, &options.overrides)?;
        let params = report.parameters.parameters;

        if options.include_sensitivity {
            report.sensitivity = Some(SensitivityAnalyzer::new(*engine).analyze(
                &report.snapshot,
                &params,
                &options.deltas,
            )?);
        }
        if options.include_scenarios {
            report.scenarios = Some(ScenarioModeler::new(*engine).model(&report.snapshot, &params)?);
        }
        Ok(report)
    }
}
