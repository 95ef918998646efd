//! Discounted cash flow valuation: normalization of provider data, industry
//! defaults, the core engine and the sensitivity/scenario analyses built on it.

pub mod cache;
pub mod engine;
pub mod industry;
pub mod normalizer;
pub mod parameters;
pub mod report;
pub mod scenario;
pub mod sensitivity;

pub use cache::{CachePolicy, SnapshotCache};
pub use engine::{project_cash_flows, terminal_value, DcfEngine};
pub use industry::{IndustryAssumptions, IndustryProfile, RateRange};
pub use normalizer::FinancialDataNormalizer;
pub use parameters::{estimate_growth_rate, GrowthSource, ParameterOverrides, ResolvedParameters};
pub use report::{ReportOptions, ValuationReport};
pub use scenario::{ScenarioModeler, ScenarioOffsets};
pub use sensitivity::{DriverDelta, SensitivityAnalyzer, SensitivityDeltas};
