use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ValuationError;

pub const MIN_PROJECTION_YEARS: u32 = 3;
pub const MAX_PROJECTION_YEARS: u32 = 10;
pub const DEFAULT_PROJECTION_YEARS: u32 = 5;

/// Financial statement payload as returned by a data provider.
///
/// Every field is optional: the normalizer decides what is required.
/// Histories are ordered oldest first. Capital expenditures are reported as
/// negative numbers (cash outflows), matching provider conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFinancialData {
    pub ticker: Option<String>,
    pub current_price: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub free_cash_flows: Vec<f64>,
    pub operating_cash_flows: Vec<f64>,
    pub capital_expenditures: Vec<f64>,
    pub net_incomes: Vec<f64>,
    pub revenues: Vec<f64>,
    pub cash: Option<f64>,
    pub total_debt: Option<f64>,
}

/// Industry classification used to pick default assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Technology,
    Healthcare,
    FinancialServices,
    Utilities,
    ConsumerStaples,
    ConsumerDiscretionary,
    Energy,
    Industrials,
    RealEstate,
    CommunicationServices,
    BasicMaterials,
    Default,
}

impl Industry {
    pub const ALL: [Industry; 12] = [
        Industry::Technology,
        Industry::Healthcare,
        Industry::FinancialServices,
        Industry::Utilities,
        Industry::ConsumerStaples,
        Industry::ConsumerDiscretionary,
        Industry::Energy,
        Industry::Industrials,
        Industry::RealEstate,
        Industry::CommunicationServices,
        Industry::BasicMaterials,
        Industry::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Industry::Technology => "Technology",
            Industry::Healthcare => "Healthcare",
            Industry::FinancialServices => "Financial Services",
            Industry::Utilities => "Utilities",
            Industry::ConsumerStaples => "Consumer Staples",
            Industry::ConsumerDiscretionary => "Consumer Discretionary",
            Industry::Energy => "Energy",
            Industry::Industrials => "Industrials",
            Industry::RealEstate => "Real Estate",
            Industry::CommunicationServices => "Communication Services",
            Industry::BasicMaterials => "Basic Materials",
            Industry::Default => "Default",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How the free cash flow history on a snapshot was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeCashFlowSource {
    /// Reported free cash flow.
    Reported,
    /// Operating cash flow plus (negative) capital expenditure.
    OperatingLessCapex,
    /// 80% of net income, used when no cash flow statement is available.
    NetIncomeProxy,
}

/// Data-quality flag carried from normalization into every valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caveat {
    MissingCash,
    MissingDebt,
    ShortCashFlowHistory { years: usize },
    DerivedFreeCashFlow { source: FreeCashFlowSource },
    UnmatchedIndustry { label: Option<String> },
    NonPositiveBaseCashFlow { value: f64 },
}

/// Validated financial data for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub ticker: String,
    pub current_price: f64,
    pub shares_outstanding: u64,
    pub industry: Industry,
    /// Label as reported by the provider, before classification
    pub industry_label: Option<String>,
    /// Oldest first; never empty
    pub free_cash_flows: Vec<f64>,
    pub fcf_source: FreeCashFlowSource,
    /// Oldest first; may be empty
    pub revenues: Vec<f64>,
    pub cash: Option<f64>,
    pub total_debt: Option<f64>,
    /// Fewer than two years of cash flow history were available
    pub degraded: bool,
    pub caveats: Vec<Caveat>,
}

impl FinancialSnapshot {
    /// Most recent free cash flow.
    pub fn latest_free_cash_flow(&self) -> Option<f64> {
        self.free_cash_flows.last().copied()
    }

    pub fn has_caveat(&self, caveat: &Caveat) -> bool {
        self.caveats.contains(caveat)
    }
}

/// Inputs to a single DCF run. Rates are fractional (0.08 = 8%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationParameters {
    pub growth_rate: f64,
    pub wacc: f64,
    pub terminal_growth_rate: f64,
    pub projection_years: u32,
}

impl ValuationParameters {
    pub fn new(
        growth_rate: f64,
        wacc: f64,
        terminal_growth_rate: f64,
        projection_years: u32,
    ) -> Result<Self, ValuationError> {
        let params = Self {
            growth_rate,
            wacc,
            terminal_growth_rate,
            projection_years,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ValuationError> {
        let rates = [
            ("growth_rate", self.growth_rate),
            ("wacc", self.wacc),
            ("terminal_growth_rate", self.terminal_growth_rate),
        ];
        for (name, value) in rates {
            if !value.is_finite() {
                return Err(ValuationError::InvalidParameters(format!(
                    "{} must be a finite number",
                    name
                )));
            }
        }
        if self.growth_rate <= -1.0 {
            return Err(ValuationError::InvalidParameters(format!(
                "growth_rate {} must be greater than -1",
                self.growth_rate
            )));
        }
        if self.wacc <= -1.0 {
            return Err(ValuationError::InvalidParameters(format!(
                "wacc {} must be greater than -1",
                self.wacc
            )));
        }
        if self.wacc <= self.terminal_growth_rate {
            return Err(ValuationError::InvalidParameters(format!(
                "wacc ({}) must exceed terminal_growth_rate ({})",
                self.wacc, self.terminal_growth_rate
            )));
        }
        if !(MIN_PROJECTION_YEARS..=MAX_PROJECTION_YEARS).contains(&self.projection_years) {
            return Err(ValuationError::InvalidParameters(format!(
                "projection_years {} outside [{}, {}]",
                self.projection_years, MIN_PROJECTION_YEARS, MAX_PROJECTION_YEARS
            )));
        }
        Ok(())
    }

    pub fn with_growth_rate(self, growth_rate: f64) -> Self {
        Self { growth_rate, ..self }
    }

    pub fn with_wacc(self, wacc: f64) -> Self {
        Self { wacc, ..self }
    }

    pub fn with_terminal_growth_rate(self, terminal_growth_rate: f64) -> Self {
        Self {
            terminal_growth_rate,
            ..self
        }
    }
}
