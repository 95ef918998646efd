//! Default valuation assumptions per industry.
//!
//! Used only when the caller leaves a parameter unset. Each profile carries a
//! point estimate plus the range considered typical for the sector, so callers
//! can show the user what "reasonable" looks like next to their override.

use serde::Serialize;
use valuation_core::Industry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateRange {
    pub low: f64,
    pub high: f64,
}

impl RateRange {
    const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndustryProfile {
    pub industry: Industry,
    pub growth_rate: f64,
    pub wacc: f64,
    pub terminal_growth_rate: f64,
    pub growth_range: RateRange,
    pub wacc_range: RateRange,
    pub terminal_growth_range: RateRange,
}

const fn profile(
    industry: Industry,
    growth: (f64, f64, f64),
    wacc: (f64, f64, f64),
    terminal_growth: (f64, f64, f64),
) -> IndustryProfile {
    IndustryProfile {
        industry,
        growth_rate: growth.0,
        wacc: wacc.0,
        terminal_growth_rate: terminal_growth.0,
        growth_range: RateRange::new(growth.1, growth.2),
        wacc_range: RateRange::new(wacc.1, wacc.2),
        terminal_growth_range: RateRange::new(terminal_growth.1, terminal_growth.2),
    }
}

// Order matches Industry::ALL.
static PROFILES: [IndustryProfile; 12] = [
    profile(Industry::Technology, (0.10, 0.06, 0.15), (0.10, 0.09, 0.12), (0.030, 0.025, 0.035)),
    profile(Industry::Healthcare, (0.07, 0.04, 0.10), (0.085, 0.075, 0.10), (0.025, 0.020, 0.030)),
    profile(Industry::FinancialServices, (0.05, 0.03, 0.07), (0.09, 0.08, 0.11), (0.020, 0.015, 0.025)),
    profile(Industry::Utilities, (0.03, 0.02, 0.04), (0.06, 0.05, 0.07), (0.015, 0.010, 0.020)),
    profile(Industry::ConsumerStaples, (0.04, 0.02, 0.06), (0.07, 0.06, 0.08), (0.020, 0.015, 0.025)),
    profile(Industry::ConsumerDiscretionary, (0.07, 0.04, 0.10), (0.09, 0.08, 0.11), (0.025, 0.020, 0.030)),
    profile(Industry::Energy, (0.04, 0.00, 0.08), (0.095, 0.08, 0.11), (0.015, 0.010, 0.020)),
    profile(Industry::Industrials, (0.05, 0.03, 0.08), (0.085, 0.075, 0.10), (0.020, 0.015, 0.025)),
    profile(Industry::RealEstate, (0.04, 0.02, 0.06), (0.075, 0.065, 0.09), (0.020, 0.015, 0.025)),
    profile(Industry::CommunicationServices, (0.06, 0.03, 0.09), (0.085, 0.075, 0.10), (0.025, 0.020, 0.030)),
    profile(Industry::BasicMaterials, (0.04, 0.01, 0.07), (0.09, 0.08, 0.11), (0.015, 0.010, 0.020)),
    profile(Industry::Default, (0.05, 0.02, 0.10), (0.08, 0.07, 0.10), (0.020, 0.015, 0.030)),
];

const ALIASES: &[(&str, Industry)] = &[
    ("technology", Industry::Technology),
    ("information technology", Industry::Technology),
    ("tech", Industry::Technology),
    ("software", Industry::Technology),
    ("semiconductors", Industry::Technology),
    ("healthcare", Industry::Healthcare),
    ("health care", Industry::Healthcare),
    ("pharmaceuticals", Industry::Healthcare),
    ("biotechnology", Industry::Healthcare),
    ("financial services", Industry::FinancialServices),
    ("financials", Industry::FinancialServices),
    ("financial", Industry::FinancialServices),
    ("banks", Industry::FinancialServices),
    ("insurance", Industry::FinancialServices),
    ("utilities", Industry::Utilities),
    ("utility", Industry::Utilities),
    ("consumer staples", Industry::ConsumerStaples),
    ("consumer defensive", Industry::ConsumerStaples),
    ("consumer discretionary", Industry::ConsumerDiscretionary),
    ("consumer cyclical", Industry::ConsumerDiscretionary),
    ("energy", Industry::Energy),
    ("oil & gas", Industry::Energy),
    ("industrials", Industry::Industrials),
    ("industrial", Industry::Industrials),
    ("real estate", Industry::RealEstate),
    ("reit", Industry::RealEstate),
    ("reits", Industry::RealEstate),
    ("communication services", Industry::CommunicationServices),
    ("telecommunications", Industry::CommunicationServices),
    ("telecom", Industry::CommunicationServices),
    ("media", Industry::CommunicationServices),
    ("basic materials", Industry::BasicMaterials),
    ("materials", Industry::BasicMaterials),
    ("default", Industry::Default),
];

fn normalize_label(label: &str) -> String {
    label
        .replace(&['-', '_'][..], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Static lookup table of industry assumptions.
pub struct IndustryAssumptions;

impl IndustryAssumptions {
    /// Classify a free-text label; `None` when nothing matches.
    pub fn classify(label: &str) -> Option<Industry> {
        let key = normalize_label(label);
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, industry)| *industry)
    }

    /// Profile for a label. Unknown labels resolve to the Default profile.
    pub fn lookup(label: &str) -> &'static IndustryProfile {
        Self::profile(Self::classify(label).unwrap_or(Industry::Default))
    }

    pub fn profile(industry: Industry) -> &'static IndustryProfile {
        PROFILES
            .iter()
            .find(|p| p.industry == industry)
            .unwrap_or(&PROFILES[PROFILES.len() - 1])
    }

    pub fn all() -> &'static [IndustryProfile] {
        &PROFILES
    }
}
