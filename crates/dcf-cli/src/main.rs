//! dcf-cli: value a company from the command line.
//!
//! Usage:
//!   dcf-cli value AAPL
//!   dcf-cli value AAPL --wacc 0.09 --terminal-growth 0.025 --sensitivity --scenarios
//!   dcf-cli value ACME --input payload.json --compact
//!   dcf-cli industries

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dcf_engine::{
    DcfEngine, FinancialDataNormalizer, IndustryAssumptions, ParameterOverrides, ReportOptions,
    ValuationReport,
};
use market_data::YahooFinanceClient;
use serde::Serialize;
use std::path::PathBuf;
use valuation_core::{FinancialDataProvider, RawFinancialData};

#[derive(Debug, Parser)]
#[command(name = "dcf-cli", version, about = "Discounted cash flow valuation")]
struct Cli {
    /// Print single-line JSON instead of pretty-printed output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Value a ticker from Yahoo Finance or a local JSON payload
    Value(ValueArgs),
    /// Print the industry assumption table
    Industries,
}

#[derive(Debug, Args)]
struct ValueArgs {
    ticker: String,

    /// Raw financials as JSON; skips the network fetch
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long, env = "DCF_PROJECTION_YEARS")]
    years: Option<u32>,

    #[arg(long, env = "DCF_GROWTH_RATE", allow_hyphen_values = true)]
    growth: Option<f64>,

    #[arg(long, env = "DCF_WACC")]
    wacc: Option<f64>,

    #[arg(long, env = "DCF_TERMINAL_GROWTH", allow_hyphen_values = true)]
    terminal_growth: Option<f64>,

    /// Include one-at-a-time driver sensitivity
    #[arg(long)]
    sensitivity: bool,

    /// Include Bear / Base / Bull scenarios
    #[arg(long)]
    scenarios: bool,
}

impl ValueArgs {
    fn report_options(&self) -> ReportOptions {
        ReportOptions {
            overrides: ParameterOverrides {
                growth_rate: self.growth,
                wacc: self.wacc,
                terminal_growth_rate: self.terminal_growth,
                projection_years: self.years,
            },
            include_sensitivity: self.sensitivity,
            include_scenarios: self.scenarios,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dcf_cli=info,dcf_engine=warn,market_data=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Value(args) => {
            let report = value(args).await?;
            print_json(&report, cli.compact)
        }
        Command::Industries => print_json(&IndustryAssumptions::all(), cli.compact),
    }
}

async fn value(args: &ValueArgs) -> anyhow::Result<ValuationReport> {
    let raw = match &args.input {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_payload(&contents, &args.ticker)?
        }
        None => {
            tracing::info!("Fetching financials for {}", args.ticker);
            YahooFinanceClient::new().fetch(&args.ticker).await?
        }
    };

    let snapshot = FinancialDataNormalizer::new().normalize(&raw)?;
    if snapshot.degraded {
        tracing::warn!("{} has a short cash flow history; confidence is reduced", snapshot.ticker);
    }

    let report = ValuationReport::build(&DcfEngine::new(), snapshot, &args.report_options())?;
    tracing::info!(
        "{}: {:.2}/share vs price {:.2}",
        report.snapshot.ticker,
        report.valuation.per_share_value,
        report.snapshot.current_price
    );
    Ok(report)
}

/// Parse a raw payload, taking the ticker from the command line when the file has none.
/// A payload naming a different ticker is rejected.
fn parse_payload(contents: &str, ticker: &str) -> anyhow::Result<RawFinancialData> {
    let mut raw: RawFinancialData =
        serde_json::from_str(contents).context("Invalid financials payload")?;
    match raw.ticker.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(own) if !own.eq_ignore_ascii_case(ticker.trim()) => {
            anyhow::bail!("Payload is for {} but {} was requested", own, ticker)
        }
        Some(_) => {}
        None => raw.ticker = Some(ticker.to_string()),
    }
    Ok(raw)
}

fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> anyhow::Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_command() {
        let cli = Cli::try_parse_from([
            "dcf-cli",
            "value",
            "MSFT",
            "--wacc",
            "0.09",
            "--growth",
            "-0.01",
            "--years",
            "7",
            "--sensitivity",
            "--compact",
        ])
        .unwrap();

        assert!(cli.compact);
        let Command::Value(args) = cli.command else {
            panic!("expected value command");
        };
        assert_eq!(args.ticker, "MSFT");
        let options = args.report_options();
        assert_eq!(options.overrides.wacc, Some(0.09));
        assert_eq!(options.overrides.growth_rate, Some(-0.01));
        assert_eq!(options.overrides.projection_years, Some(7));
        assert!(options.include_sensitivity);
        assert!(!options.include_scenarios);
    }

    #[test]
    fn test_parse_industries_command() {
        let cli = Cli::try_parse_from(["dcf-cli", "industries"]).unwrap();
        assert!(matches!(cli.command, Command::Industries));
        assert!(!cli.compact);
    }

    #[test]
    fn test_value_requires_ticker() {
        assert!(Cli::try_parse_from(["dcf-cli", "value"]).is_err());
    }

    #[test]
    fn test_payload_takes_ticker_from_args_when_missing() {
        let raw = parse_payload(
            r#"{"current_price": 10.0, "shares_outstanding": 5.0, "free_cash_flows": [1.0, 2.0]}"#,
            "ACME",
        )
        .unwrap();
        assert_eq!(raw.ticker.as_deref(), Some("ACME"));
        assert_eq!(raw.free_cash_flows, vec![1.0, 2.0]);

        let named = parse_payload(r#"{"ticker": "acme"}"#, "ACME").unwrap();
        assert_eq!(named.ticker.as_deref(), Some("acme"));
    }

    #[test]
    fn test_payload_for_other_ticker_is_rejected() {
        let err = parse_payload(r#"{"ticker": "OWN"}"#, "ACME").unwrap_err();
        assert!(err.to_string().contains("OWN"));
        assert!(err.to_string().contains("ACME"));
    }

    #[test]
    fn test_invalid_payload_is_an_error() {
        assert!(parse_payload("not json", "ACME").is_err());
    }

    #[tokio::test]
    async fn test_value_from_input_file() {
        let path = std::env::temp_dir().join(format!("dcf-cli-test-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"ticker": "FILE", "current_price": 50.0, "shares_outstanding": 100.0,
                "free_cash_flows": [400.0, 420.0, 450.0], "cash": 100.0, "total_debt": 50.0,
                "sector": "Utilities"}"#,
        )
        .unwrap();

        let args = ValueArgs {
            ticker: "file".to_string(),
            input: Some(path.clone()),
            years: None,
            growth: None,
            wacc: None,
            terminal_growth: None,
            sensitivity: false,
            scenarios: true,
        };
        let report = value(&args).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.snapshot.ticker, "FILE");
        assert!(report.valuation.per_share_value > 0.0);
        assert_eq!(report.scenarios.unwrap().outcomes.len(), 3);
        assert!(report.sensitivity.is_none());
    }
}
