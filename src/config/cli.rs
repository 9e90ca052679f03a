use crate::config::{SourceKind, SourceSettings};
use crate::core::analyzer::{
    default_active_symbols, DEFAULT_CORRELATION_THRESHOLD, DEFAULT_CORRELATION_WINDOW,
    DEFAULT_VOLATILITY_LAG,
};
use crate::core::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{self, Validate};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Correlation matrix of daily returns
    Correlations,
    /// Symbols ranked by mean absolute correlation
    Leaders,
    /// Spillover effects on --symbol
    Spillover,
    /// Correlation network (nodes and edges)
    Network,
    /// Market regime from average correlation
    Regime,
    /// Every analysis, written to --output-path
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "intermarket")]
#[command(about = "Inter-market correlation, leadership, spillover and regime analysis")]
pub struct CliConfig {
    #[arg(long, value_enum, default_value = "report")]
    pub mode: Mode,

    /// Target symbol for spillover analysis
    #[arg(long)]
    pub symbol: Option<String>,

    #[arg(long, value_delimiter = ',', default_values_t = default_active_symbols())]
    pub symbols: Vec<String>,

    /// Number of daily observations to request
    #[arg(long, default_value_t = DEFAULT_CORRELATION_WINDOW)]
    pub window: usize,

    /// Minimum absolute correlation treated as strong
    #[arg(long, default_value_t = DEFAULT_CORRELATION_THRESHOLD)]
    pub threshold: f64,

    #[arg(long, default_value_t = DEFAULT_VOLATILITY_LAG)]
    pub volatility_lag: usize,

    #[arg(long, value_enum, default_value = "yahoo")]
    pub source: SourceKind,

    #[arg(long, default_value = crate::adapters::yahoo::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Directory with one `<SYMBOL>.csv` per symbol (for --source csv)
    #[arg(long)]
    pub data_dir: Option<String>,

    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_values_t = vec!["json".to_string(), "csv".to_string()])]
    pub output_formats: Vec<String>,

    /// Write loose files instead of a zip bundle
    #[arg(long)]
    pub no_compress: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log per-stage timings and memory usage")]
    pub monitor: bool,

    #[arg(skip)]
    #[serde(skip)]
    spillover_targets: Vec<String>,
}

impl CliConfig {
    /// Parses argv and fills in derived fields.
    pub fn load() -> Self {
        Self::parse().finalize()
    }

    pub fn finalize(mut self) -> Self {
        self.spillover_targets = self.symbol.iter().cloned().collect();
        self
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            kind: self.source,
            endpoint: self.endpoint.clone(),
            data_dir: self.data_dir.clone(),
            timeout_seconds: self.timeout_seconds,
            user_agent: crate::adapters::yahoo::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_symbols("symbols", &self.symbols)?;
        validation::validate_positive_number("window", self.window, 2)?;
        validation::validate_range("threshold", self.threshold, 0.0, 1.0)?;
        validation::validate_range(
            "volatility_lag",
            self.volatility_lag,
            1,
            self.window.saturating_sub(1),
        )?;
        self.source_settings().validate("")?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_formats("output_formats", &self.output_formats)?;

        if self.mode == Mode::Spillover {
            let symbol = validation::validate_required_field("symbol", &self.symbol)?;
            if symbol.trim().is_empty() {
                return Err(AnalysisError::InvalidConfigValueError {
                    field: "symbol".to_string(),
                    value: symbol.clone(),
                    reason: "Spillover mode needs a target symbol".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl ConfigProvider for CliConfig {
    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn window(&self) -> usize {
        self.window
    }

    fn correlation_threshold(&self) -> f64 {
        self.threshold
    }

    fn volatility_lag(&self) -> usize {
        self.volatility_lag
    }

    fn spillover_targets(&self) -> &[String] {
        &self.spillover_targets
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn compress_output(&self) -> bool {
        !self.no_compress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        let mut argv = vec!["intermarket"];
        argv.extend_from_slice(args);
        CliConfig::parse_from(argv).finalize()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.mode, Mode::Report);
        assert_eq!(config.window, 252);
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.symbols, default_active_symbols());
        assert!(config.compress_output());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_analyze_style_invocation() {
        let config = parse(&[
            "--mode",
            "spillover",
            "--symbol",
            "EURUSD=X",
            "--symbols",
            "GBPUSD=X,^GSPC",
        ]);
        assert_eq!(config.mode, Mode::Spillover);
        assert_eq!(config.symbols, vec!["GBPUSD=X", "^GSPC"]);
        assert_eq!(config.spillover_targets(), &["EURUSD=X".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spillover_without_symbol_is_invalid() {
        let config = parse(&["--mode", "spillover"]);
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_csv_source_needs_data_dir() {
        assert!(parse(&["--source", "csv"]).validate().is_err());
        assert!(parse(&["--source", "csv", "--data-dir", "./prices"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_invalid_threshold_and_window() {
        assert!(parse(&["--threshold", "1.2"]).validate().is_err());
        assert!(parse(&["--window", "1"]).validate().is_err());
        assert!(parse(&["--threshold", "NaN"]).validate().is_err());
    }

    #[test]
    fn test_volatility_lag_must_fit_window() {
        assert!(parse(&["--window", "20", "--volatility-lag", "19"])
            .validate()
            .is_ok());
        assert!(parse(&["--window", "20", "--volatility-lag", "20"])
            .validate()
            .is_err());
        let huge = usize::MAX.to_string();
        assert!(parse(&["--volatility-lag", huge.as_str()]).validate().is_err());
    }
}
