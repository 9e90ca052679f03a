use crate::config::{SourceKind, SourceSettings};
use crate::core::analyzer::{
    default_active_symbols, DEFAULT_CORRELATION_THRESHOLD, DEFAULT_CORRELATION_WINDOW,
    DEFAULT_VOLATILITY_LAG,
};
use crate::core::ConfigProvider;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub report: Option<ReportConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_active_symbols")]
    pub symbols: Vec<String>,
    pub window: Option<usize>,
    pub correlation_threshold: Option<f64>,
    pub volatility_lag: Option<usize>,
    #[serde(default)]
    pub spillover_targets: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbols: default_active_symbols(),
            window: None,
            correlation_threshold: None,
            volatility_lag: None,
            spillover_targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub r#type: SourceKind,
    pub endpoint: Option<String>,
    pub data_dir: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default = "default_true")]
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// "compact" (預設) 或 "json"
    pub log_format: Option<String>,
}

fn default_formats() -> Vec<String> {
    vec!["json".to_string(), "csv".to_string()]
}

fn default_true() -> bool {
    true
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AnalysisError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| AnalysisError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PRICE_ENDPOINT})；未設定的保留原字串
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn source_settings(&self) -> SourceSettings {
        let defaults = SourceSettings::default();
        SourceSettings {
            kind: self.source.r#type,
            endpoint: self.source.endpoint.clone().unwrap_or(defaults.endpoint),
            data_dir: self.source.data_dir.clone(),
            timeout_seconds: self.source.timeout_seconds.unwrap_or(defaults.timeout_seconds),
            user_agent: self.source.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn report_name(&self) -> &str {
        self.report
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or("intermarket report")
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_symbols("analysis.symbols", &self.analysis.symbols)?;
        validation::validate_positive_number("analysis.window", self.window(), 2)?;
        validation::validate_range(
            "analysis.correlation_threshold",
            self.correlation_threshold(),
            0.0,
            1.0,
        )?;
        validation::validate_range(
            "analysis.volatility_lag",
            self.volatility_lag(),
            1,
            self.window().saturating_sub(1),
        )?;

        for target in &self.analysis.spillover_targets {
            validation::validate_non_empty_string("analysis.spillover_targets", target)?;
        }

        self.source_settings().validate("source.")?;
        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_output_formats("output.formats", &self.output.formats)?;

        if let Some(format) = self.monitoring.as_ref().and_then(|m| m.log_format.as_deref()) {
            if !matches!(format, "compact" | "json") {
                return Err(AnalysisError::InvalidConfigValueError {
                    field: "monitoring.log_format".to_string(),
                    value: format.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn symbols(&self) -> &[String] {
        &self.analysis.symbols
    }

    fn window(&self) -> usize {
        self.analysis.window.unwrap_or(DEFAULT_CORRELATION_WINDOW)
    }

    fn correlation_threshold(&self) -> f64 {
        self.analysis
            .correlation_threshold
            .unwrap_or(DEFAULT_CORRELATION_THRESHOLD)
    }

    fn volatility_lag(&self) -> usize {
        self.analysis.volatility_lag.unwrap_or(DEFAULT_VOLATILITY_LAG)
    }

    fn spillover_targets(&self) -> &[String] {
        &self.analysis.spillover_targets
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn output_formats(&self) -> &[String] {
        &self.output.formats
    }

    fn compress_output(&self) -> bool {
        self.output.compress
    }
}
