#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Mode};

use crate::adapters::{yahoo, AnyPriceSource, CsvSource, YahooSource};
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
}

/// 價格來源的共用設定，CLI 與 TOML 都轉成這個結構
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub endpoint: String,
    pub data_dir: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Yahoo,
            endpoint: yahoo::DEFAULT_ENDPOINT.to_string(),
            data_dir: None,
            timeout_seconds: 30,
            user_agent: yahoo::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SourceSettings {
    pub fn validate(&self, prefix: &str) -> Result<()> {
        match self.kind {
            SourceKind::Yahoo => {
                validation::validate_url(&format!("{}endpoint", prefix), &self.endpoint)?;
                validation::validate_positive_number(
                    &format!("{}timeout_seconds", prefix),
                    self.timeout_seconds as usize,
                    1,
                )
            }
            SourceKind::Csv => {
                let field = format!("{}data_dir", prefix);
                let dir = validation::validate_required_field(&field, &self.data_dir)?;
                validation::validate_path(&field, dir)
            }
        }
    }

    pub fn build(&self) -> Result<AnyPriceSource> {
        match self.kind {
            SourceKind::Yahoo => Ok(AnyPriceSource::Yahoo(YahooSource::new(
                &self.endpoint,
                Duration::from_secs(self.timeout_seconds),
                &self.user_agent,
            )?)),
            SourceKind::Csv => {
                let dir = self
                    .data_dir
                    .as_ref()
                    .ok_or_else(|| AnalysisError::MissingConfigError {
                        field: "data_dir".to_string(),
                    })?;
                Ok(AnyPriceSource::Csv(CsvSource::new(dir)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_source_requires_data_dir() {
        let settings = SourceSettings {
            kind: SourceKind::Csv,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate("source."),
            Err(AnalysisError::MissingConfigError { .. })
        ));
        assert!(settings.build().is_err());

        let settings = SourceSettings {
            data_dir: Some("./data".to_string()),
            ..settings
        };
        assert!(settings.validate("source.").is_ok());
        assert!(matches!(settings.build(), Ok(AnyPriceSource::Csv(_))));
    }

    #[test]
    fn test_yahoo_source_requires_http_endpoint() {
        let settings = SourceSettings {
            endpoint: "ftp://prices.example.com".to_string(),
            ..Default::default()
        };
        assert!(settings.validate("source.").is_err());
        assert!(SourceSettings::default().validate("source.").is_ok());
    }
}
