pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Mode};

pub use adapters::{AnyPriceSource, CsvSource, LocalStorage, YahooSource};
pub use config::toml_config::TomlConfig;
pub use core::{analyzer::InterMarketAnalyzer, engine::ReportEngine, pipeline::ReportPipeline};
pub use utils::error::{AnalysisError, Result};
