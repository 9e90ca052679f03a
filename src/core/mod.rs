pub mod analyzer;
pub mod correlation;
pub mod engine;
pub mod metrics;
pub mod pipeline;
pub mod returns;

pub use crate::domain::model::{AnalysisReport, CorrelationMatrix, PriceSeries};
pub use crate::domain::ports::{ConfigProvider, Pipeline, PriceSource, Storage};
pub use crate::utils::error::Result;
