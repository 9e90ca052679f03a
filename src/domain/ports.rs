use crate::domain::model::{AnalysisReport, PriceSeries};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 每日收盤價來源（HTTP、本地 CSV 等）
pub trait PriceSource: Send + Sync {
    /// Returns at most `window` daily closes for `symbol`, oldest first.
    fn fetch_closes(
        &self,
        symbol: &str,
        window: usize,
    ) -> impl std::future::Future<Output = Result<PriceSeries>> + Send;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Human readable location of `path`, used in log lines and the CLI summary.
    fn location(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn symbols(&self) -> &[String];
    fn window(&self) -> usize;
    fn correlation_threshold(&self) -> f64;
    fn volatility_lag(&self) -> usize;
    fn spillover_targets(&self) -> &[String];
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compress_output(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<PriceSeries>>;
    async fn transform(&self, data: Vec<PriceSeries>) -> Result<AnalysisReport>;
    async fn load(&self, report: AnalysisReport) -> Result<String>;
}
