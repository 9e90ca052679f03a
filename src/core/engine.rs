use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::StageMonitor;

/// Runs a [`Pipeline`] through extract, transform and load.
pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
    monitor: StageMonitor,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: StageMonitor::new(monitor_enabled),
        }
    }

    pub fn monitor(&self) -> &StageMonitor {
        &self.monitor
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting inter-market report");

        // Extract
        tracing::info!("📥 Fetching price history...");
        let prices = self.pipeline.extract().await?;
        tracing::info!("Fetched prices for {} symbols", prices.len());
        self.monitor.mark("extract");

        // Transform
        tracing::info!("🔄 Computing correlations...");
        let report = self.pipeline.transform(prices).await?;
        tracing::info!(
            "Analyzed {} symbols over {} observations ({} network edges)",
            report.correlations.len(),
            report.observations,
            report.network.metadata.total_edges
        );
        if let Some(regime) = &report.regime {
            tracing::info!(
                "Market regime: {:?} (avg correlation {:.3})",
                regime.regime,
                regime.avg_correlation
            );
        }
        self.monitor.mark("transform");

        // Load
        tracing::info!("💾 Writing report...");
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("Output saved to: {}", output_path);
        self.monitor.mark("load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
