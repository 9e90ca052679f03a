use crate::core::analyzer::{returns_from_prices, InterMarketAnalyzer};
use crate::core::correlation::correlation_matrix;
use crate::core::metrics;
use crate::core::{AnalysisReport, ConfigProvider, Pipeline, PriceSeries, PriceSource, Storage};
use crate::domain::model::{EdgeKind, LeaderScore, NetworkEdge};
use crate::utils::error::{AnalysisError, Result};
use chrono::Utc;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const BUNDLE_NAME: &str = "intermarket_report.zip";

/// Fetch, analyze and persist a full inter-market report.
pub struct ReportPipeline<P: PriceSource, S: Storage, C: ConfigProvider> {
    analyzer: InterMarketAnalyzer<P>,
    storage: S,
    config: C,
}

impl<P: PriceSource, S: Storage, C: ConfigProvider> ReportPipeline<P, S, C> {
    pub fn new(source: P, storage: S, config: C) -> Self {
        let analyzer = InterMarketAnalyzer::new(source)
            .with_window(config.window())
            .with_threshold(config.correlation_threshold())
            .with_volatility_lag(config.volatility_lag())
            .with_active_symbols(config.symbols().to_vec());
        Self {
            analyzer,
            storage,
            config,
        }
    }

    pub fn analyzer(&self) -> &InterMarketAnalyzer<P> {
        &self.analyzer
    }

    /// 分析代號加上不在其中的外溢目標，去除重複
    fn fetch_universe(&self) -> Vec<String> {
        let mut universe = self.config.symbols().to_vec();
        for target in self.config.spillover_targets() {
            if !universe.contains(target) {
                universe.push(target.clone());
            }
        }
        universe
    }

    fn is_analyzed(&self, symbol: &str) -> bool {
        self.config.symbols().iter().any(|s| s == symbol)
    }

    fn wants(&self, format: &str) -> bool {
        self.config.output_formats().iter().any(|f| f == format)
    }

    /// 依設定的格式產生 (檔名, 內容) 列表
    fn render(&self, report: &AnalysisReport) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let mut files = Vec::new();

        if self.wants("json") {
            files.push(("report.json", serde_json::to_vec_pretty(report)?));
        }

        if self.wants("csv") {
            files.push(("correlations.csv", report.correlations.to_csv()?.into_bytes()));
            files.push(("leaders.csv", leaders_csv(&report.leaders)?));
            files.push(("network_edges.csv", edges_csv(&report.network.edges)?));
        }

        Ok(files)
    }
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| AnalysisError::ProcessingError {
            message: format!("Failed to flush CSV output: {}", e),
        })
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

fn leaders_csv(leaders: &[LeaderScore]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "symbol",
        "leadership_score",
        "strong_correlations",
        "avg_correlation",
        "max_correlation",
        "min_correlation",
    ])?;
    for leader in leaders {
        writer.write_record([
            leader.symbol.clone(),
            format!("{:.6}", leader.leadership_score),
            leader.strong_correlations.to_string(),
            format!("{:.6}", leader.avg_correlation),
            optional(leader.max_correlation),
            optional(leader.min_correlation),
        ])?;
    }
    finish_csv(writer)
}

fn edges_csv(edges: &[NetworkEdge]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["source", "target", "weight", "type"])?;
    for edge in edges {
        let kind = match edge.kind {
            EdgeKind::Positive => "positive",
            EdgeKind::Negative => "negative",
        };
        let weight = format!("{:.6}", edge.weight);
        writer.write_record([edge.source.as_str(), edge.target.as_str(), weight.as_str(), kind])?;
    }
    finish_csv(writer)
}

#[async_trait::async_trait]
impl<P: PriceSource, S: Storage, C: ConfigProvider> Pipeline for ReportPipeline<P, S, C> {
    async fn extract(&self) -> Result<Vec<PriceSeries>> {
        let universe = self.fetch_universe();
        tracing::debug!(
            "Fetching {} symbols with a {}-day window",
            universe.len(),
            self.config.window()
        );
        let prices = self
            .analyzer
            .fetch_prices(&universe, self.config.window())
            .await;

        if prices.is_empty() {
            return Err(AnalysisError::insufficient("no symbol returned prices"));
        }
        Ok(prices)
    }

    async fn transform(&self, data: Vec<PriceSeries>) -> Result<AnalysisReport> {
        // 外溢目標若不在分析代號內，只參與自己的外溢分析
        let (analyzed, extra_targets): (Vec<PriceSeries>, Vec<PriceSeries>) = data
            .into_iter()
            .partition(|series| self.is_analyzed(&series.symbol));

        let frame = returns_from_prices(&analyzed)?;
        let matrix = correlation_matrix(&frame);
        let threshold = self.config.correlation_threshold();

        tracing::debug!(
            "Aligned {} return observations across {} symbols",
            frame.len(),
            matrix.len()
        );

        // 單一代號無法判斷市場狀態，報告仍照常產出
        let regime = match metrics::market_regime(&matrix, self.config.symbols().len()) {
            Ok(regime) => Some(regime),
            Err(e) => {
                tracing::warn!("⚠️ Skipping regime analysis: {}", e);
                None
            }
        };

        let mut spillovers = Vec::new();
        for target in self.config.spillover_targets() {
            let result = match extra_targets.iter().find(|s| &s.symbol == target) {
                Some(series) => {
                    let mut universe = analyzed.clone();
                    universe.push(series.clone());
                    returns_from_prices(&universe).and_then(|target_frame| {
                        metrics::detect_spillover(
                            target,
                            &target_frame,
                            &correlation_matrix(&target_frame),
                            threshold,
                            self.config.volatility_lag(),
                        )
                    })
                }
                None => metrics::detect_spillover(
                    target,
                    &frame,
                    &matrix,
                    threshold,
                    self.config.volatility_lag(),
                ),
            };
            match result {
                Ok(report) => spillovers.push(report),
                Err(e) => tracing::warn!("⚠️ Skipping spillover for {}: {}", target, e),
            }
        }

        Ok(AnalysisReport {
            generated_at: Utc::now(),
            window: self.config.window(),
            correlation_threshold: threshold,
            symbols_requested: self.config.symbols().to_vec(),
            observations: frame.len(),
            leaders: metrics::identify_leaders(&matrix, threshold),
            network: metrics::market_network(&matrix, threshold),
            correlations: matrix,
            regime,
            spillovers,
        })
    }

    async fn load(&self, report: AnalysisReport) -> Result<String> {
        let files = self.render(&report)?;

        if !self.config.compress_output() {
            for (name, data) in &files {
                tracing::debug!("Writing {} ({} bytes)", name, data.len());
                self.storage.write_file(name, data).await?;
            }
            return Ok(self.storage.location(""));
        }

        tracing::debug!("Creating ZIP bundle with {} files", files.len());

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            for (name, data) in &files {
                zip.start_file(*name, SimpleFileOptions::default())?;
                zip.write_all(data)?;
            }
            zip.finish()?.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.storage.write_file(BUNDLE_NAME, &zip_data).await?;

        Ok(self.storage.location(BUNDLE_NAME))
    }
}
