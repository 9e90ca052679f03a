use crate::core::correlation::correlation_matrix;
use crate::core::metrics;
use crate::core::returns::ReturnsFrame;
use crate::domain::model::{
    CorrelationMatrix, LeaderScore, MarketNetwork, PriceSeries, RegimeAnalysis, SpilloverReport,
};
use crate::domain::ports::PriceSource;
use crate::utils::error::{AnalysisError, Result};

/// 一年的交易日
pub const DEFAULT_CORRELATION_WINDOW: usize = 252;
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.3;
pub const DEFAULT_VOLATILITY_LAG: usize = 1;

pub fn default_active_symbols() -> Vec<String> {
    [
        "EURUSD=X", "GBPUSD=X", "USDJPY=X", "GC=F", "BTC-USD", "ETH-USD", "^GSPC", "^IXIC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Cross-asset correlation analysis over a [`PriceSource`].
pub struct InterMarketAnalyzer<S: PriceSource> {
    source: S,
    correlation_window: usize,
    min_correlation_threshold: f64,
    volatility_lag: usize,
    active_symbols: Vec<String>,
}

impl<S: PriceSource> InterMarketAnalyzer<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            correlation_window: DEFAULT_CORRELATION_WINDOW,
            min_correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
            volatility_lag: DEFAULT_VOLATILITY_LAG,
            active_symbols: default_active_symbols(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.correlation_window = window;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.min_correlation_threshold = threshold;
        self
    }

    pub fn with_volatility_lag(mut self, lag: usize) -> Self {
        self.volatility_lag = lag;
        self
    }

    pub fn with_active_symbols(mut self, symbols: Vec<String>) -> Self {
        self.active_symbols = symbols;
        self
    }

    pub fn correlation_window(&self) -> usize {
        self.correlation_window
    }

    pub fn min_correlation_threshold(&self) -> f64 {
        self.min_correlation_threshold
    }

    pub fn volatility_lag(&self) -> usize {
        self.volatility_lag
    }

    pub fn active_symbols(&self) -> &[String] {
        &self.active_symbols
    }

    /// Fetches every symbol; failures and empty series are logged and skipped.
    pub async fn fetch_prices(&self, symbols: &[String], window: usize) -> Vec<PriceSeries> {
        let mut prices = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.source.fetch_closes(symbol, window).await {
                Ok(series) if series.is_empty() => {
                    tracing::warn!("⚠️ No prices returned for {}, skipping", symbol);
                }
                Ok(series) => {
                    tracing::debug!("Fetched {} closes for {}", series.len(), symbol);
                    prices.push(series);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to fetch {}: {}", symbol, e);
                }
            }
        }
        prices
    }

    pub async fn returns(&self, symbols: &[String], window: usize) -> Result<ReturnsFrame> {
        let prices = self.fetch_prices(symbols, window).await;
        returns_from_prices(&prices)
    }

    pub async fn calculate_correlations(
        &self,
        symbols: &[String],
        window: Option<usize>,
    ) -> Result<CorrelationMatrix> {
        let window = window.unwrap_or(self.correlation_window);
        let frame = self.returns(symbols, window).await?;
        Ok(correlation_matrix(&frame))
    }

    pub fn identify_leaders(&self, correlations: &CorrelationMatrix) -> Vec<LeaderScore> {
        metrics::identify_leaders(correlations, self.min_correlation_threshold)
    }

    /// Uses the active universe when `all_symbols` is `None`; the target is always included.
    pub async fn detect_spillover(
        &self,
        symbol: &str,
        all_symbols: Option<&[String]>,
    ) -> Result<SpilloverReport> {
        let mut symbols = all_symbols
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.active_symbols.clone());
        if !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }

        let frame = self.returns(&symbols, self.correlation_window).await?;
        let matrix = correlation_matrix(&frame);
        metrics::detect_spillover(
            symbol,
            &frame,
            &matrix,
            self.min_correlation_threshold,
            self.volatility_lag,
        )
    }

    pub async fn get_market_network(&self, symbols: &[String]) -> Result<MarketNetwork> {
        let matrix = self.calculate_correlations(symbols, None).await?;
        Ok(metrics::market_network(&matrix, self.min_correlation_threshold))
    }

    pub async fn analyze_market_regime(&self, symbols: &[String]) -> Result<RegimeAnalysis> {
        let matrix = self.calculate_correlations(symbols, None).await?;
        metrics::market_regime(&matrix, symbols.len())
    }
}

/// Builds the aligned returns frame, rejecting inputs too thin to correlate.
pub fn returns_from_prices(prices: &[PriceSeries]) -> Result<ReturnsFrame> {
    if prices.iter().all(PriceSeries::is_empty) {
        return Err(AnalysisError::insufficient("no symbol returned prices"));
    }

    let frame = ReturnsFrame::from_prices(prices);
    if frame.len() < 2 {
        return Err(AnalysisError::insufficient(format!(
            "only {} overlapping return observations across {} symbols",
            frame.len(),
            frame.symbols().len()
        )));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MarketRegime, PricePoint};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct FixedSource {
        series: HashMap<String, Vec<f64>>,
    }

    impl FixedSource {
        fn new(entries: Vec<(&str, Vec<f64>)>) -> Self {
            Self {
                series: entries
                    .into_iter()
                    .map(|(s, closes)| (s.to_string(), closes))
                    .collect(),
            }
        }
    }

    impl PriceSource for FixedSource {
        async fn fetch_closes(&self, symbol: &str, window: usize) -> Result<PriceSeries> {
            let closes = self
                .series
                .get(symbol)
                .ok_or_else(|| AnalysisError::source_error(symbol, "unknown symbol"))?;
            let points = closes
                .iter()
                .enumerate()
                .map(|(i, close)| PricePoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    close: *close,
                })
                .collect();
            Ok(PriceSeries::new(symbol, points).tail(window))
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> FixedSource {
        FixedSource::new(vec![
            ("EURUSD=X", vec![1.10, 1.11, 1.09, 1.12, 1.13, 1.11]),
            ("GBPUSD=X", vec![1.30, 1.32, 1.28, 1.34, 1.36, 1.32]),
            ("^GSPC", vec![5000.0, 4990.0, 5020.0, 4980.0, 4970.0, 5000.0]),
            ("EMPTY", vec![]),
        ])
    }

    #[tokio::test]
    async fn test_calculate_correlations_skips_failed_symbols() {
        let analyzer = InterMarketAnalyzer::new(source());
        let matrix = analyzer
            .calculate_correlations(&symbols(&["EURUSD=X", "GBPUSD=X", "MISSING", "EMPTY"]), None)
            .await
            .unwrap();

        assert_eq!(matrix.symbols, symbols(&["EURUSD=X", "GBPUSD=X"]));
        assert!(matrix.get("EURUSD=X", "GBPUSD=X").unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_calculate_correlations_without_data_fails() {
        let analyzer = InterMarketAnalyzer::new(source());
        let result = analyzer
            .calculate_correlations(&symbols(&["MISSING"]), None)
            .await;
        assert!(matches!(result, Err(AnalysisError::InsufficientData { .. })));
    }

    #[tokio::test]
    async fn test_window_limits_observations() {
        let analyzer = InterMarketAnalyzer::new(source()).with_window(2);
        // 兩個價格只有一筆報酬，不足以計算相關性
        let result = analyzer
            .calculate_correlations(&symbols(&["EURUSD=X", "^GSPC"]), None)
            .await;
        assert!(result.is_err());

        let frame = analyzer
            .returns(&symbols(&["EURUSD=X", "^GSPC"]), 4)
            .await
            .unwrap();
        assert_eq!(frame.len(), 3);
    }

    #[tokio::test]
    async fn test_detect_spillover_adds_target_to_universe() {
        let analyzer = InterMarketAnalyzer::new(source())
            .with_active_symbols(symbols(&["EURUSD=X", "^GSPC"]));
        let report = analyzer.detect_spillover("GBPUSD=X", None).await.unwrap();

        assert_eq!(report.symbol, "GBPUSD=X");
        assert_eq!(report.total_correlations, 2);
        assert!(report.spillover_sources.contains_key("EURUSD=X"));
        assert_eq!(report.volatility_spillover.lag, 1);
        assert_eq!(report.volatility_spillover.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_network_and_regime() {
        let analyzer = InterMarketAnalyzer::new(source());
        let universe = symbols(&["EURUSD=X", "GBPUSD=X", "^GSPC"]);

        let network = analyzer.get_market_network(&universe).await.unwrap();
        assert_eq!(network.metadata.total_nodes, 3);
        assert_eq!(network.metadata.correlation_threshold, 0.3);

        let regime = analyzer.analyze_market_regime(&universe).await.unwrap();
        assert_eq!(regime.symbols_analyzed, 3);
        assert_eq!(regime.symbols_with_data, 3);
        assert_eq!(regime.regime, MarketRegime::from_avg_correlation(regime.avg_correlation));
    }

    #[test]
    fn test_leaders_use_configured_threshold() {
        let analyzer = InterMarketAnalyzer::new(source()).with_threshold(0.95);
        let matrix = CorrelationMatrix {
            symbols: symbols(&["A", "B"]),
            values: vec![vec![1.0, 0.9], vec![0.9, 1.0]],
        };
        let leaders = analyzer.identify_leaders(&matrix);
        assert!(leaders.iter().all(|l| l.strong_correlations == 0));
    }
}
