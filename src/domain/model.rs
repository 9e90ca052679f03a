use crate::utils::error::{AnalysisError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// 單一代號的每日收盤價，依日期遞增且不重複
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date; on duplicate dates the later entry wins.
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keeps only the most recent `window` points.
    pub fn tail(mut self, window: usize) -> Self {
        if self.points.len() > window {
            self.points.drain(..self.points.len() - window);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index_of(symbol).is_some()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.values[i][j])
    }

    /// Correlations of `symbol` with every other symbol, in matrix order.
    pub fn others(&self, symbol: &str) -> Vec<(&str, f64)> {
        let Some(i) = self.index_of(symbol) else {
            return Vec::new();
        };
        self.symbols
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| (other.as_str(), self.values[i][j]))
            .collect()
    }

    pub fn upper_triangle(&self) -> Vec<f64> {
        let n = self.len();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.values[i][j]);
            }
        }
        out
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![String::new()];
        header.extend(self.symbols.iter().cloned());
        writer.write_record(&header)?;

        for (symbol, row) in self.symbols.iter().zip(&self.values) {
            let mut record = vec![symbol.clone()];
            record.extend(row.iter().map(|v| format!("{:.6}", v)));
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AnalysisError::ProcessingError {
                message: format!("Failed to flush correlation CSV: {}", e),
            })?;
        String::from_utf8(bytes).map_err(|e| AnalysisError::ProcessingError {
            message: format!("Correlation CSV is not valid UTF-8: {}", e),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Forex,
    Commodity,
    Crypto,
    Index,
    Equity,
}

impl AssetClass {
    pub fn of(symbol: &str) -> Self {
        if symbol.ends_with("=X") {
            AssetClass::Forex
        } else if matches!(symbol, "GC=F" | "SI=F" | "PL=F") {
            AssetClass::Commodity
        } else if symbol.ends_with("-USD") || symbol.ends_with("-USDT") {
            AssetClass::Crypto
        } else if symbol.starts_with('^') {
            AssetClass::Index
        } else {
            AssetClass::Equity
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderScore {
    pub symbol: String,
    pub leadership_score: f64,
    pub strong_correlations: usize,
    pub avg_correlation: f64,
    pub max_correlation: Option<f64>,
    pub min_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySpillover {
    pub volatility_transmission: f64,
    pub lag: usize,
    pub sources: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpilloverReport {
    pub symbol: String,
    pub total_correlations: usize,
    pub strong_spillovers: usize,
    pub avg_correlation: f64,
    pub max_spillover: f64,
    pub spillover_sources: BTreeMap<String, f64>,
    pub volatility_spillover: VolatilitySpillover,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub degree: usize,
    pub strength: f64,
    pub asset_class: AssetClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetadata {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub correlation_threshold: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub metadata: NetworkMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    HighCorrelation,
    ModerateCorrelation,
    LowCorrelation,
}

impl MarketRegime {
    pub fn from_avg_correlation(avg: f64) -> Self {
        if avg > 0.7 {
            MarketRegime::HighCorrelation
        } else if avg > 0.4 {
            MarketRegime::ModerateCorrelation
        } else {
            MarketRegime::LowCorrelation
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MarketRegime::HighCorrelation => {
                "High correlation regime - elevated systemic risk"
            }
            MarketRegime::ModerateCorrelation => "Moderate correlation regime",
            MarketRegime::LowCorrelation => {
                "Low correlation regime - diversification opportunities"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeAnalysis {
    pub regime: MarketRegime,
    pub description: String,
    pub avg_correlation: f64,
    pub correlation_volatility: f64,
    pub symbols_analyzed: usize,
    pub symbols_with_data: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub window: usize,
    pub correlation_threshold: f64,
    pub symbols_requested: Vec<String>,
    pub observations: usize,
    pub correlations: CorrelationMatrix,
    pub leaders: Vec<LeaderScore>,
    pub network: MarketNetwork,
    pub regime: Option<RegimeAnalysis>,
    pub spillovers: Vec<SpilloverReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_price_series_sorts_and_dedups() {
        let series = PriceSeries::new(
            "GC=F",
            vec![
                PricePoint { date: day(3), close: 3.0 },
                PricePoint { date: day(1), close: 1.0 },
                PricePoint { date: day(3), close: 3.5 },
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].date, day(1));
        assert_eq!(series.points[1].close, 3.5);
    }

    #[test]
    fn test_price_series_tail() {
        let points = (1..=10)
            .map(|d| PricePoint { date: day(d), close: d as f64 })
            .collect();
        let series = PriceSeries::new("^GSPC", points).tail(3);
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[0].date, day(8));
    }

    #[test]
    fn test_asset_class_rules() {
        assert_eq!(AssetClass::of("EURUSD=X"), AssetClass::Forex);
        assert_eq!(AssetClass::of("GC=F"), AssetClass::Commodity);
        assert_eq!(AssetClass::of("SI=F"), AssetClass::Commodity);
        assert_eq!(AssetClass::of("BTC-USD"), AssetClass::Crypto);
        assert_eq!(AssetClass::of("SOL-USDT"), AssetClass::Crypto);
        assert_eq!(AssetClass::of("^GSPC"), AssetClass::Index);
        assert_eq!(AssetClass::of("AAPL"), AssetClass::Equity);
        // 只有金銀鉑被視為商品
        assert_eq!(AssetClass::of("CL=F"), AssetClass::Equity);
    }

    #[test]
    fn test_regime_thresholds() {
        assert_eq!(MarketRegime::from_avg_correlation(0.71), MarketRegime::HighCorrelation);
        assert_eq!(MarketRegime::from_avg_correlation(0.7), MarketRegime::ModerateCorrelation);
        assert_eq!(MarketRegime::from_avg_correlation(0.41), MarketRegime::ModerateCorrelation);
        assert_eq!(MarketRegime::from_avg_correlation(0.4), MarketRegime::LowCorrelation);
        assert_eq!(MarketRegime::from_avg_correlation(-0.2), MarketRegime::LowCorrelation);
    }

    #[test]
    fn test_matrix_accessors_and_csv() {
        let matrix = CorrelationMatrix {
            symbols: vec!["A".into(), "B".into(), "C".into()],
            values: vec![
                vec![1.0, 0.5, -0.2],
                vec![0.5, 1.0, 0.1],
                vec![-0.2, 0.1, 1.0],
            ],
        };
        assert_eq!(matrix.get("A", "C"), Some(-0.2));
        assert_eq!(matrix.others("B"), vec![("A", 0.5), ("C", 0.1)]);
        assert_eq!(matrix.upper_triangle(), vec![0.5, -0.2, 0.1]);
        assert!(matrix.others("Z").is_empty());

        let csv = matrix.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(",A,B,C"));
        assert_eq!(lines.next(), Some("A,1.000000,0.500000,-0.200000"));
    }
}
