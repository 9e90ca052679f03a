//! Analyses derived from a correlation matrix and its returns frame.
//!
//! Everything here is synchronous and side-effect free; fetching data is the
//! analyzer's job.

use crate::core::correlation::lagged_correlation;
use crate::core::returns::{mean, std_population, ReturnsFrame};
use crate::domain::model::{
    AssetClass, CorrelationMatrix, EdgeKind, LeaderScore, MarketNetwork, MarketRegime,
    NetworkEdge, NetworkMetadata, NetworkNode, RegimeAnalysis, SpilloverReport,
    VolatilitySpillover,
};
use crate::utils::error::{AnalysisError, Result};
use chrono::Utc;
use std::collections::BTreeMap;

/// Ranks symbols by mean absolute correlation with the rest of the universe.
pub fn identify_leaders(matrix: &CorrelationMatrix, threshold: f64) -> Vec<LeaderScore> {
    let mut leaders: Vec<LeaderScore> = matrix
        .symbols
        .iter()
        .map(|symbol| {
            let others: Vec<f64> = matrix.others(symbol).into_iter().map(|(_, c)| c).collect();
            let abs: Vec<f64> = others.iter().map(|c| c.abs()).collect();

            LeaderScore {
                symbol: symbol.clone(),
                leadership_score: mean(&abs),
                strong_correlations: abs.iter().filter(|c| **c > threshold).count(),
                avg_correlation: mean(&others),
                max_correlation: others.iter().copied().reduce(f64::max),
                min_correlation: others.iter().copied().reduce(f64::min),
            }
        })
        .collect();

    // sort_by 為穩定排序，同分時保留矩陣順序
    leaders.sort_by(|a, b| b.leadership_score.total_cmp(&a.leadership_score));
    leaders
}

/// Lagged correlation of each other symbol's squared returns with the target's.
pub fn volatility_spillover(symbol: &str, frame: &ReturnsFrame, lag: usize) -> VolatilitySpillover {
    let mut sources = BTreeMap::new();

    if let Some(target) = frame.column(symbol) {
        let target_sq: Vec<f64> = target.iter().map(|r| r * r).collect();
        for (other, returns) in frame.columns() {
            if other == symbol {
                continue;
            }
            let other_sq: Vec<f64> = returns.iter().map(|r| r * r).collect();
            sources.insert(
                other.to_string(),
                lagged_correlation(&other_sq, &target_sq, lag),
            );
        }
    }

    let abs: Vec<f64> = sources.values().map(|v: &f64| v.abs()).collect();
    VolatilitySpillover {
        volatility_transmission: mean(&abs),
        lag,
        sources,
    }
}

pub fn detect_spillover(
    symbol: &str,
    frame: &ReturnsFrame,
    matrix: &CorrelationMatrix,
    threshold: f64,
    lag: usize,
) -> Result<SpilloverReport> {
    if !matrix.contains(symbol) {
        return Err(AnalysisError::insufficient(format!(
            "no overlapping price history for {}",
            symbol
        )));
    }

    let others = matrix.others(symbol);
    let values: Vec<f64> = others.iter().map(|(_, c)| *c).collect();
    let spillover_sources: BTreeMap<String, f64> = others
        .iter()
        .filter(|(_, c)| c.abs() > threshold)
        .map(|(s, c)| (s.to_string(), *c))
        .collect();

    Ok(SpilloverReport {
        symbol: symbol.to_string(),
        total_correlations: values.len(),
        strong_spillovers: spillover_sources.len(),
        avg_correlation: mean(&values),
        max_spillover: values.iter().map(|c| c.abs()).fold(0.0, f64::max),
        spillover_sources,
        volatility_spillover: volatility_spillover(symbol, frame, lag),
        timestamp: Utc::now(),
    })
}

/// Nodes per symbol plus one directed edge per ordered pair above the threshold.
pub fn market_network(matrix: &CorrelationMatrix, threshold: f64) -> MarketNetwork {
    let mut nodes = Vec::with_capacity(matrix.len());
    let mut edges = Vec::new();

    for symbol in &matrix.symbols {
        let others = matrix.others(symbol);
        let abs: Vec<f64> = others.iter().map(|(_, c)| c.abs()).collect();

        nodes.push(NetworkNode {
            id: symbol.clone(),
            degree: abs.iter().filter(|c| **c > threshold).count(),
            strength: mean(&abs),
            asset_class: AssetClass::of(symbol),
        });

        for (other, corr) in others {
            if corr.abs() > threshold {
                edges.push(NetworkEdge {
                    source: symbol.clone(),
                    target: other.to_string(),
                    weight: corr.abs(),
                    kind: if corr > 0.0 {
                        EdgeKind::Positive
                    } else {
                        EdgeKind::Negative
                    },
                });
            }
        }
    }

    MarketNetwork {
        metadata: NetworkMetadata {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            correlation_threshold: threshold,
            timestamp: Utc::now(),
        },
        nodes,
        edges,
    }
}

pub fn market_regime(matrix: &CorrelationMatrix, symbols_requested: usize) -> Result<RegimeAnalysis> {
    let upper = matrix.upper_triangle();
    if upper.is_empty() {
        return Err(AnalysisError::insufficient(format!(
            "regime analysis needs at least 2 symbols with data, got {}",
            matrix.len()
        )));
    }

    let avg_correlation = mean(&upper);
    let regime = MarketRegime::from_avg_correlation(avg_correlation);

    Ok(RegimeAnalysis {
        regime,
        description: regime.description().to_string(),
        avg_correlation,
        correlation_volatility: std_population(&upper),
        symbols_analyzed: symbols_requested,
        symbols_with_data: matrix.len(),
        timestamp: Utc::now(),
    })
}
