use crate::core::returns::{pearson, ReturnsFrame};
use crate::domain::model::CorrelationMatrix;

/// Pairwise Pearson correlation over aligned returns; the diagonal is always 1.0.
pub fn correlation_matrix(frame: &ReturnsFrame) -> CorrelationMatrix {
    let columns: Vec<&[f64]> = frame.columns().map(|(_, c)| c).collect();
    let n = columns.len();
    let mut values = vec![vec![0.0; n]; n];

    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(columns[i], columns[j]).clamp(-1.0, 1.0);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        symbols: frame.symbols().to_vec(),
        values,
    }
}

/// Correlation of `leader[t - lag]` with `follower[t]`.
pub fn lagged_correlation(leader: &[f64], follower: &[f64], lag: usize) -> f64 {
    let n = leader.len().min(follower.len());
    if lag >= n.saturating_sub(1) {
        return 0.0;
    }
    pearson(&leader[..n - lag], &follower[lag..n]).clamp(-1.0, 1.0)
}
