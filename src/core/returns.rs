use crate::domain::model::PriceSeries;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Simple returns `(p[t] - p[t-1]) / p[t-1]`; one element shorter than the input.
pub fn pct_change(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn std_population(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Pearson correlation; 0.0 when either side is constant or the inputs are empty.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }

    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Daily returns aligned on the dates every symbol traded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsFrame {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    columns: Vec<Vec<f64>>,
}

impl ReturnsFrame {
    pub fn from_prices(series: &[PriceSeries]) -> Self {
        let series: Vec<&PriceSeries> = series.iter().filter(|s| !s.is_empty()).collect();
        if series.is_empty() {
            return Self::empty();
        }

        // 只保留所有代號都有收盤價的日期
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
        for (col, s) in series.iter().enumerate() {
            for point in &s.points {
                by_date
                    .entry(point.date)
                    .or_insert_with(|| vec![None; series.len()])[col] = Some(point.close);
            }
        }

        let mut dates = Vec::new();
        let mut prices: Vec<Vec<f64>> = vec![Vec::new(); series.len()];
        for (date, row) in by_date {
            if row.iter().all(Option::is_some) {
                dates.push(date);
                for (col, value) in row.into_iter().enumerate() {
                    prices[col].push(value.unwrap_or_default());
                }
            }
        }

        let raw: Vec<Vec<f64>> = prices.iter().map(|p| pct_change(p)).collect();
        let raw_dates = dates.into_iter().skip(1);

        // 任一欄非有限值（價格為 0 等）就整列丟棄
        let mut kept_dates = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); series.len()];
        for (row, date) in raw_dates.enumerate() {
            if raw.iter().all(|c| c[row].is_finite()) {
                kept_dates.push(date);
                for (col, values) in raw.iter().enumerate() {
                    columns[col].push(values[row]);
                }
            }
        }

        Self {
            symbols: series.iter().map(|s| s.symbol.clone()).collect(),
            dates: kept_dates,
            columns,
        }
    }

    pub fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            dates: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of aligned return rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        let idx = self.symbols.iter().position(|s| s == symbol)?;
        Some(&self.columns[idx])
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PricePoint;

    fn series(symbol: &str, closes: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            closes
                .iter()
                .map(|&(d, close)| PricePoint {
                    date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
                    close,
                })
                .collect(),
        )
    }

    #[test]
    fn test_pct_change() {
        let r = pct_change(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
        assert!(pct_change(&[1.0]).is_empty());
    }

    #[test]
    fn test_pearson_perfect_and_constant() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let z = [-1.0, -2.0, -3.0, -4.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[5.0; 4]), 0.0);
        assert_eq!(pearson(&[], &[]), 0.0);
    }

    #[test]
    fn test_std_population() {
        assert!((std_population(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
        assert_eq!(std_population(&[]), 0.0);
    }

    #[test]
    fn test_frame_aligns_on_common_dates() {
        let a = series("A", &[(1, 100.0), (2, 101.0), (3, 102.0), (4, 103.0)]);
        // B 缺 3 號
        let b = series("B", &[(1, 50.0), (2, 51.0), (4, 52.0), (5, 53.0)]);
        let frame = ReturnsFrame::from_prices(&[a, b]);

        assert_eq!(frame.symbols(), &["A".to_string(), "B".to_string()]);
        // 共同日期 1, 2, 4 → 兩筆報酬
        assert_eq!(frame.len(), 2);
        let a_returns = frame.column("A").unwrap();
        assert!((a_returns[0] - 0.01).abs() < 1e-12);
        assert!((a_returns[1] - (103.0 / 101.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_frame_drops_non_finite_rows_and_empty_series() {
        let a = series("A", &[(1, 0.0), (2, 1.0), (3, 2.0)]);
        let b = series("B", &[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let empty = series("C", &[]);
        let frame = ReturnsFrame::from_prices(&[a, b, empty]);

        assert_eq!(frame.symbols().len(), 2);
        assert_eq!(frame.len(), 1);
        assert!(frame.column("C").is_none());
    }

    #[test]
    fn test_frame_from_nothing_is_empty() {
        let frame = ReturnsFrame::from_prices(&[]);
        assert!(frame.is_empty());
        assert!(frame.symbols().is_empty());
    }
}
