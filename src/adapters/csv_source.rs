use crate::domain::model::{PricePoint, PriceSeries};
use crate::domain::ports::PriceSource;
use crate::utils::error::{AnalysisError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Close", default, deserialize_with = "nullable_close")]
    close: Option<f64>,
}

/// Yahoo 匯出的 CSV 以 `null` 表示缺值，與空白欄位同樣視為 None
fn nullable_close<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("null") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// 讀取 `{data_dir}/{symbol}.csv`，欄位為 date 與 close
#[derive(Debug, Clone)]
pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn file_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }
}

pub fn parse_price_csv(symbol: &str, data: &[u8]) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut points = Vec::new();
    for row in reader.deserialize::<PriceRow>() {
        let row = row?;
        // 空白收盤價（假日、停牌）直接略過
        if let Some(close) = row.close.filter(|c| c.is_finite()) {
            points.push(PricePoint {
                date: row.date,
                close,
            });
        }
    }

    Ok(PriceSeries::new(symbol, points))
}

impl PriceSource for CsvSource {
    async fn fetch_closes(&self, symbol: &str, window: usize) -> Result<PriceSeries> {
        let path = self.file_for(symbol);
        tracing::debug!("Reading prices for {} from {}", symbol, path.display());

        let data = tokio::fs::read(&path).await.map_err(|e| {
            AnalysisError::source_error(symbol, format!("cannot read {}: {}", path.display(), e))
        })?;

        Ok(parse_price_csv(symbol, &data)?.tail(window))
    }
}
