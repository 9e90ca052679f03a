use crate::domain::model::{PricePoint, PriceSeries};
use crate::domain::ports::PriceSource;
use crate::utils::error::{AnalysisError, Result};
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_USER_AGENT: &str = "intermarket/0.1";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

/// 交易所時區相對 UTC 的秒數 (倫敦夏令時間為 3600)
#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Daily closes from a Yahoo-style chart API (`/v8/finance/chart/{symbol}`).
#[derive(Debug, Clone)]
pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 預設逾時與 User-Agent
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(base_url, Duration::from_secs(30), DEFAULT_USER_AGENT)
    }

    fn chart_url(&self, symbol: &str, window: usize) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| AnalysisError::ConfigError {
            message: format!("Invalid price endpoint '{}': {}", self.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| AnalysisError::ConfigError {
                message: format!("Price endpoint '{}' cannot be a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", &format!("{}d", window))
            .append_pair("interval", "1d");
        Ok(url)
    }
}

fn parse_chart(symbol: &str, body: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = body.chart.error {
        return Err(AnalysisError::source_error(
            symbol,
            format!(
                "{}: {}",
                err.code.unwrap_or_else(|| "error".to_string()),
                err.description.unwrap_or_default()
            ),
        ));
    }

    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AnalysisError::source_error(symbol, "chart response has no result"))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    // 日線時間戳記是交易所當地的開盤時刻，換成當地日期才能跨市場對齊
    let offset = result.meta.gmtoffset;
    let points = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(ts.checked_add(offset)?, 0)?.date_naive();
            Some(PricePoint { date, close })
        })
        .collect();

    Ok(PriceSeries::new(symbol, points))
}

impl PriceSource for YahooSource {
    async fn fetch_closes(&self, symbol: &str, window: usize) -> Result<PriceSeries> {
        let url = self.chart_url(symbol, window)?;
        tracing::debug!("Requesting chart data: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        tracing::debug!("Chart response status for {}: {}", symbol, status);

        if !status.is_success() {
            return Err(AnalysisError::source_error(symbol, format!("HTTP {}", status)));
        }

        let body: ChartResponse = response.json().await?;
        Ok(parse_chart(symbol, body)?.tail(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn chart_body(timestamps: &[i64], closes: &[Option<f64>]) -> serde_json::Value {
        serde_json::json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "EURUSD=X"},
                    "timestamp": timestamps,
                    "indicators": {"quote": [{"close": closes}]}
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_chart_url_contains_symbol_and_range() {
        let source = YahooSource::with_base_url("http://localhost:9000/").unwrap();
        let url = source.chart_url("^GSPC", 252).unwrap();
        assert!(url.path().starts_with("/v8/finance/chart/"));
        assert!(url.path().ends_with("GSPC"));
        assert_eq!(url.query(), Some("range=252d&interval=1d"));
    }

    #[tokio::test]
    async fn test_fetch_closes_drops_nulls() {
        let server = MockServer::start();
        // 2024-01-02, 01-03, 01-04 (UTC)
        let body = chart_body(
            &[1704182400, 1704268800, 1704355200],
            &[Some(1.10), None, Some(1.12)],
        );
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path_contains("/v8/finance/chart/EURUSD")
                .query_param("interval", "1d");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(body);
        });

        let source = YahooSource::with_base_url(&server.base_url()).unwrap();
        let series = source.fetch_closes("EURUSD=X", 30).await.unwrap();

        api_mock.assert();
        assert_eq!(series.symbol, "EURUSD=X");
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].date.to_string(), "2024-01-02");
        assert_eq!(series.points[1].close, 1.12);
    }

    #[tokio::test]
    async fn test_session_dates_use_exchange_offset() {
        let server = MockServer::start();
        // 同一個交易日 2024-07-01：外匯 23:00Z 前一天 (BST +1h)，美股 13:30Z (EDT -4h)
        let fx_mock = server.mock(|when, then| {
            when.method(GET).path_contains("/v8/finance/chart/EURUSD");
            then.status(200).json_body(serde_json::json!({
                "chart": {
                    "result": [{
                        "meta": {"symbol": "EURUSD=X", "gmtoffset": 3600},
                        "timestamp": [1719788400, 1719874800],
                        "indicators": {"quote": [{"close": [1.07, 1.08]}]}
                    }],
                    "error": null
                }
            }));
        });
        let index_mock = server.mock(|when, then| {
            when.method(GET).path_contains("GSPC");
            then.status(200).json_body(serde_json::json!({
                "chart": {
                    "result": [{
                        "meta": {"symbol": "^GSPC", "gmtoffset": -14400},
                        "timestamp": [1719840600, 1719927000],
                        "indicators": {"quote": [{"close": [5475.0, 5509.0]}]}
                    }],
                    "error": null
                }
            }));
        });

        let source = YahooSource::with_base_url(&server.base_url()).unwrap();
        let fx = source.fetch_closes("EURUSD=X", 30).await.unwrap();
        let index = source.fetch_closes("^GSPC", 30).await.unwrap();

        fx_mock.assert();
        index_mock.assert();
        let fx_dates: Vec<String> = fx.points.iter().map(|p| p.date.to_string()).collect();
        let index_dates: Vec<String> = index.points.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(fx_dates, vec!["2024-07-01", "2024-07-02"]);
        assert_eq!(fx_dates, index_dates);
    }

    #[tokio::test]
    async fn test_fetch_closes_http_error() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path_contains("/v8/finance/chart/");
            then.status(404);
        });

        let source = YahooSource::with_base_url(&server.base_url()).unwrap();
        let result = source.fetch_closes("NOPE", 30).await;

        api_mock.assert();
        assert!(matches!(result, Err(AnalysisError::SourceError { .. })));
    }

    #[tokio::test]
    async fn test_fetch_closes_chart_error_object() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path_contains("/v8/finance/chart/");
            then.status(200).json_body(serde_json::json!({
                "chart": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
                }
            }));
        });

        let source = YahooSource::with_base_url(&server.base_url()).unwrap();
        let err = source.fetch_closes("DELISTED", 30).await.unwrap_err();

        api_mock.assert();
        assert!(err.to_string().contains("Not Found"));
    }
}
