// External crates
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::Deserialize;

// Internal modules
use super::{Observation, PriceFeed};
use crate::error::{PipelineError, Result};

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Daily bars from the Yahoo Finance v8 chart endpoint
#[derive(Debug, Clone)]
pub struct YahooFinanceFeed {
    base_url: String,
}

impl Default for YahooFinanceFeed {
    fn default() -> Self {
        Self::new(DEFAULT_YAHOO_BASE_URL)
    }
}

impl YahooFinanceFeed {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<String> {
        let period1 = midnight_utc(start)?.timestamp();
        let period2 = midnight_utc(end)?.timestamp();
        Ok(format!(
            "{}/v8/finance/chart/{}?interval=1d&period1={}&period2={}&events=history",
            self.base_url, symbol, period1, period2
        ))
    }
}

impl PriceFeed for YahooFinanceFeed {
    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>> {
        let url = self.chart_url(symbol, start, end)?;
        info!("Fetching {} daily bars from {} to {}", symbol, start, end);
        debug!("GET {}", url);

        // The blocking client owns a runtime thread; build it on the calling
        // (blocking) thread and drop it there.
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("stocks-guru/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Feed(e.to_string()))?;
        let body = client
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| PipelineError::Feed(format!("request for {} failed: {}", symbol, e)))?;

        let observations = parse_chart(&body, end)?;
        info!("Fetched {} bars for {}", observations.len(), symbol);
        Ok(observations)
    }
}

fn midnight_utc(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| PipelineError::InvalidInput(format!("invalid date {}", date)))
}

/// Decode a chart payload into ascending observations strictly before `end`.
///
/// Bars with any missing OHLC value are skipped; a missing volume reads as 0.
pub(crate) fn parse_chart(body: &str, end: NaiveDate) -> Result<Vec<Observation>> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Feed(format!("unexpected chart payload: {}", e)))?;

    if let Some(error) = response.chart.error {
        return Err(PipelineError::Feed(format!("{}: {}", error.code, error.description)));
    }

    let Some(data) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let cutoff = midnight_utc(end)?;
    let mut observations = Vec::with_capacity(data.timestamp.len());
    for (i, &ts) in data.timestamp.iter().enumerate() {
        let value = |series: &Vec<Option<f64>>| series.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            value(&quote.open),
            value(&quote.high),
            value(&quote.low),
            value(&quote.close),
        ) else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        if timestamp >= cutoff {
            continue;
        }
        observations.push(Observation {
            timestamp,
            open,
            high,
            low,
            close,
            volume: value(&quote.volume).unwrap_or(0.0),
        });
    }

    observations.sort_by_key(|o| o.timestamp);
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704292200, 1704205800, 1704378600, 1704465000],
                "indicators": {"quote": [{
                    "open":   [11.0, 10.0, null, 13.0],
                    "high":   [11.5, 10.5, 12.5, 13.5],
                    "low":    [10.5,  9.5, 11.5, 12.5],
                    "close":  [11.2, 10.2, 12.2, 13.2],
                    "volume": [2000, null, 3000, 4000]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_orders_and_filters_bars() {
        let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let bars = parse_chart(PAYLOAD, end).unwrap();

        // null open dropped, 2024-01-05 excluded by the exclusive end
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.2);
        assert_eq!(bars[0].volume, 0.0);
        assert_eq!(bars[1].close, 11.2);
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[test]
    fn test_parse_chart_surfaces_api_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let end = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        match parse_chart(body, end) {
            Err(PipelineError::Feed(msg)) => assert!(msg.contains("delisted")),
            other => panic!("expected feed error, got {:?}", other),
        }
    }

    #[test]
    fn test_chart_url_uses_exclusive_period() {
        let feed = YahooFinanceFeed::new("http://localhost:9999/");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let url = feed.chart_url("AAPL", start, end).unwrap();
        assert_eq!(
            url,
            "http://localhost:9999/v8/finance/chart/AAPL?interval=1d&period1=1704067200&period2=1704153600&events=history"
        );
    }
}
