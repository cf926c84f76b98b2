//! Price data types and the two ports the pipeline reads from.
//!
//! `PriceRepository` is the persisted history (queried by identifier, appended
//! by the `/stocks/data` route); `PriceFeed` is the external market-data source
//! used by `/predict`. Both are plain traits resolved at compile time: the
//! service is generic over its adapters.

// External crates
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// Internal modules
use crate::error::{PipelineError, Result};

pub mod csv_store;
pub mod memory;
pub mod yahoo;

pub use csv_store::CsvPriceStore;
pub use memory::InMemoryRepository;
pub use yahoo::YahooFinanceFeed;

/// One trading period of raw market data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Observation {
    /// Observation carrying a single traded price (no range, no volume)
    pub fn from_price(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

/// A stored price for one identifier at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub identifier: String,
    pub price: f64,
    pub utc_date_time: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(identifier: &str, price: f64, utc_date_time: DateTime<Utc>) -> Result<Self> {
        let identifier = normalize_identifier(identifier);
        if identifier.is_empty() {
            return Err(PipelineError::InvalidInput("identifier must not be empty".into()));
        }
        if identifier.contains(&[',', '"', '\n', '\r'][..]) {
            return Err(PipelineError::InvalidInput(format!(
                "identifier '{}' contains reserved characters",
                identifier
            )));
        }
        if !price.is_finite() {
            return Err(PipelineError::InvalidInput(format!("price {} is not finite", price)));
        }
        Ok(Self {
            identifier,
            price,
            utc_date_time,
        })
    }
}

impl From<&PricePoint> for Observation {
    fn from(point: &PricePoint) -> Self {
        Observation::from_price(point.utc_date_time, point.price)
    }
}

/// Query/command port over the stored price history.
///
/// Both getters return points ordered by `utc_date_time` ascending.
pub trait PriceRepository: Send + Sync {
    /// Every stored price, all identifiers interleaved by time
    fn get_historical_prices(&self) -> Result<Vec<PricePoint>>;

    /// Stored prices for one (normalized) identifier
    fn get_historical_stock_data(&self, identifier: &str) -> Result<Vec<PricePoint>>;

    /// Append one price point
    fn save_price(&self, point: PricePoint) -> Result<()>;
}

/// Source of daily OHLCV bars for a symbol
pub trait PriceFeed: Send + Sync {
    /// Daily bars in `[start, end)`, ascending
    fn fetch_daily(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Observation>>;
}

/// Identifiers are compared trimmed and upper-cased
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::InvalidInput(format!("invalid date '{}': {}", raw, e)))
}

/// Parse a UTC instant given as RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
pub fn parse_utc_date_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(PipelineError::InvalidInput(format!(
        "invalid utc_date_time '{}'",
        raw
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_utc_date_time_formats() {
        let rfc = parse_utc_date_time("2024-03-01T15:30:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 13);

        let spaced = parse_utc_date_time("2024-03-01 15:30:00").unwrap();
        assert_eq!(spaced.hour(), 15);

        let day = parse_utc_date_time(" 2024-03-01 ").unwrap();
        assert_eq!(day.day(), 1);
        assert_eq!(day.hour(), 0);

        assert!(parse_utc_date_time("yesterday").is_err());
    }

    #[test]
    fn test_price_point_normalizes_identifier() {
        let point = PricePoint::new("  petr4 ", 31.5, Utc::now()).unwrap();
        assert_eq!(point.identifier, "PETR4");

        assert!(PricePoint::new("   ", 1.0, Utc::now()).is_err());
        assert!(PricePoint::new("A,B", 1.0, Utc::now()).is_err());
        assert!(PricePoint::new("AAPL", f64::NAN, Utc::now()).is_err());
    }
}
