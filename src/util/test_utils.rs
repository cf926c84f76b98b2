// External imports
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Internal modules
use crate::data::{Observation, PriceFeed, PricePoint};
use crate::error::Result;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
}

/// Daily observations whose close rises by `step` each day from `start`
pub fn linear_observations(n: usize, start: f64, step: f64) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            Observation {
                timestamp: base_time() + Duration::days(i as i64),
                open: close - step / 2.0,
                high: close + step.abs(),
                low: close - step.abs(),
                close,
                volume: 1_000.0 + 10.0 * i as f64,
            }
        })
        .collect()
}

/// Daily observations following a seeded random walk of +-1% moves
pub fn random_walk_observations(n: usize, start: f64, seed: u64) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start;
    (0..n)
        .map(|i| {
            let movement = (rng.random::<f64>() * 2.0 - 1.0) * 0.01;
            let open = price;
            price *= 1.0 + movement;
            let high = open.max(price) * (1.0 + rng.random::<f64>() * 0.005);
            let low = open.min(price) * (1.0 - rng.random::<f64>() * 0.005);
            Observation {
                timestamp: base_time() + Duration::days(i as i64),
                open,
                high,
                low,
                close: price,
                volume: (rng.random::<u32>() % 100_000 + 10_000) as f64,
            }
        })
        .collect()
}

/// Stored price points for `identifier` following a linear trend
pub fn linear_price_points(identifier: &str, n: usize, start: f64, step: f64) -> Vec<PricePoint> {
    (0..n)
        .map(|i| PricePoint {
            identifier: identifier.to_string(),
            price: start + step * i as f64,
            utc_date_time: base_time() + Duration::days(i as i64),
        })
        .collect()
}

/// Feed that serves a fixed series, filtered to the requested range
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    pub observations: Vec<Observation>,
}

impl StaticFeed {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }
}

impl PriceFeed for StaticFeed {
    fn fetch_daily(&self, _symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>> {
        Ok(self
            .observations
            .iter()
            .filter(|o| {
                let day = o.timestamp.date_naive();
                day >= start && day < end
            })
            .copied()
            .collect())
    }
}
