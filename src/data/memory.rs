// External crates
use parking_lot::RwLock;

// Internal modules
use super::{normalize_identifier, PricePoint, PriceRepository};
use crate::error::Result;

/// Process-local price history, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    points: RwLock<Vec<PricePoint>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(points: Vec<PricePoint>) -> Self {
        Self {
            points: RwLock::new(points),
        }
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }
}

impl PriceRepository for InMemoryRepository {
    fn get_historical_prices(&self) -> Result<Vec<PricePoint>> {
        let mut points = self.points.read().clone();
        points.sort_by_key(|p| p.utc_date_time);
        Ok(points)
    }

    fn get_historical_stock_data(&self, identifier: &str) -> Result<Vec<PricePoint>> {
        let identifier = normalize_identifier(identifier);
        let mut points: Vec<PricePoint> = self
            .points
            .read()
            .iter()
            .filter(|p| p.identifier == identifier)
            .cloned()
            .collect();
        points.sort_by_key(|p| p.utc_date_time);
        Ok(points)
    }

    fn save_price(&self, point: PricePoint) -> Result<()> {
        self.points.write().push(point);
        Ok(())
    }
}
