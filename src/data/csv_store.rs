// External crates
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use parking_lot::RwLock;
use polars::prelude::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Internal modules
use super::{normalize_identifier, PricePoint, PriceRepository};
use crate::error::{PipelineError, Result};

const HEADER: &str = "identifier,price,utc_date_time";

/// Append-only CSV file of price points (`identifier,price,utc_date_time`)
#[derive(Debug)]
pub struct CsvPriceStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl CsvPriceStore {
    /// Open (and create, with its parent directories) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            std::fs::write(&path, format!("{}\n", HEADER))?;
        }
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column types as written by `save_price`; nothing is inferred
    fn schema() -> SchemaRef {
        Arc::new(Schema::from_iter([
            Field::new("identifier".into(), DataType::String),
            Field::new("price".into(), DataType::Float64),
            Field::new("utc_date_time".into(), DataType::String),
        ]))
    }

    fn read_all(&self) -> Result<Vec<PricePoint>> {
        let _guard = self.lock.read();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_schema(Some(Self::schema()))
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;
        if df.height() == 0 {
            return Ok(Vec::new());
        }

        let identifiers = df.column("identifier")?;
        let prices = df.column("price")?;
        let stamps = df.column("utc_date_time")?;

        let mut points = Vec::with_capacity(df.height());
        for ((identifier, price), stamp) in identifiers
            .str()?
            .into_iter()
            .zip(prices.f64()?.into_iter())
            .zip(stamps.str()?.into_iter())
        {
            let (Some(identifier), Some(price), Some(stamp)) = (identifier, price, stamp) else {
                continue;
            };
            let utc_date_time = DateTime::parse_from_rfc3339(stamp)
                .map_err(|e| {
                    PipelineError::Store(format!("bad timestamp '{}' in {}: {}", stamp, self.path.display(), e))
                })?
                .with_timezone(&Utc);
            points.push(PricePoint {
                identifier: identifier.to_string(),
                price,
                utc_date_time,
            });
        }

        points.sort_by_key(|p| p.utc_date_time);
        Ok(points)
    }
}

impl PriceRepository for CsvPriceStore {
    fn get_historical_prices(&self) -> Result<Vec<PricePoint>> {
        self.read_all()
    }

    fn get_historical_stock_data(&self, identifier: &str) -> Result<Vec<PricePoint>> {
        let identifier = normalize_identifier(identifier);
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|p| p.identifier == identifier)
            .collect())
    }

    fn save_price(&self, point: PricePoint) -> Result<()> {
        let _guard = self.lock.write();
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(
            file,
            "{},{},{}",
            point.identifier,
            point.price,
            point
                .utc_date_time
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        debug!(
            "Stored {} @ {} in {}",
            point.identifier,
            point.price,
            self.path.display()
        );
        Ok(())
    }
}
