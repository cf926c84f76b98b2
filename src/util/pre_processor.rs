// External crates
use polars::prelude::*;

// Internal modules
use crate::data::Observation;

/// Orders observations by time and drops bars with non-finite values
pub fn prepare_observations(observations: &[Observation]) -> Vec<Observation> {
    let mut rows: Vec<Observation> = observations
        .iter()
        .filter(|o| {
            [o.open, o.high, o.low, o.close, o.volume]
                .iter()
                .all(|v| v.is_finite())
        })
        .copied()
        .collect();
    rows.sort_by_key(|o| o.timestamp);
    rows
}

/// Loads observations into a DataFrame
///
/// Columns: `timestamp` (epoch milliseconds), `open`, `high`, `low`, `close`,
/// `volume`. Rows are sorted by timestamp and rows with nulls dropped.
pub fn observations_to_dataframe(observations: &[Observation]) -> PolarsResult<DataFrame> {
    let rows = prepare_observations(observations);

    let timestamp: Vec<i64> = rows.iter().map(|o| o.timestamp.timestamp_millis()).collect();
    let open: Vec<f64> = rows.iter().map(|o| o.open).collect();
    let high: Vec<f64> = rows.iter().map(|o| o.high).collect();
    let low: Vec<f64> = rows.iter().map(|o| o.low).collect();
    let close: Vec<f64> = rows.iter().map(|o| o.close).collect();
    let volume: Vec<f64> = rows.iter().map(|o| o.volume).collect();

    let mut df = DataFrame::new(vec![
        Series::new("timestamp".into(), timestamp).into(),
        Series::new("open".into(), open).into(),
        Series::new("high".into(), high).into(),
        Series::new("low".into(), low).into(),
        Series::new("close".into(), close).into(),
        Series::new("volume".into(), volume).into(),
    ])?;

    df = df.sort(vec!["timestamp"], SortMultipleOptions::default())?;
    df = df.drop_nulls::<String>(None)?;

    Ok(df)
}
