// External crates
use chrono::{DateTime, Utc};
use log::debug;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::{
    CLOSE_ONLY_FEATURES, RSI_WINDOW, SMA_LONG_WINDOW, SMA_SHORT_WINDOW, TECHNICAL_INDICATORS,
};
use crate::data::Observation;
use crate::error::{PipelineError, Result};
use crate::util::pre_processor::observations_to_dataframe;

/// Which columns feed the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// close, sma_20, sma_50, rsi_14, volume
    Technical,
    /// close only
    CloseOnly,
}

impl FeatureSet {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            FeatureSet::Technical => &TECHNICAL_INDICATORS[..],
            FeatureSet::CloseOnly => &CLOSE_ONLY_FEATURES[..],
        }
    }

    pub fn n_features(&self) -> usize {
        self.columns().len()
    }

    /// Observations needed before the first complete feature row
    pub fn min_observations(&self) -> usize {
        match self {
            FeatureSet::Technical => SMA_LONG_WINDOW,
            FeatureSet::CloseOnly => 1,
        }
    }
}

/// Feature rows aligned with the timestamps they were computed for
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: Vec<String>,
    /// Row-major `(rows, features)`
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Close of the most recent row
    pub fn last_close(&self) -> Option<f64> {
        let close = self.columns.iter().position(|c| c == "close")?;
        self.values.rows().into_iter().last().map(|row| row[close])
    }
}

fn trailing_window(window: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: false,
        weights: None,
        fn_params: None,
    }
}

/// Trailing simple moving average; null until the window is full
pub fn calculate_sma(df: &DataFrame, column: &str, window: usize) -> PolarsResult<Series> {
    let series = df.column(column)?.f64()?.clone().into_series();

    if series.len() < window {
        return Err(PolarsError::ComputeError(
            format!("Not enough data points ({}) for SMA window ({})", series.len(), window).into(),
        ));
    }

    let sma = series.rolling_mean(trailing_window(window))?;
    Ok(sma.with_name(format!("sma_{}", window).into()))
}

/// Relative Strength Index over `window` periods
///
/// The first delta counts as 0. A zero average loss yields 0 instead of a
/// division artifact.
pub fn calculate_rsi(df: &DataFrame, window: usize) -> PolarsResult<Series> {
    let close = df.column("close")?.f64()?;

    let mut gains = Vec::with_capacity(close.len());
    let mut losses = Vec::with_capacity(close.len());
    let mut prev: Option<f64> = None;
    for curr in close.into_iter() {
        let change = match (prev, curr) {
            (Some(p), Some(c)) => c - p,
            _ => 0.0,
        };
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
        prev = curr;
    }

    let avg_gain = Series::new("gains".into(), gains).rolling_mean(trailing_window(window))?;
    let avg_loss = Series::new("losses".into(), losses).rolling_mean(trailing_window(window))?;

    let rsi: Vec<Option<f64>> = avg_gain
        .f64()?
        .into_iter()
        .zip(avg_loss.f64()?.into_iter())
        .map(|(g, l)| match (g, l) {
            (Some(_), Some(l)) if l == 0.0 => Some(0.0),
            (Some(g), Some(l)) => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect();

    Ok(Series::new(format!("rsi_{}", window).into(), rsi))
}

/// Appends sma_20, sma_50 and rsi_14, then drops warm-up rows
pub fn add_technical_indicators(df: &DataFrame) -> PolarsResult<DataFrame> {
    let sma_short = calculate_sma(df, "close", SMA_SHORT_WINDOW)?;
    let sma_long = calculate_sma(df, "close", SMA_LONG_WINDOW)?;
    let rsi = calculate_rsi(df, RSI_WINDOW)?;

    let with_indicators = df.hstack(&[sma_short.into(), sma_long.into(), rsi.into()])?;
    with_indicators.drop_nulls::<String>(None)
}

/// Builds the feature matrix for `feature_set` from raw observations.
///
/// Observations are ordered and cleaned first. Fails with `InsufficientData`
/// when no row has full indicator lookback.
pub fn build_feature_matrix(
    observations: &[Observation],
    feature_set: FeatureSet,
) -> Result<FeatureMatrix> {
    let df = observations_to_dataframe(observations)?;
    let required = feature_set.min_observations();
    if df.height() < required {
        return Err(PipelineError::insufficient(required, df.height()));
    }

    let df = match feature_set {
        FeatureSet::Technical => add_technical_indicators(&df)?,
        FeatureSet::CloseOnly => df,
    };
    if df.height() == 0 {
        return Err(PipelineError::insufficient(required, 0));
    }

    let timestamps = df
        .column("timestamp")?
        .i64()?
        .into_iter()
        .map(|ms| {
            ms.and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| PipelineError::InvalidInput("timestamp out of range".into()))
        })
        .collect::<Result<Vec<_>>>()?;

    let columns = feature_set.columns();
    let mut values = Array2::<f64>::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        for (i, value) in df.column(name)?.f64()?.into_iter().enumerate() {
            values[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }

    debug!(
        "Built {:?} feature matrix: {} rows from {} observations",
        feature_set,
        df.height(),
        observations.len()
    );

    Ok(FeatureMatrix {
        timestamps,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values,
    })
}
