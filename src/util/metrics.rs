use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Regression error metrics over paired true/predicted values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; entries whose true value is 0 are left out
    pub mape: f64,
}

/// MAE, RMSE and MAPE of `y_pred` against `y_true`.
///
/// Rejects empty or mismatched inputs, and inputs where every true value is 0
/// (MAPE has no defined term).
pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Result<Metrics> {
    if y_true.is_empty() {
        return Err(PipelineError::MetricUndefined("no values to evaluate".into()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::MetricUndefined(format!(
            "{} true values against {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }

    let n = y_true.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_terms = 0usize;

    for (&t, &p) in y_true.iter().zip(y_pred) {
        let err = t - p;
        abs_sum += err.abs();
        sq_sum += err * err;
        if t != 0.0 {
            pct_sum += (err / t).abs();
            pct_terms += 1;
        }
    }

    if pct_terms == 0 {
        return Err(PipelineError::MetricUndefined(
            "MAPE is undefined when every true value is 0".into(),
        ));
    }

    Ok(Metrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        mape: pct_sum / pct_terms as f64 * 100.0,
    })
}
