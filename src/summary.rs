//! # Summary statistics and MAP
//!
//! Percentile-based credible intervals and maximum-a-posteriori selection over a
//! [`FlatPosteriorSample`].
//!
//! * [`summarize`] / [`summarize_columns`] – median and the two one-sided spreads
//!   `p84.135 − p50` (+sigma) and `p50 − p15.865` (−sigma). The percentiles are the
//!   Gaussian-equivalent ±1σ bounds, computed by exact linear interpolation between
//!   order statistics (no normal approximation).
//! * [`pick_map`] – row of maximum log-posterior, first occurrence on ties.
use std::fmt;

use nalgebra::DMatrix;

use crate::{
    constants::{P_HIGH, P_LOW, P_MED},
    posterior::FlatPosteriorSample,
    postfit_errors::PostfitError,
};

/// Percentile of already sorted data, linear interpolation between order statistics.
///
/// `q` is expressed in percent and clamped to `[0, 100]`. Empty input returns `NaN`.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let pos = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = pos.ceil() as usize;
    if i == j {
        return sorted[i];
    }
    // Lerp written so that equal neighbours return that value exactly.
    let (a, b) = (sorted[i], sorted[j]);
    let t = pos - i as f64;
    if t < 0.5 {
        a + (b - a) * t
    } else {
        b - (b - a) * (1.0 - t)
    }
}

/// Median and one-sided spreads of one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueSigma {
    pub median: f64,
    pub sigma_plus: f64,
    pub sigma_minus: f64,
}

impl ValueSigma {
    /// `true` when both spreads are exactly zero.
    pub fn is_zero_spread(&self) -> bool {
        self.sigma_plus == 0.0 && self.sigma_minus == 0.0
    }
}

/// Summarize one sample vector.
pub fn summarize(values: &[f64]) -> ValueSigma {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let low = percentile_sorted(&sorted, P_LOW);
    let median = percentile_sorted(&sorted, P_MED);
    let high = percentile_sorted(&sorted, P_HIGH);
    ValueSigma {
        median,
        sigma_plus: high - median,
        sigma_minus: median - low,
    }
}

/// Per-parameter summary, one [`ValueSigma`] per column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSummary {
    pub rows: Vec<ValueSigma>,
}

impl ParameterSummary {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn medians(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.median).collect()
    }

    /// Pair the summary with display names.
    pub fn named<'a>(&'a self, names: &'a [String]) -> NamedSummary<'a> {
        NamedSummary {
            names,
            summary: self,
        }
    }
}

/// Summarize every column of a matrix.
pub fn summarize_columns(matrix: &DMatrix<f64>) -> ParameterSummary {
    ParameterSummary {
        rows: matrix
            .column_iter()
            .map(|col| summarize(&col.iter().copied().collect::<Vec<f64>>()))
            .collect(),
    }
}

/// Summary table with names, for reports.
///
/// `{}` prints one compact line per parameter, `{:#}` an aligned table.
pub struct NamedSummary<'a> {
    names: &'a [String],
    summary: &'a ParameterSummary,
}

impl fmt::Display for NamedSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(String::len).max().unwrap_or(0);
        if f.alternate() {
            writeln!(
                f,
                "{:<width$}  {:>14} {:>14} {:>14}",
                "parameter", "median", "+sigma", "-sigma"
            )?;
            writeln!(f, "{}", "-".repeat(width + 47))?;
        }
        for (name, row) in self.names.iter().zip(&self.summary.rows) {
            if f.alternate() {
                writeln!(
                    f,
                    "{name:<width$}  {:>14.6} {:>14.6} {:>14.6}",
                    row.median, row.sigma_plus, row.sigma_minus
                )?;
            } else {
                writeln!(
                    f,
                    "{name} = {} +{} -{}",
                    row.median, row.sigma_plus, row.sigma_minus
                )?;
            }
        }
        Ok(())
    }
}

/// Maximum-a-posteriori sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEstimate {
    pub index: usize,
    pub parameters: Vec<f64>,
    pub log_posterior: f64,
}

/// Select the row of maximum log-posterior.
///
/// Ties resolve to the first occurring index; `NaN` values never win.
///
/// Return
/// ----------
/// * [`PostfitError::DataFormat`] if the sample is empty or holds no comparable value.
pub fn pick_map(sample: &FlatPosteriorSample) -> Result<MapEstimate, PostfitError> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &lp) in sample.log_posterior().iter().enumerate() {
        match best {
            Some((_, b)) if lp > b => best = Some((i, lp)),
            None if !lp.is_nan() => best = Some((i, lp)),
            _ => {}
        }
    }

    let (index, log_posterior) = best.ok_or_else(|| {
        PostfitError::DataFormat("no comparable log-posterior value to pick a MAP from".into())
    })?;
    Ok(MapEstimate {
        index,
        parameters: sample.row(index),
        log_posterior,
    })
}
