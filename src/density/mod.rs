//! # Density reduction
//!
//! Reduces the full posterior (sampled parameters, free derived quantities and the
//! log-posterior) into binned 1D/2D densities for external plotting tools.
//!
//! Per variable:
//!
//! 1. zero spread (`+σ = −σ = 0`) → [`SkipReason::ZeroSpread`],
//! 2. range from samples strictly within `(median − 5σ₋, median + 5σ₊)`, falling back to the
//!    full range when that collapses, [`SkipReason::CollapsedRange`] if it still does,
//! 3. 30 bins (31 `linspace` edges) over that range, counts divided by the sample count.
//!
//! Every ordered pair `(i, j)`, `i ≠ j`, of retained variables gets a 2D histogram on the
//! variables' own edges, normalized by its peak cell.
//!
//! Variables and pairs are computed in parallel with `rayon`; results are ordered as the
//! input variables regardless of scheduling.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use orbpost::density::{DensityConfig, DensityInput};
//!
//! # fn demo(input: DensityInput) -> Result<(), orbpost::postfit_errors::PostfitError> {
//! let config = DensityConfig::builder().bins(30).clip_sigmas(5.0).build()?;
//! let reduction = input.reduce(&config);
//! reduction.export(Utf8Path::new("out/density"))?;
//! # Ok(()) }
//! ```
pub mod export;
pub mod histogram;
pub mod input;

use std::{cmp::Ordering::Greater, fmt};

use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    constants::{CLIP_SIGMAS, HIST_BINS},
    postfit_errors::PostfitError,
    summary::ValueSigma,
};
pub use export::DensityExports;
pub use histogram::{Hist1d, Hist2d};
pub use input::DensityInput;

/// Why a variable produced no density output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Both one-sided spreads are exactly zero.
    ZeroSpread,
    /// Both the clipped and the full range collapse to a single value.
    CollapsedRange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ZeroSpread => write!(f, "zero spread"),
            SkipReason::CollapsedRange => write!(f, "collapsed range"),
        }
    }
}

/// Histogram settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityConfig {
    /// Number of bins per variable (edges = bins + 1).
    pub bins: usize,
    /// Clip half-width in units of the one-sided sigma.
    pub clip_sigmas: f64,
    /// Compute the 2D pair histograms.
    pub pairs: bool,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            bins: HIST_BINS,
            clip_sigmas: CLIP_SIGMAS,
            pairs: true,
        }
    }
}

impl DensityConfig {
    pub fn builder() -> DensityConfigBuilder {
        DensityConfigBuilder::default()
    }
}

/// Builder for [`DensityConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct DensityConfigBuilder {
    config: DensityConfig,
}

impl DensityConfigBuilder {
    pub fn bins(mut self, v: usize) -> Self {
        self.config.bins = v;
        self
    }
    pub fn clip_sigmas(mut self, v: f64) -> Self {
        self.config.clip_sigmas = v;
        self
    }
    pub fn pairs(mut self, v: bool) -> Self {
        self.config.pairs = v;
        self
    }

    /// Finalize the configuration.
    ///
    /// Validation rules
    /// -----------------
    /// * `bins >= 1`
    /// * `clip_sigmas > 0` (NaN rejected)
    pub fn build(self) -> Result<DensityConfig, PostfitError> {
        let c = &self.config;
        if c.bins == 0 {
            return Err(PostfitError::InvalidParameter(
                "histograms need at least one bin".into(),
            ));
        }
        if c.clip_sigmas.partial_cmp(&0.0) != Some(Greater) {
            return Err(PostfitError::InvalidParameter(
                "clip_sigmas must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Reduction outcome of one variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableOutcome {
    Histogram(Hist1d),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDensity {
    pub name: String,
    pub summary: ValueSigma,
    pub outcome: VariableOutcome,
}

impl VariableDensity {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, VariableOutcome::Skipped(_))
    }

    /// The 1D histogram, or [`PostfitError::DegenerateDistribution`] for a skipped variable.
    pub fn histogram(&self) -> Result<&Hist1d, PostfitError> {
        match &self.outcome {
            VariableOutcome::Histogram(h) => Ok(h),
            VariableOutcome::Skipped(reason) => Err(PostfitError::DegenerateDistribution(
                format!("{}: {reason}", self.name),
            )),
        }
    }
}

/// Full density reduction of a [`DensityInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct DensityReduction {
    /// One entry per input variable, input order.
    pub variables: Vec<VariableDensity>,
    /// One entry per ordered pair of retained variables.
    pub pairs: Vec<Hist2d>,
}

impl DensityReduction {
    pub fn retained(&self) -> impl Iterator<Item = (&VariableDensity, &Hist1d)> {
        self.variables.iter().filter_map(|v| match &v.outcome {
            VariableOutcome::Histogram(h) => Some((v, h)),
            VariableOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, SkipReason)> {
        self.variables.iter().filter_map(|v| match v.outcome {
            VariableOutcome::Skipped(r) => Some((v.name.as_str(), r)),
            VariableOutcome::Histogram(_) => None,
        })
    }

    pub fn pair(&self, x: &str, y: &str) -> Option<&Hist2d> {
        self.pairs.iter().find(|p| p.x_name == x && p.y_name == y)
    }
}

/// Reduce every column of `input`.
pub fn reduce(input: &DensityInput, config: &DensityConfig) -> DensityReduction {
    let columns: Vec<Vec<f64>> = (0..input.len()).map(|j| input.column(j)).collect();

    let variables: Vec<VariableDensity> = columns
        .par_iter()
        .zip(input.names().par_iter())
        .zip(input.summary().rows.par_iter())
        .map(|((values, name), summary)| {
            let outcome = match histogram::clipped_range(values, summary, config.clip_sigmas) {
                Ok((lo, hi)) => VariableOutcome::Histogram(Hist1d::compute(
                    values,
                    histogram::linspace(lo, hi, config.bins + 1),
                )),
                Err(reason) => {
                    log::warn!("Density of '{name}' skipped: {reason}");
                    VariableOutcome::Skipped(reason)
                }
            };
            VariableDensity {
                name: name.clone(),
                summary: *summary,
                outcome,
            }
        })
        .collect();

    let pairs = if config.pairs {
        let retained: Vec<usize> = variables
            .iter()
            .positions(|v| !v.is_skipped())
            .collect();
        let ordered_pairs: Vec<(usize, usize)> = retained
            .iter()
            .cartesian_product(retained.iter())
            .filter(|(i, j)| i != j)
            .map(|(&i, &j)| (i, j))
            .collect();

        ordered_pairs
            .par_iter()
            .filter_map(|&(i, j)| {
                let (VariableOutcome::Histogram(hx), VariableOutcome::Histogram(hy)) =
                    (&variables[i].outcome, &variables[j].outcome)
                else {
                    return None;
                };
                Some(Hist2d::compute(
                    (variables[i].name.as_str(), columns[i].as_slice(), hx.edges.as_slice()),
                    (variables[j].name.as_str(), columns[j].as_slice(), hy.edges.as_slice()),
                ))
            })
            .collect()
    } else {
        Vec::new()
    };

    log::info!(
        "Density reduction: {} variables, {} skipped, {} pairs",
        variables.len(),
        variables.iter().filter(|v| v.is_skipped()).count(),
        pairs.len()
    );
    DensityReduction { variables, pairs }
}
