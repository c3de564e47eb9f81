//! # Flat posterior sample
//!
//! [`FlatPosteriorSample`] is the common representation every sampler backend is normalized
//! into: a `n_samples × n_dims` matrix of parameter values together with the parallel
//! log-posterior vector. Rows are unordered; columns follow the order of the
//! [`ParameterIndex`](crate::run_context::ParameterIndex) of the run.
//!
//! The row counts of the matrix and of the vector are equal by construction:
//! [`FlatPosteriorSample::new`] is the only way to build one.
use nalgebra::{DMatrix, DVector};

use crate::postfit_errors::PostfitError;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatPosteriorSample {
    chain: DMatrix<f64>,
    log_posterior: DVector<f64>,
}

impl FlatPosteriorSample {
    /// Pair a sample matrix with its log-posterior vector.
    ///
    /// Return
    /// ----------
    /// * [`PostfitError::DataFormat`] if the row counts differ.
    pub fn new(chain: DMatrix<f64>, log_posterior: DVector<f64>) -> Result<Self, PostfitError> {
        if chain.nrows() != log_posterior.len() {
            return Err(PostfitError::DataFormat(format!(
                "{} parameter rows but {} log-posterior values",
                chain.nrows(),
                log_posterior.len()
            )));
        }
        Ok(Self {
            chain,
            log_posterior,
        })
    }

    /// Build from row-major values (one `Vec` per sample).
    pub fn from_rows(rows: &[Vec<f64>], log_posterior: Vec<f64>) -> Result<Self, PostfitError> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            return Err(PostfitError::DataFormat(format!(
                "row {bad} has {} values, expected {ncols}",
                rows[bad].len()
            )));
        }
        let chain = DMatrix::from_row_iterator(rows.len(), ncols, rows.iter().flatten().copied());
        Self::new(chain, DVector::from_vec(log_posterior))
    }

    pub fn chain(&self) -> &DMatrix<f64> {
        &self.chain
    }

    pub fn log_posterior(&self) -> &DVector<f64> {
        &self.log_posterior
    }

    pub fn n_samples(&self) -> usize {
        self.chain.nrows()
    }

    pub fn n_dims(&self) -> usize {
        self.chain.ncols()
    }

    /// Copy of one sample row.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.chain.row(i).iter().copied().collect()
    }

    /// Copy of one parameter column.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.chain.column(j).iter().copied().collect()
    }
}
