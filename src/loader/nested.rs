use super::{LoaderDiagnostics, NormalizedRun};
use crate::{posterior::FlatPosteriorSample, postfit_errors::PostfitError};

/// Where the log-posterior and the parameter block live in an equal-weight table.
///
/// * `logpost_column` – column holding the log-posterior; negative values count from the
///   end (`-1` is the last column).
/// * `params_start` – first parameter column. Parameters are every column from there to
///   the end of the row, the log-posterior column excepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub logpost_column: isize,
    pub params_start: usize,
}

impl ColumnLayout {
    /// MultiNest `post_equal_weights.dat`: parameters first, log-posterior last.
    pub const VARIANT_A: ColumnLayout = ColumnLayout {
        logpost_column: -1,
        params_start: 0,
    };

    /// PolyChord `<root>_equal_weights.txt`: weight, log-posterior, then parameters.
    pub const VARIANT_B: ColumnLayout = ColumnLayout {
        logpost_column: 1,
        params_start: 2,
    };

    fn resolve_logpost(&self, ncols: usize) -> Result<usize, PostfitError> {
        let resolved = if self.logpost_column < 0 {
            ncols as isize + self.logpost_column
        } else {
            self.logpost_column
        };
        if resolved < 0 || resolved as usize >= ncols {
            return Err(PostfitError::DataFormat(format!(
                "log-posterior column {} out of range for a {ncols}-column table",
                self.logpost_column
            )));
        }
        Ok(resolved as usize)
    }

    /// Column indices of the parameter block, checked against `ndim`.
    fn parameter_columns(
        &self,
        ncols: usize,
        ndim: usize,
    ) -> Result<(usize, Vec<usize>), PostfitError> {
        let logpost = self.resolve_logpost(ncols)?;
        let params: Vec<usize> = (self.params_start..ncols).filter(|&c| c != logpost).collect();
        if params.len() != ndim {
            return Err(PostfitError::DataFormat(format!(
                "table has {} parameter columns (of {ncols}), declared ndim = {ndim}",
                params.len()
            )));
        }
        Ok((logpost, params))
    }
}

/// Equal-weighted posterior table as read from disk, one `Vec` per row.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualWeightTable {
    pub rows: Vec<Vec<f64>>,
}

impl EqualWeightTable {
    pub fn n_columns(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Split every row into its parameter block and its log-posterior.
    ///
    /// Return
    /// ----------
    /// * The [`NormalizedRun`], or [`PostfitError::DataFormat`] if the table is empty, ragged,
    ///   or its parameter block does not hold exactly `ndim` columns.
    pub fn normalize(
        &self,
        ndim: usize,
        layout: ColumnLayout,
    ) -> Result<NormalizedRun, PostfitError> {
        let ncols = self.n_columns();
        if self.rows.is_empty() {
            return Err(PostfitError::DataFormat("empty equal-weight table".into()));
        }
        if let Some(bad) = self.rows.iter().position(|r| r.len() != ncols) {
            return Err(PostfitError::DataFormat(format!(
                "row {bad} has {} columns, expected {ncols}",
                self.rows[bad].len()
            )));
        }

        let (logpost, params) = layout.parameter_columns(ncols, ndim)?;
        let rows: Vec<Vec<f64>> = self
            .rows
            .iter()
            .map(|r| params.iter().map(|&c| r[c]).collect())
            .collect();
        let log_posterior = self.rows.iter().map(|r| r[logpost]).collect();

        let sample = FlatPosteriorSample::from_rows(&rows, log_posterior)?;
        log::info!(
            "Equal-weight table: {} samples, {} parameters",
            sample.n_samples(),
            ndim
        );
        Ok(NormalizedRun {
            diagnostics: LoaderDiagnostics::samples_only(sample.n_samples()),
            sample,
        })
    }
}
