//! # Chain loading and normalization
//!
//! Every sampler backend stores its posterior differently. This module reconciles the
//! three supported raw layouts into one [`FlatPosteriorSample`]:
//!
//! | Backend                 | Raw artifact                              | Notes                                    |
//! |-------------------------|-------------------------------------------|------------------------------------------|
//! | Ensemble MCMC           | `[walkers×steps×dims]` + log-posterior    | burn-in, thinning, layout tag mandatory  |
//! | Nested sampling, var. A | equal-weight table, log-posterior last    | MultiNest `post_equal_weights.dat`       |
//! | Nested sampling, var. B | weight, log-posterior, then parameters    | PolyChord `*_equal_weights.txt`          |
//!
//! The backend is always selected by an explicit tag ([`SamplerBackend`] or the
//! [`RawSamplerOutput`] variant), never inferred from the shape of the data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use orbpost::loader::{load_run, SamplerBackend};
//! use orbpost::run_context::RunContext;
//!
//! # fn demo(ctx: &RunContext) -> Result<(), orbpost::postfit_errors::PostfitError> {
//! let run = load_run(Utf8Path::new("out/multinest"), SamplerBackend::NestedA, ctx)?;
//! println!("{} samples", run.diagnostics.effective_samples);
//! # Ok(()) }
//! ```
pub mod ensemble;
pub mod nested;

use std::{fs, io::BufRead};

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    constants::{ENSEMBLE_CHAIN_FILE, NESTED_A_FILE, NESTED_B_FILE},
    posterior::FlatPosteriorSample,
    postfit_errors::PostfitError,
    run_context::RunContext,
};
pub use ensemble::{BurnThin, EnsembleChain, EnsembleLayout};
pub use nested::{ColumnLayout, EqualWeightTable};

/// Diagnostic counts gathered during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderDiagnostics {
    /// Number of rows of the flat sample.
    pub effective_samples: usize,
    /// Ensemble only: stored steps × storage thinning.
    pub total_steps: Option<usize>,
    pub n_walkers: Option<usize>,
    pub mean_acceptance: Option<f64>,
}

impl LoaderDiagnostics {
    pub(crate) fn samples_only(effective_samples: usize) -> Self {
        Self {
            effective_samples,
            total_steps: None,
            n_walkers: None,
            mean_acceptance: None,
        }
    }
}

/// Output of the loader: the common sample plus its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRun {
    pub sample: FlatPosteriorSample,
    pub diagnostics: LoaderDiagnostics,
}

/// Backend-tagged raw sampler artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamplerOutput {
    Ensemble {
        chain: EnsembleChain,
        burn_thin: BurnThin,
    },
    NestedSampling {
        table: EqualWeightTable,
        layout: ColumnLayout,
    },
}

impl RawSamplerOutput {
    /// Normalize into a [`FlatPosteriorSample`] with `ndim` columns.
    pub fn normalize(&self, ndim: usize) -> Result<NormalizedRun, PostfitError> {
        match self {
            RawSamplerOutput::Ensemble { chain, burn_thin } => chain.normalize(ndim, *burn_thin),
            RawSamplerOutput::NestedSampling { table, layout } => table.normalize(ndim, *layout),
        }
    }

    pub fn ensemble_chain(&self) -> Option<&EnsembleChain> {
        match self {
            RawSamplerOutput::Ensemble { chain, .. } => Some(chain),
            RawSamplerOutput::NestedSampling { .. } => None,
        }
    }
}

/// Backend tag used to locate and read a raw artifact from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerBackend {
    Ensemble(BurnThin),
    NestedA,
    NestedB,
}

impl SamplerBackend {
    /// Conventional artifact file name for this backend.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            SamplerBackend::Ensemble(_) => ENSEMBLE_CHAIN_FILE,
            SamplerBackend::NestedA => NESTED_A_FILE,
            SamplerBackend::NestedB => NESTED_B_FILE,
        }
    }

    /// Read the raw artifact of this backend from `dir`.
    pub fn read(&self, dir: &Utf8Path) -> Result<RawSamplerOutput, PostfitError> {
        let path = dir.join(self.artifact_name());
        match self {
            SamplerBackend::Ensemble(burn_thin) => Ok(RawSamplerOutput::Ensemble {
                chain: read_ensemble_chain(&path)?,
                burn_thin: *burn_thin,
            }),
            SamplerBackend::NestedA => Ok(RawSamplerOutput::NestedSampling {
                table: read_equal_weight_table(&path)?,
                layout: ColumnLayout::VARIANT_A,
            }),
            SamplerBackend::NestedB => Ok(RawSamplerOutput::NestedSampling {
                table: read_equal_weight_table(&path)?,
                layout: ColumnLayout::VARIANT_B,
            }),
        }
    }
}

fn require_artifact(path: &Utf8Path) -> Result<(), PostfitError> {
    if !path.is_file() {
        return Err(PostfitError::MissingArtifact(Utf8PathBuf::from(path)));
    }
    Ok(())
}

/// Read a whitespace-separated numeric table. Blank lines and `#` comments are ignored.
///
/// Return
/// ----------
/// * [`PostfitError::MissingArtifact`] if the file does not exist,
/// * [`PostfitError::DataFormat`] on an unparsable value (with its line number).
pub fn read_equal_weight_table(path: &Utf8Path) -> Result<EqualWeightTable, PostfitError> {
    require_artifact(path)?;
    let reader = std::io::BufReader::new(fs::File::open(path)?);

    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|e| {
                    PostfitError::DataFormat(format!("{path}:{}: '{tok}': {e}", lineno + 1))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok(EqualWeightTable { rows })
}

/// Read a JSON ensemble dump (see [`EnsembleChain`] for the field layout).
pub fn read_ensemble_chain(path: &Utf8Path) -> Result<EnsembleChain, PostfitError> {
    require_artifact(path)?;
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Locate, read and normalize the raw artifact of `backend` stored in `dir`.
pub fn load_run(
    dir: &Utf8Path,
    backend: SamplerBackend,
    ctx: &RunContext,
) -> Result<NormalizedRun, PostfitError> {
    backend.read(dir)?.normalize(ctx.ndim())
}
