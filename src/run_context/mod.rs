//! # Run context
//!
//! The [`RunContext`] is the single parameter-bookkeeping record shared by every stage of
//! the post-processing pipeline and by the nested-sampling orchestrator:
//!
//! ```text
//! RunContext
//! ├── parameters (ParameterIndex: ordered name ↔ column bijection)
//! ├── ndim       (fixed for the whole run, = parameters.len())
//! ├── n_data     (number of fitted data points, used by the information criteria)
//! ├── tref       (time reference subtracted from absolute times)
//! └── sampler    (optional nested-sampling configuration)
//! ```
//!
//! The context is built once, never mutated afterwards, and passed explicitly by reference.
//! It is persisted as JSON next to the sampler output so the post-processing stage can be
//! run later without reading any sampler-internal checkpoint.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use orbpost::run_context::RunContext;
//!
//! # fn demo() -> Result<(), orbpost::postfit_errors::PostfitError> {
//! let ctx = RunContext::new(["b_P", "b_K", "b_f"].into_iter().collect(), 120, 2_457_000.0)?;
//! ctx.save(Utf8Path::new("out/run_context.json"))?;
//! let back = RunContext::load(Utf8Path::new("out/run_context.json"))?;
//! assert_eq!(back.ndim(), 3);
//! # Ok(()) }
//! ```
pub mod parameter_index;

use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{constants::Day, orchestrator::NestedSamplingConfig, postfit_errors::PostfitError};
pub use parameter_index::ParameterIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    ndim: usize,
    n_data: usize,
    tref: Day,
    parameters: ParameterIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sampler: Option<NestedSamplingConfig>,
}

impl RunContext {
    /// Build a new context from the ordered parameter set.
    ///
    /// Arguments
    /// -----------------
    /// * `parameters`: ordered bijection of the sampled parameter names.
    /// * `n_data`: number of data points entering the likelihood.
    /// * `tref`: time reference (days).
    ///
    /// Return
    /// ----------
    /// * The context, or [`PostfitError::InvalidParameter`] when no parameter is declared.
    pub fn new(parameters: ParameterIndex, n_data: usize, tref: Day) -> Result<Self, PostfitError> {
        if parameters.is_empty() {
            return Err(PostfitError::InvalidParameter(
                "a run context needs at least one sampled parameter".into(),
            ));
        }
        Ok(Self {
            ndim: parameters.len(),
            n_data,
            tref,
            parameters,
            sampler: None,
        })
    }

    /// Attach the sampler configuration. Consumes the context, so it can only happen
    /// while the context is being built.
    pub fn with_sampler_config(mut self, config: NestedSamplingConfig) -> Self {
        self.sampler = Some(config);
        self
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn n_data(&self) -> usize {
        self.n_data
    }

    pub fn tref(&self) -> Day {
        self.tref
    }

    pub fn parameters(&self) -> &ParameterIndex {
        &self.parameters
    }

    pub fn sampler_config(&self) -> Option<&NestedSamplingConfig> {
        self.sampler.as_ref()
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), PostfitError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Reload a persisted context.
    ///
    /// Return
    /// ----------
    /// * [`PostfitError::MissingArtifact`] if the file is absent,
    /// * [`PostfitError::DataFormat`] if `ndim` disagrees with the number of parameter names.
    pub fn load(path: &Utf8Path) -> Result<Self, PostfitError> {
        if !path.exists() {
            return Err(PostfitError::MissingArtifact(path.to_owned()));
        }
        let file = fs::File::open(path)?;
        let ctx: RunContext = serde_json::from_reader(std::io::BufReader::new(file))?;
        if ctx.ndim != ctx.parameters.len() {
            return Err(PostfitError::DataFormat(format!(
                "run context declares ndim = {} but lists {} parameters",
                ctx.ndim,
                ctx.parameters.len()
            )));
        }
        Ok(ctx)
    }
}
