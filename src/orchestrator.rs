//! # Nested-sampling orchestration
//!
//! Drives an external reactive nested sampler ([`NestedSampler`]) to convergence and leaves
//! behind everything the post-processing stage needs:
//!
//! * a zero-byte completion marker (`nested_sampling.completed`),
//! * the run context (`run_context.json`) with the sampler configuration attached.
//!
//! The orchestrator always resumes: an output directory holding partial sampler state is
//! handed back to the sampler with `resume = true`, never restarted, and a directory
//! already holding the completion marker is left untouched
//! ([`OrchestratorOutcome::AlreadyComplete`]).
//!
//! Two orchestrators must never share an output directory; no locking is performed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use orbpost::orchestrator::{run_nested_sampling, LivePoints, NestedSamplingConfig, NestedSampler};
//! use orbpost::run_context::RunContext;
//!
//! # fn demo(sampler: &mut impl NestedSampler, ctx: &RunContext) -> Result<(), orbpost::postfit_errors::PostfitError> {
//! let config = NestedSamplingConfig::builder()
//!     .live_points(LivePoints::PerDimension(25))
//!     .dlogz(0.5)
//!     .min_ess(400)
//!     .build()?;
//! let outcome = run_nested_sampling(sampler, ctx, &config, Utf8Path::new("out/ultranest"))?;
//! println!("{outcome:?}");
//! # Ok(()) }
//! ```
use std::{cmp::Ordering::Greater, fs};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{COMPLETION_MARKER_FILE, RUN_CONTEXT_FILE},
    postfit_errors::PostfitError,
    run_context::RunContext,
};

/// Minimum number of live points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivePoints {
    Absolute(usize),
    /// Multiplier applied to the number of dimensions.
    PerDimension(usize),
}

impl LivePoints {
    pub fn resolve(&self, ndim: usize) -> usize {
        match *self {
            LivePoints::Absolute(n) => n,
            LivePoints::PerDimension(mult) => ndim * mult,
        }
    }
}

/// Convergence controls of the nested-sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedSamplingConfig {
    pub live_points: LivePoints,
    /// Target accuracy on the log-evidence.
    pub dlogz: f64,
    /// Minimum effective sample size.
    pub min_ess: usize,
    /// Improvement loops after the first convergence, `-1` for no limit.
    pub max_improvement_loops: i32,
    /// Evaluate the evidence with the jitter terms switched off.
    #[serde(default)]
    pub shutdown_jitter: bool,
}

impl Default for NestedSamplingConfig {
    fn default() -> Self {
        Self {
            live_points: LivePoints::Absolute(400),
            dlogz: 0.5,
            min_ess: 400,
            max_improvement_loops: -1,
            shutdown_jitter: false,
        }
    }
}

impl NestedSamplingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> NestedSamplingConfigBuilder {
        NestedSamplingConfigBuilder::new()
    }

    /// `None` when the number of improvement loops is unlimited.
    pub fn improvement_loop_limit(&self) -> Option<u32> {
        u32::try_from(self.max_improvement_loops).ok()
    }
}

/// Builder for [`NestedSamplingConfig`], with validation.
#[derive(Debug, Clone, Default)]
pub struct NestedSamplingConfigBuilder {
    params: NestedSamplingConfig,
}

impl NestedSamplingConfigBuilder {
    pub fn new() -> Self {
        Self {
            params: NestedSamplingConfig::default(),
        }
    }

    pub fn live_points(mut self, v: LivePoints) -> Self {
        self.params.live_points = v;
        self
    }
    pub fn dlogz(mut self, v: f64) -> Self {
        self.params.dlogz = v;
        self
    }
    pub fn min_ess(mut self, v: usize) -> Self {
        self.params.min_ess = v;
        self
    }
    pub fn max_improvement_loops(mut self, v: i32) -> Self {
        self.params.max_improvement_loops = v;
        self
    }
    pub fn shutdown_jitter(mut self, v: bool) -> Self {
        self.params.shutdown_jitter = v;
        self
    }

    /// Finalize the configuration.
    ///
    /// Validation rules
    /// -----------------
    /// * live points (absolute count or multiplier) `>= 1`,
    /// * `dlogz > 0` (NaN rejected),
    /// * `min_ess >= 1`,
    /// * `max_improvement_loops >= -1`.
    pub fn build(self) -> Result<NestedSamplingConfig, PostfitError> {
        let p = &self.params;
        let live = match p.live_points {
            LivePoints::Absolute(n) | LivePoints::PerDimension(n) => n,
        };
        if live == 0 {
            return Err(PostfitError::InvalidParameter(
                "live points must be >= 1".into(),
            ));
        }
        if p.dlogz.partial_cmp(&0.0) != Some(Greater) {
            return Err(PostfitError::InvalidParameter("dlogz must be > 0".into()));
        }
        if p.min_ess == 0 {
            return Err(PostfitError::InvalidParameter("min_ess must be >= 1".into()));
        }
        if p.max_improvement_loops < -1 {
            return Err(PostfitError::InvalidParameter(
                "max_improvement_loops must be >= -1".into(),
            ));
        }
        Ok(self.params)
    }
}

/// Everything an external nested sampler needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerRequest<'a> {
    /// Parameter labels, `_` replaced by `-`.
    pub labels: Vec<String>,
    /// Directory for the sampler's own checkpoint files.
    pub log_dir: &'a Utf8Path,
    pub min_live_points: usize,
    pub dlogz: f64,
    pub min_ess: usize,
    /// `None` for no limit.
    pub max_improvement_loops: Option<u32>,
    /// `log_dir` already holds state from an interrupted run; the sampler must continue it.
    pub resume: bool,
    pub shutdown_jitter: bool,
}

/// Result reported by the sampler once converged.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSummary {
    pub log_evidence: f64,
    pub log_evidence_err: f64,
    pub n_samples: usize,
}

/// External reactive nested-sampling engine.
pub trait NestedSampler {
    /// Run (or resume) to convergence; blocks until done.
    fn run(&mut self, request: &SamplerRequest<'_>) -> Result<SamplerSummary, PostfitError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorOutcome {
    Completed(SamplerSummary),
    /// The completion marker was already present; the sampler was not invoked.
    AlreadyComplete,
}

/// `true` when the completion marker exists in `output_dir`.
pub fn is_complete(output_dir: &Utf8Path) -> bool {
    output_dir.join(COMPLETION_MARKER_FILE).is_file()
}

/// Run the nested sampler for `ctx` in `output_dir`, unless a previous run completed there.
///
/// Arguments
/// -----------------
/// * `sampler`: the external engine.
/// * `ctx`: run context; saved with `config` attached once the run completes.
/// * `config`: convergence controls.
/// * `output_dir`: sampler log directory, created if missing.
///
/// Return
/// ----------
/// * [`OrchestratorOutcome::AlreadyComplete`] if the marker exists,
/// * [`OrchestratorOutcome::Completed`] after a successful run, marker and context written,
/// * [`PostfitError::ExternalSampler`] on any sampler failure; nothing is written then.
pub fn run_nested_sampling<S: NestedSampler + ?Sized>(
    sampler: &mut S,
    ctx: &RunContext,
    config: &NestedSamplingConfig,
    output_dir: &Utf8Path,
) -> Result<OrchestratorOutcome, PostfitError> {
    if is_complete(output_dir) {
        log::info!("Nested sampling already completed in {output_dir}, skipping");
        return Ok(OrchestratorOutcome::AlreadyComplete);
    }

    fs::create_dir_all(output_dir)?;
    let has_partial_state = fs::read_dir(output_dir)?.next().is_some();
    if has_partial_state {
        log::info!("Resuming nested sampling from partial state in {output_dir}");
    }

    let request = SamplerRequest {
        labels: ctx.parameters().labels(),
        log_dir: output_dir,
        min_live_points: config.live_points.resolve(ctx.ndim()),
        dlogz: config.dlogz,
        min_ess: config.min_ess,
        max_improvement_loops: config.improvement_loop_limit(),
        resume: has_partial_state,
        shutdown_jitter: config.shutdown_jitter,
    };
    log::info!(
        "Nested sampling: {} live points, dlogz = {}, min_ess = {}, tref = {}",
        request.min_live_points,
        request.dlogz,
        request.min_ess,
        ctx.tref()
    );

    let summary = sampler.run(&request).map_err(|e| match e {
        PostfitError::ExternalSampler(_) => e,
        other => PostfitError::ExternalSampler(other.to_string()),
    })?;

    ctx.clone()
        .with_sampler_config(config.clone())
        .save(&output_dir.join(RUN_CONTEXT_FILE))?;
    fs::File::create(output_dir.join(COMPLETION_MARKER_FILE))?;

    log::info!(
        "Nested sampling completed: ln Z = {} ± {}",
        summary.log_evidence,
        summary.log_evidence_err
    );
    Ok(OrchestratorOutcome::Completed(summary))
}
