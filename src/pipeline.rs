//! # Post-processing pipeline
//!
//! Runs every stage over one raw sampler artifact:
//!
//! ```text
//! raw ──normalize──▶ sample ──summarize──▶ medians / ±σ
//!                       │  └──pick_map───▶ MAP ──score_map──▶ BIC / AIC / AICc
//!                       │
//!                       ├──derived (median, MAP, full sample)
//!                       ├──density input ──reduce──▶ 1D / 2D histograms ──export
//!                       └──model exports (median, MAP)
//! ```
//!
//! Loader and likelihood failures abort the run. A degenerate variable only loses its
//! histogram, and a planet without a full set of orbital elements only loses its
//! Kepler curves.
use camino::Utf8Path;

use crate::{
    constants::DENSITY_DIR,
    density::{DensityConfig, DensityExports, DensityInput, DensityReduction},
    derived::{DerivedQuantitySet, ModelRegistry, QuantityConverter, SampleInput},
    diagnostics::ConvergenceReport,
    loader::{NormalizedRun, RawSamplerOutput},
    model_export::{Dataset, Estimate, ModelEvaluator, ModelExportReport, ModelExporter},
    model_selection::{score_map, LikelihoodModel, ModelSelectionScore},
    postfit_errors::PostfitError,
    run_context::RunContext,
    summary::{pick_map, summarize, summarize_columns, MapEstimate, ParameterSummary, ValueSigma},
};

/// Derived quantities keyed by source: a shared model name, or `<dataset>_<model>`.
pub type NamedDerived = Vec<(String, DerivedQuantitySet)>;

/// Every intermediate product of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub run: NormalizedRun,
    pub summary: ParameterSummary,
    pub log_posterior_summary: ValueSigma,
    pub map: MapEstimate,
    pub model_selection: ModelSelectionScore,
    /// Ensemble runs only.
    pub convergence: Option<ConvergenceReport>,
    pub derived_median: NamedDerived,
    pub derived_map: NamedDerived,
    pub derived_full: NamedDerived,
    pub density: DensityReduction,
    pub density_exports: DensityExports,
    /// Empty when no [`ModelEvaluator`] is attached.
    pub model_exports: Vec<ModelExportReport>,
}

/// Derived quantities of every shared model, then of every observation model of every
/// dataset.
pub fn derive_all(
    sample: SampleInput<'_>,
    registry: &ModelRegistry,
    datasets: &[Dataset],
) -> Result<NamedDerived, PostfitError> {
    let mut out = Vec::new();
    for shared in registry.iter() {
        out.push((shared.name().to_string(), shared.convert(sample, registry)?));
    }
    for ds in datasets {
        for model in &ds.models {
            out.push((
                format!("{}_{}", ds.name, model.name()),
                model.convert(sample, registry)?,
            ));
        }
    }
    Ok(out)
}

/// Pipeline settings.
pub struct Pipeline<'a> {
    density: DensityConfig,
    evaluator: Option<&'a dyn ModelEvaluator>,
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Self::new(DensityConfig::default())
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(density: DensityConfig) -> Self {
        Self {
            density,
            evaluator: None,
        }
    }

    /// Enable the model exports with this evaluator.
    pub fn with_evaluator(mut self, evaluator: &'a dyn ModelEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Run every stage and write the exports under `output_dir`.
    ///
    /// Arguments
    /// -----------------
    /// * `raw`: backend-tagged sampler output.
    /// * `ctx`: run context of the fit.
    /// * `likelihood`: model evaluated at the MAP for the information criteria.
    /// * `registry`: shared models.
    /// * `datasets`: fitted datasets with their observation models.
    /// * `output_dir`: root of every export.
    ///
    /// Return
    /// ----------
    /// * The [`PipelineReport`], or the first fatal error.
    pub fn run<L: LikelihoodModel + ?Sized>(
        &self,
        raw: &RawSamplerOutput,
        ctx: &RunContext,
        likelihood: &L,
        registry: &ModelRegistry,
        datasets: &[Dataset],
        output_dir: &Utf8Path,
    ) -> Result<PipelineReport, PostfitError> {
        let run = raw.normalize(ctx.ndim())?;
        let sample = &run.sample;
        log::info!(
            "Posterior sample: {} rows × {} parameters, tref = {}",
            sample.n_samples(),
            sample.n_dims(),
            ctx.tref()
        );

        let convergence = match raw {
            RawSamplerOutput::Ensemble { chain, burn_thin } => {
                match ConvergenceReport::compute(chain, ctx, burn_thin.nburn) {
                    Ok(report) => Some(report),
                    Err(e) => {
                        log::warn!("Gelman-Rubin diagnostics unavailable: {e}");
                        None
                    }
                }
            }
            RawSamplerOutput::NestedSampling { .. } => None,
        };

        let summary = summarize_columns(sample.chain());
        let lp: Vec<f64> = sample.log_posterior().iter().copied().collect();
        let log_posterior_summary = summarize(&lp);
        log::info!(
            "Parameter summary:\n{:#}",
            summary.named(ctx.parameters().names())
        );

        let map = pick_map(sample)?;
        let model_selection = score_map(likelihood, &map, ctx)?;
        log::info!("Model selection at the MAP:\n{model_selection}");

        let medians = summary.medians();
        let derived_median = derive_all(SampleInput::Row(&medians), registry, datasets)?;
        let derived_map = derive_all(SampleInput::Row(&map.parameters), registry, datasets)?;
        let derived_full = derive_all(SampleInput::Matrix(sample.chain()), registry, datasets)?;

        let density_input = DensityInput::assemble(sample, ctx, &derived_full)?;
        let density = density_input.reduce(&self.density);
        let density_exports = density.export(&output_dir.join(DENSITY_DIR))?;

        let mut model_exports = Vec::new();
        match self.evaluator {
            Some(evaluator) if !datasets.is_empty() => {
                let exporter = ModelExporter::new(evaluator, datasets, ctx.tref())?;
                for (estimate, theta, derived) in [
                    (Estimate::Median, &medians, &derived_median),
                    (Estimate::Map, &map.parameters, &derived_map),
                ] {
                    let planets = planet_quantities(registry, derived);
                    model_exports.push(exporter.export(estimate, theta, &planets, output_dir)?);
                }
            }
            _ => log::info!("No model evaluator or dataset, model exports skipped"),
        }

        Ok(PipelineReport {
            run,
            summary,
            log_posterior_summary,
            map,
            model_selection,
            convergence,
            derived_median,
            derived_map,
            derived_full,
            density,
            density_exports,
            model_exports,
        })
    }
}

fn planet_quantities(registry: &ModelRegistry, derived: &NamedDerived) -> NamedDerived {
    registry
        .planets()
        .filter_map(|p| derived.iter().find(|(name, _)| name == p.name()).cloned())
        .collect()
}
