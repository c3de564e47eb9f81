use serde::{Deserialize, Serialize};

use super::{LoaderDiagnostics, NormalizedRun};
use crate::{posterior::FlatPosteriorSample, postfit_errors::PostfitError};

/// Axis order of the stored log-posterior tensor.
///
/// The two historical ensemble-sampler layouts cannot be told apart from the data when
/// `walkers == steps`, so the layout is always declared by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleLayout {
    /// `[walkers][steps]` (emcee 2.x `lnprobability`)
    WalkersBySteps,
    /// `[steps][walkers]` (emcee 3.x `get_log_prob()`)
    StepsByWalkers,
}

/// Burn-in and thinning applied while flattening an ensemble chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnThin {
    pub nburn: usize,
    pub nthin: usize,
}

impl BurnThin {
    pub fn new(nburn: usize, nthin: usize) -> Result<Self, PostfitError> {
        if nthin == 0 {
            return Err(PostfitError::InvalidParameter(
                "thinning stride must be >= 1".into(),
            ));
        }
        Ok(Self { nburn, nthin })
    }

    fn kept_steps(&self, steps: usize) -> impl Iterator<Item = usize> {
        (self.nburn.min(steps)..steps).step_by(self.nthin)
    }
}

fn default_storage_thin() -> usize {
    1
}

/// Raw ensemble-MCMC artifact.
///
/// * `chain` – `[walkers][steps][dims]` parameter tensor,
/// * `log_posterior` – log-posterior tensor in the declared [`EnsembleLayout`],
/// * `acceptance_fraction` – one value per walker,
/// * `storage_thin` – thinning already applied by the sampler when the chain was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleChain {
    pub chain: Vec<Vec<Vec<f64>>>,
    pub log_posterior: Vec<Vec<f64>>,
    pub acceptance_fraction: Vec<f64>,
    pub layout: EnsembleLayout,
    #[serde(default = "default_storage_thin")]
    pub storage_thin: usize,
}

impl EnsembleChain {
    pub fn n_walkers(&self) -> usize {
        self.chain.len()
    }

    pub fn n_steps(&self) -> usize {
        self.chain.first().map_or(0, Vec::len)
    }

    /// Check the tensor shapes against the declared dimensionality.
    pub fn validate(&self, ndim: usize) -> Result<(), PostfitError> {
        let walkers = self.n_walkers();
        let steps = self.n_steps();
        if walkers == 0 || steps == 0 {
            return Err(PostfitError::DataFormat("empty ensemble chain".into()));
        }
        if self.storage_thin == 0 {
            return Err(PostfitError::DataFormat(
                "storage_thin must be >= 1 in the ensemble artifact".into(),
            ));
        }

        for (w, walker) in self.chain.iter().enumerate() {
            if walker.len() != steps {
                return Err(PostfitError::DataFormat(format!(
                    "walker {w} holds {} steps, expected {steps}",
                    walker.len()
                )));
            }
            if let Some((s, row)) = walker.iter().enumerate().find(|(_, r)| r.len() != ndim) {
                return Err(PostfitError::DataFormat(format!(
                    "walker {w} step {s} has {} dimensions, declared ndim = {ndim}",
                    row.len()
                )));
            }
        }

        let (outer, inner) = match self.layout {
            EnsembleLayout::WalkersBySteps => (walkers, steps),
            EnsembleLayout::StepsByWalkers => (steps, walkers),
        };
        if self.log_posterior.len() != outer
            || self.log_posterior.iter().any(|v| v.len() != inner)
        {
            return Err(PostfitError::DataFormat(format!(
                "log-posterior tensor does not match a {:?} layout of {walkers} walkers × {steps} steps",
                self.layout
            )));
        }

        if self.acceptance_fraction.len() != walkers {
            return Err(PostfitError::DataFormat(format!(
                "{} acceptance fractions for {walkers} walkers",
                self.acceptance_fraction.len()
            )));
        }
        Ok(())
    }

    fn log_posterior_at(&self, walker: usize, step: usize) -> f64 {
        match self.layout {
            EnsembleLayout::WalkersBySteps => self.log_posterior[walker][step],
            EnsembleLayout::StepsByWalkers => self.log_posterior[step][walker],
        }
    }

    /// Flatten the chain: drop burn-in, thin, then concatenate walkers.
    ///
    /// Rows are walker-major: every kept step of walker 0, then walker 1, …
    /// The log-posterior is read through the declared layout so that row `i` of the
    /// matrix and entry `i` of the vector always describe the same draw.
    ///
    /// Arguments
    /// -----------------
    /// * `ndim`: declared dimensionality.
    /// * `burn_thin`: burn-in steps to drop and thinning stride.
    ///
    /// Return
    /// ----------
    /// * The [`NormalizedRun`], or [`PostfitError::DataFormat`] on shape mismatch or when
    ///   burn-in leaves no sample.
    pub fn normalize(
        &self,
        ndim: usize,
        burn_thin: BurnThin,
    ) -> Result<NormalizedRun, PostfitError> {
        self.validate(ndim)?;

        let steps = self.n_steps();
        let kept: Vec<usize> = burn_thin.kept_steps(steps).collect();
        if kept.is_empty() {
            return Err(PostfitError::DataFormat(format!(
                "burn-in of {} steps leaves no sample out of {steps}",
                burn_thin.nburn
            )));
        }

        let mut rows = Vec::with_capacity(self.n_walkers() * kept.len());
        let mut log_posterior = Vec::with_capacity(self.n_walkers() * kept.len());
        for (w, walker) in self.chain.iter().enumerate() {
            for &s in &kept {
                rows.push(walker[s].clone());
                log_posterior.push(self.log_posterior_at(w, s));
            }
        }

        let sample = FlatPosteriorSample::from_rows(&rows, log_posterior)?;
        let mean_acceptance = self.acceptance_fraction.iter().sum::<f64>()
            / self.acceptance_fraction.len() as f64;

        let diagnostics = LoaderDiagnostics {
            effective_samples: sample.n_samples(),
            total_steps: Some(steps * self.storage_thin),
            n_walkers: Some(self.n_walkers()),
            mean_acceptance: Some(mean_acceptance),
        };
        log::info!(
            "Ensemble chain: {} walkers × {} steps (storage thin {}), {} samples after burn-in {} / thin {}",
            self.n_walkers(),
            steps,
            self.storage_thin,
            sample.n_samples(),
            burn_thin.nburn,
            burn_thin.nthin
        );

        Ok(NormalizedRun {
            sample,
            diagnostics,
        })
    }

    /// Trace of one parameter after burn-in, one `Vec` per walker.
    pub fn parameter_trace(&self, param: usize, nburn: usize) -> Vec<Vec<f64>> {
        self.chain
            .iter()
            .map(|walker| walker.iter().skip(nburn).map(|row| row[param]).collect())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod ensemble_test {
    use super::*;

    /// 2 walkers × 4 steps × 2 dims, value = 100·w + 10·s + d.
    pub(crate) fn toy_chain(layout: EnsembleLayout) -> EnsembleChain {
        let walkers = 2;
        let steps = 4;
        let chain = (0..walkers)
            .map(|w| {
                (0..steps)
                    .map(|s| (0..2).map(|d| (100 * w + 10 * s + d) as f64).collect())
                    .collect()
            })
            .collect();
        let lp = |w: usize, s: usize| -((10 * w + s) as f64);
        let log_posterior = match layout {
            EnsembleLayout::WalkersBySteps => (0..walkers)
                .map(|w| (0..steps).map(|s| lp(w, s)).collect())
                .collect(),
            EnsembleLayout::StepsByWalkers => (0..steps)
                .map(|s| (0..walkers).map(|w| lp(w, s)).collect())
                .collect(),
        };
        EnsembleChain {
            chain,
            log_posterior,
            acceptance_fraction: vec![0.25, 0.75],
            layout,
            storage_thin: 1,
        }
    }

    #[test]
    fn test_flatten_no_burn_keeps_everything() {
        let raw = toy_chain(EnsembleLayout::WalkersBySteps);
        let run = raw.normalize(2, BurnThin::new(0, 1).unwrap()).unwrap();
        assert_eq!(run.sample.n_samples(), 8);

        let mut seen: Vec<f64> = run.sample.column(0);
        seen.sort_by(f64::total_cmp);
        seen.dedup();
        assert_eq!(seen.len(), 8);
        assert_eq!(run.diagnostics.total_steps, Some(4));
        assert_eq!(run.diagnostics.mean_acceptance, Some(0.5));
    }

    #[test]
    fn test_burn_and_thin() {
        let raw = toy_chain(EnsembleLayout::WalkersBySteps);
        let run = raw.normalize(2, BurnThin::new(1, 2).unwrap()).unwrap();
        // kept steps 1 and 3 for each walker
        assert_eq!(run.sample.column(0), vec![10., 30., 110., 130.]);
        assert_eq!(
            run.sample.log_posterior().as_slice(),
            &[-1., -3., -11., -13.]
        );
    }

    #[test]
    fn test_both_layouts_align_logpost() {
        let a = toy_chain(EnsembleLayout::WalkersBySteps)
            .normalize(2, BurnThin::new(0, 1).unwrap())
            .unwrap();
        let b = toy_chain(EnsembleLayout::StepsByWalkers)
            .normalize(2, BurnThin::new(0, 1).unwrap())
            .unwrap();
        assert_eq!(a.sample, b.sample);
    }

    #[test]
    fn test_shape_errors() {
        let raw = toy_chain(EnsembleLayout::WalkersBySteps);
        assert!(matches!(
            raw.normalize(3, BurnThin::new(0, 1).unwrap()),
            Err(PostfitError::DataFormat(_))
        ));

        let mut wrong_layout = toy_chain(EnsembleLayout::WalkersBySteps);
        wrong_layout.layout = EnsembleLayout::StepsByWalkers;
        assert!(matches!(
            wrong_layout.normalize(2, BurnThin::new(0, 1).unwrap()),
            Err(PostfitError::DataFormat(_))
        ));

        assert!(matches!(
            raw.normalize(2, BurnThin::new(4, 1).unwrap()),
            Err(PostfitError::DataFormat(_))
        ));
        assert!(BurnThin::new(0, 0).is_err());
    }

    #[test]
    fn test_zero_storage_thin_is_rejected() {
        let mut raw = toy_chain(EnsembleLayout::WalkersBySteps);
        raw.storage_thin = 0;
        let err = raw.normalize(2, BurnThin::new(0, 1).unwrap()).unwrap_err();
        assert!(matches!(err, PostfitError::DataFormat(ref msg) if msg.contains("storage_thin")));

        // read from disk, the field keeps its default of 1 when absent
        let json = r#"{"chain": [[[1.0]]], "log_posterior": [[0.0]],
            "acceptance_fraction": [0.5], "layout": "walkers_by_steps"}"#;
        let parsed: EnsembleChain = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.storage_thin, 1);
        assert!(parsed.normalize(1, BurnThin::new(0, 1).unwrap()).is_ok());
    }
}
