#![allow(dead_code)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use orbpost::{
    constants::ENSEMBLE_CHAIN_FILE,
    derived::{ModelRegistry, ObservationModel, ParameterSource, SharedKind, SharedModel},
    kepler::KeplerOrbit,
    loader::{EnsembleChain, EnsembleLayout},
    model_export::{Dataset, DatasetKind, ModelComponents, ModelCurve, ModelEvaluator},
    model_selection::LikelihoodModel,
    postfit_errors::PostfitError,
    run_context::RunContext,
};

/// Temporary directory as a UTF-8 path; keep the guard alive for the test duration.
pub fn tmp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

/// One planet with free `P`, `K`, `f` and one RV offset.
pub fn planet_context() -> RunContext {
    RunContext::new(
        ["b_P", "b_K", "b_f", "harps_offset"].into_iter().collect(),
        60,
        2_458_000.0,
    )
    .unwrap()
}

pub fn planet_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::default();
    registry
        .register(
            SharedModel::new(
                "b",
                SharedKind::Planet {
                    stellar_mass: Some(1.0),
                },
            )
            .with_quantity("P", ParameterSource::Sampled(0))
            .with_quantity("K", ParameterSource::Sampled(1))
            .with_quantity("f", ParameterSource::Sampled(2))
            .with_quantity("e", ParameterSource::Fixed(0.0))
            .with_quantity("o", ParameterSource::Fixed(std::f64::consts::FRAC_PI_2)),
        )
        .unwrap();
    registry
}

pub fn orbit(theta: &[f64]) -> KeplerOrbit {
    KeplerOrbit {
        period: theta[0],
        semi_amplitude: theta[1],
        eccentricity: 0.0,
        omega: std::f64::consts::FRAC_PI_2,
        mean_longitude: theta[2],
    }
}

/// 30 RV points of planet `b` (P = 10 d, K = 5 m/s) plus a 2 m/s offset.
pub fn harps_dataset() -> Dataset {
    let truth = orbit(&[10.0, 5.0, 0.3]);
    let x0: Vec<f64> = (0..30).map(|i| i as f64 * 1.7).collect();
    let y = x0.iter().map(|&t| truth.rv(t).unwrap() + 2.0).collect();
    Dataset::new("harps", DatasetKind::Rv, x0, y, vec![1.0; 30])
        .unwrap()
        .with_model(ObservationModel::new("radial_velocities", ["b"]))
}

/// Keplerian plus constant offset; log-likelihood is a Gaussian chi-square.
pub struct RvModel {
    pub dataset: Dataset,
}

impl ModelEvaluator for RvModel {
    fn evaluate(
        &self,
        theta: &[f64],
        _dataset: &Dataset,
        times: &[f64],
    ) -> Result<ModelComponents, PostfitError> {
        let kep = orbit(theta).rv_curve(times)?;
        Ok(ModelComponents {
            systematics: vec![theta[3]],
            complete: kep.iter().map(|v| v + theta[3]).collect(),
            models: vec![ModelCurve {
                name: "radial_velocities".into(),
                values: kep,
                std: None,
            }],
        })
    }
}

impl LikelihoodModel for RvModel {
    fn log_priors_likelihood(&self, theta: &[f64]) -> Result<(f64, f64), PostfitError> {
        let ds = &self.dataset;
        let model = self.evaluate(theta, ds, &ds.x0)?;
        let chi2: f64 = ds
            .y
            .iter()
            .zip(&ds.e)
            .zip(&model.complete)
            .map(|((y, e), m)| ((y - m) / e).powi(2))
            .sum();
        Ok((0.0, -0.5 * chi2))
    }
}

/// Ensemble chain scattered around the true solution.
pub fn ensemble_chain(walkers: usize, steps: usize, seed: u64) -> EnsembleChain {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth = [10.0, 5.0, 0.3, 2.0];
    let scale = [0.01, 0.2, 0.05, 0.1];
    let chain: Vec<Vec<Vec<f64>>> = (0..walkers)
        .map(|_| {
            (0..steps)
                .map(|_| {
                    truth
                        .iter()
                        .zip(scale)
                        .map(|(t, s)| t + s * (rng.random::<f64>() - 0.5))
                        .collect()
                })
                .collect()
        })
        .collect();
    let log_posterior = chain
        .iter()
        .map(|walker| {
            walker
                .iter()
                .map(|row: &Vec<f64>| {
                    -row.iter()
                        .zip(truth)
                        .zip(scale)
                        .map(|((x, t), s)| ((x - t) / s).powi(2))
                        .sum::<f64>()
                })
                .collect()
        })
        .collect();
    EnsembleChain {
        chain,
        log_posterior,
        acceptance_fraction: vec![0.3; walkers],
        layout: EnsembleLayout::WalkersBySteps,
        storage_thin: 1,
    }
}

pub fn write_ensemble(dir: &Utf8Path, chain: &EnsembleChain) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(ENSEMBLE_CHAIN_FILE),
        serde_json::to_string(chain).unwrap(),
    )
    .unwrap();
}
