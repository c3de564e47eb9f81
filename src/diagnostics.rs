//! # Convergence diagnostics of ensemble chains
//!
//! Gelman–Rubin potential scale reduction computed across walkers:
//!
//! ```text
//! B  = n / (m − 1) · Σ_w (θ̄_w − θ̄)²         between-walker variance
//! W  = 1/m · Σ_w s²_w                         mean within-walker variance (ddof = 1)
//! V  = (n − 1)/n · W + B/n
//! R̂  = √(V / W)
//! ```
//!
//! with `m` walkers of `n` steps. Walkers of an affine-invariant ensemble are not
//! independent, so R̂ is only an indicative figure here.
use crate::{
    constants::GELMAN_RUBIN_THRESHOLD, loader::EnsembleChain, postfit_errors::PostfitError,
    run_context::RunContext,
};

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64], ddof: usize) -> f64 {
    let mu = mean(values);
    values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / (values.len() - ddof) as f64
}

/// Potential scale reduction of one parameter.
///
/// Arguments
/// -----------------
/// * `walkers`: one trace per walker, all of the same length.
///
/// Return
/// ----------
/// * `R̂`; `1.0` when every trace is the same constant, `+∞` when each walker is constant
///   but walkers disagree.
/// * [`PostfitError::DataFormat`] with fewer than two walkers, fewer than two steps, or
///   traces of unequal length.
pub fn gelman_rubin(walkers: &[Vec<f64>]) -> Result<f64, PostfitError> {
    let m = walkers.len();
    let n = walkers.first().map_or(0, Vec::len);
    if m < 2 || n < 2 {
        return Err(PostfitError::DataFormat(format!(
            "Gelman-Rubin needs at least 2 walkers and 2 steps, got {m} × {n}"
        )));
    }
    if walkers.iter().any(|w| w.len() != n) {
        return Err(PostfitError::DataFormat(
            "walker traces of unequal length".into(),
        ));
    }

    let means: Vec<f64> = walkers.iter().map(|w| mean(w)).collect();
    let b = n as f64 * variance(&means, 1);
    let w = walkers.iter().map(|t| variance(t, 1)).sum::<f64>() / m as f64;

    if w == 0.0 {
        return Ok(if b == 0.0 { 1.0 } else { f64::INFINITY });
    }
    let nf = n as f64;
    let v = (nf - 1.0) / nf * w + b / nf;
    Ok((v / w).sqrt())
}

/// R̂ of every parameter of `chain` after dropping `nburn` steps.
pub fn gelman_rubin_all(chain: &EnsembleChain, nburn: usize) -> Result<Vec<f64>, PostfitError> {
    let ndim = chain
        .chain
        .first()
        .and_then(|w| w.first())
        .map_or(0, Vec::len);
    (0..ndim)
        .map(|p| gelman_rubin(&chain.parameter_trace(p, nburn)))
        .collect()
}

/// R̂ of one parameter as the chain grows: one value per prefix length from
/// `max(nburn, 2)` to the full chain.
///
/// Return
/// ----------
/// * `(steps, R̂)` pairs, where `steps` is the prefix length.
pub fn gelman_rubin_trace(
    chain: &EnsembleChain,
    param: usize,
    nburn: usize,
) -> Result<Vec<(usize, f64)>, PostfitError> {
    let full = chain.parameter_trace(param, 0);
    (nburn.max(2)..=chain.n_steps())
        .map(|steps| {
            let prefix: Vec<Vec<f64>> = full.iter().map(|w| w[..steps].to_vec()).collect();
            Ok((steps, gelman_rubin(&prefix)?))
        })
        .collect()
}

/// Per-parameter R̂ with the parameter names of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport {
    pub rhat: Vec<(String, f64)>,
}

impl ConvergenceReport {
    /// Compute R̂ for every parameter of `ctx` and log those above the threshold.
    pub fn compute(
        chain: &EnsembleChain,
        ctx: &RunContext,
        nburn: usize,
    ) -> Result<Self, PostfitError> {
        let values = gelman_rubin_all(chain, nburn)?;
        let rhat: Vec<(String, f64)> = ctx
            .parameters()
            .names()
            .iter()
            .cloned()
            .zip(values)
            .collect();
        for (name, r) in &rhat {
            if *r > GELMAN_RUBIN_THRESHOLD {
                log::warn!("Gelman-Rubin: {name} has R̂ = {r:.4} > {GELMAN_RUBIN_THRESHOLD}");
            } else {
                log::debug!("Gelman-Rubin: {name} R̂ = {r:.4}");
            }
        }
        Ok(Self { rhat })
    }

    /// Names of the parameters above the convergence threshold.
    pub fn not_converged(&self) -> Vec<&str> {
        self.rhat
            .iter()
            .filter(|(_, r)| *r > GELMAN_RUBIN_THRESHOLD)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn max(&self) -> Option<f64> {
        self.rhat.iter().map(|(_, r)| *r).reduce(f64::max)
    }
}

#[cfg(test)]
mod diagnostics_test {
    use super::*;
    use crate::loader::EnsembleLayout;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_value() {
        // means 2 and 5, within variances 1 and 1, n = 3
        let walkers = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        // B = 3 · 4.5 = 13.5, W = 1, V = 2/3 + 4.5
        let expected = ((2.0 / 3.0 + 4.5) / 1.0_f64).sqrt();
        assert_relative_eq!(gelman_rubin(&walkers).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_walkers_below_one() {
        let walkers = vec![vec![1.0, 2.0, 3.0, 4.0]; 3];
        let r = gelman_rubin(&walkers).unwrap();
        assert_relative_eq!(r, (0.75_f64).sqrt(), epsilon = 1e-12);
        assert!(r <= 1.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(gelman_rubin(&[vec![2.0; 5], vec![2.0; 5]]).unwrap(), 1.0);
        assert!(gelman_rubin(&[vec![1.0; 5], vec![2.0; 5]]).unwrap().is_infinite());
        assert!(gelman_rubin(&[vec![1.0, 2.0]]).is_err());
        assert!(gelman_rubin(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    fn chain() -> EnsembleChain {
        // walker w, step s, dims: [s, w]
        let chain: Vec<Vec<Vec<f64>>> = (0..3)
            .map(|w| (0..6).map(|s| vec![s as f64, (w * s) as f64]).collect())
            .collect();
        EnsembleChain {
            chain,
            log_posterior: vec![vec![0.0; 6]; 3],
            acceptance_fraction: vec![0.3; 3],
            layout: EnsembleLayout::WalkersBySteps,
            storage_thin: 1,
        }
    }

    #[test]
    fn test_report_over_parameters() {
        let ctx = RunContext::new(["a", "b"].into_iter().collect(), 10, 0.0).unwrap();
        let report = ConvergenceReport::compute(&chain(), &ctx, 1).unwrap();
        assert_eq!(report.rhat.len(), 2);
        assert!(report.rhat[0].1 < 1.0);
        assert_eq!(report.not_converged(), vec!["b"]);
        assert_eq!(report.max(), Some(report.rhat[1].1));
    }

    #[test]
    fn test_trace_lengths() {
        let trace = gelman_rubin_trace(&chain(), 0, 3).unwrap();
        assert_eq!(
            trace.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );
    }
}
