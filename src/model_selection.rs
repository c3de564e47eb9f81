//! # Information criteria
//!
//! Scores a fit at its MAP vector with the Bayesian and Akaike information criteria,
//! evaluated twice: on the log-likelihood alone and on log-likelihood + log-prior.
//!
//! With `k` free parameters and `n` data points:
//!
//! ```text
//! BIC  = -2 lnL + k ln(n)
//! AIC  = -2 lnL + 2k
//! AICc = AIC + 2k(k+1) / (n - k - 1)      (undefined for n - k - 1 <= 0)
//! ```
//!
//! AICc is recommended over AIC when `n < 40 k`.
use std::fmt;

use crate::{
    constants::AICC_DATA_PER_DIM, postfit_errors::PostfitError, run_context::RunContext,
    summary::MapEstimate,
};

/// External model able to evaluate its log-prior and log-likelihood at a parameter vector.
pub trait LikelihoodModel {
    /// Return `(log_prior, log_likelihood)` at `theta`.
    fn log_priors_likelihood(&self, theta: &[f64]) -> Result<(f64, f64), PostfitError>;
}

/// Bayesian information criterion.
pub fn bic(log_l: f64, k: usize, n: usize) -> f64 {
    -2.0 * log_l + k as f64 * (n as f64).ln()
}

/// Akaike information criterion.
pub fn aic(log_l: f64, k: usize) -> f64 {
    -2.0 * log_l + 2.0 * k as f64
}

/// Small-sample corrected AIC.
///
/// Return
/// ----------
/// * [`PostfitError::NumericalDomain`] when `n - k - 1 <= 0`.
pub fn aicc(log_l: f64, k: usize, n: usize) -> Result<f64, PostfitError> {
    let denom = n as i64 - k as i64 - 1;
    if denom <= 0 {
        return Err(PostfitError::NumericalDomain(format!(
            "AICc undefined for n = {n}, k = {k} (n - k - 1 = {denom})"
        )));
    }
    let kf = k as f64;
    Ok(aic(log_l, k) + 2.0 * kf * (kf + 1.0) / denom as f64)
}

/// `true` when AICc should be used instead of AIC (`n < 40 k`).
pub fn prefer_aicc(k: usize, n: usize) -> bool {
    (n as f64) < AICC_DATA_PER_DIM * k as f64
}

/// BIC, AIC and AICc for one log-probability value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InformationCriteria {
    pub bic: f64,
    pub aic: f64,
    /// `None` when AICc is undefined for this `(n, k)`.
    pub aicc: Option<f64>,
}

impl InformationCriteria {
    pub fn compute(log_l: f64, k: usize, n: usize) -> Self {
        let aicc = match aicc(log_l, k, n) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        };
        Self {
            bic: bic(log_l, k, n),
            aic: aic(log_l, k),
            aicc,
        }
    }
}

/// Model-selection report at the MAP.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelectionScore {
    pub log_prior: f64,
    pub log_likelihood: f64,
    /// Criteria on the log-likelihood only.
    pub likelihood: InformationCriteria,
    /// Criteria on log-likelihood + log-prior.
    pub posterior: InformationCriteria,
    pub prefer_aicc: bool,
    pub k: usize,
    pub n: usize,
}

impl ModelSelectionScore {
    /// Score known log-prior and log-likelihood values.
    pub fn from_values(log_prior: f64, log_likelihood: f64, k: usize, n: usize) -> Self {
        Self {
            log_prior,
            log_likelihood,
            likelihood: InformationCriteria::compute(log_likelihood, k, n),
            posterior: InformationCriteria::compute(log_likelihood + log_prior, k, n),
            prefer_aicc: prefer_aicc(k, n),
            k,
            n,
        }
    }
}

/// Evaluate the model at the MAP and score it with `k = ndim`, `n = n_data`.
pub fn score_map<M: LikelihoodModel + ?Sized>(
    model: &M,
    map: &MapEstimate,
    ctx: &RunContext,
) -> Result<ModelSelectionScore, PostfitError> {
    let (log_prior, log_likelihood) = model.log_priors_likelihood(&map.parameters)?;
    Ok(ModelSelectionScore::from_values(
        log_prior,
        log_likelihood,
        ctx.ndim(),
        ctx.n_data(),
    ))
}

fn fmt_aicc(v: Option<f64>) -> String {
    v.map_or_else(|| "undefined".to_string(), |v| v.to_string())
}

impl fmt::Display for ModelSelectionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MAP log_priors     = {}", self.log_prior)?;
        writeln!(f, "MAP log_likelihood = {}", self.log_likelihood)?;
        writeln!(f)?;
        writeln!(f, " -- using the likelihood")?;
        writeln!(f, "BIC  = {}", self.likelihood.bic)?;
        writeln!(f, "AIC  = {}", self.likelihood.aic)?;
        writeln!(f, "AICc = {}", fmt_aicc(self.likelihood.aicc))?;
        writeln!(f)?;
        writeln!(f, " -- using the posterior (likelihood + priors)")?;
        writeln!(f, "BIC  = {}", self.posterior.bic)?;
        writeln!(f, "AIC  = {}", self.posterior.aic)?;
        writeln!(f, "AICc = {}", fmt_aicc(self.posterior.aicc))?;
        writeln!(f)?;
        if self.prefer_aicc {
            write!(
                f,
                "AICc suggested over AIC: {} data points < {} x {} parameters",
                self.n, AICC_DATA_PER_DIM, self.k
            )
        } else {
            write!(
                f,
                "AIC suggested over AICc: {} data points >= {} x {} parameters",
                self.n, AICC_DATA_PER_DIM, self.k
            )
        }
    }
}
