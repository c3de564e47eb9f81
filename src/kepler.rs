//! Keplerian radial-velocity curves and the planet-derived quantities.
//!
//! The RV convention parametrises the orbit at the reference time by the mean longitude
//! `f = M₀ + ω`:
//!
//! ```text
//! M  = 2π · frac(1 + t/P + (f − ω)/2π)
//! E − e sin E = M
//! ν  = 2 atan( √((1+e)/(1−e)) · tan(E/2) )
//! RV = K (cos(ν + ω) + e cos ω)
//! ```
use roots::{find_root_brent, find_root_newton_raphson, SimpleConvergency};
use std::f64::consts::PI;

use crate::{
    constants::{
        Day, MeterPerSecond, Radian, SolarMass, AU_METERS, DPI, G_SI, MEARTH_MSUN, MSUN_KG,
        SECONDS_PER_DAY,
    },
    postfit_errors::PostfitError,
};

/// Lower bound of the phase grid of the folded curves.
pub const PHASE_START: f64 = -0.5;
/// Upper (excluded) bound of the phase grid.
pub const PHASE_END: f64 = 1.5;
/// Phase step of the folded curves.
pub const PHASE_STEP: f64 = 0.001;

/// Principal value of an angle in `[0, 2π)`.
pub fn principal_angle(a: Radian) -> Radian {
    a.rem_euclid(DPI)
}

/// Solve Kepler's equation `E − e sin E = M` for the eccentric anomaly.
///
/// Arguments
/// -----------------
/// * `mean_anomaly`: mean anomaly (rad).
/// * `ecc`: eccentricity, `0 <= e < 1`.
///
/// Return
/// ----------
/// * The eccentric anomaly, [`PostfitError::NumericalDomain`] for an eccentricity outside
///   `[0, 1)`, or [`PostfitError::RootFinding`] if Newton-Raphson does not converge.
pub fn eccentric_anomaly(mean_anomaly: Radian, ecc: f64) -> Result<Radian, PostfitError> {
    if !(0.0..1.0).contains(&ecc) {
        return Err(PostfitError::NumericalDomain(format!(
            "eccentricity {ecc} outside [0, 1)"
        )));
    }
    if ecc == 0.0 {
        return Ok(mean_anomaly);
    }

    let f = |x: f64| x - ecc * x.sin() - mean_anomaly;
    let df = |x: f64| 1.0 - ecc * x.cos();

    // Starting at π is safe for highly eccentric orbits
    let x0 = if ecc > 0.8 { PI } else { mean_anomaly };
    let mut tol = SimpleConvergency {
        eps: f64::EPSILON * 1e2,
        max_iter: 50,
    };
    Ok(find_root_newton_raphson(x0, &f, &df, &mut tol)?)
}

/// True anomaly from the eccentric anomaly.
pub fn true_anomaly(ecc_anomaly: Radian, ecc: f64) -> Radian {
    2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (ecc_anomaly / 2.0).tan()).atan()
}

/// Radial velocity at time `t` (days from the reference time).
///
/// Arguments
/// -----------------
/// * `t`: time relative to the reference time (days).
/// * `f`: mean longitude at the reference time (rad).
/// * `period`: orbital period (days).
/// * `k`: semi-amplitude (m/s).
/// * `ecc`: eccentricity.
/// * `omega`: argument of periastron (rad).
pub fn kepler_rv_t0p(
    t: Day,
    f: Radian,
    period: Day,
    k: MeterPerSecond,
    ecc: f64,
    omega: Radian,
) -> Result<MeterPerSecond, PostfitError> {
    if !(period > 0.0) {
        return Err(PostfitError::NumericalDomain(format!(
            "orbital period must be > 0, got {period}"
        )));
    }
    let cycles = 1.0 + t / period + (f - omega) / DPI;
    let mean_anomaly = DPI * (cycles - cycles.floor());
    let ecc_anomaly = eccentric_anomaly(mean_anomaly, ecc)?;
    let nu = true_anomaly(ecc_anomaly, ecc);
    Ok(k * ((nu + omega).cos() + ecc * omega.cos()))
}

/// Orbital elements entering the RV curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerOrbit {
    pub period: Day,
    pub semi_amplitude: MeterPerSecond,
    pub eccentricity: f64,
    pub omega: Radian,
    pub mean_longitude: Radian,
}

impl KeplerOrbit {
    /// RV at one time relative to the reference time.
    pub fn rv(&self, t: Day) -> Result<MeterPerSecond, PostfitError> {
        kepler_rv_t0p(
            t,
            self.mean_longitude,
            self.period,
            self.semi_amplitude,
            self.eccentricity,
            self.omega,
        )
    }

    /// RV curve over a time grid (times relative to the reference time).
    pub fn rv_curve(&self, times: &[Day]) -> Result<Vec<MeterPerSecond>, PostfitError> {
        times.iter().map(|&t| self.rv(t)).collect()
    }

    /// RV curve over the phase grid, as `(phase, rv)` pairs, evaluated at `t = phase · P`.
    pub fn phase_curve(&self) -> Result<Vec<(f64, MeterPerSecond)>, PostfitError> {
        phase_grid()
            .into_iter()
            .map(|x| Ok((x, self.rv(x * self.period)?)))
            .collect()
    }

    /// Minimum planetary mass in Earth masses (`sin i = 1`).
    pub fn minimum_mass_earth(&self, stellar_mass: SolarMass) -> Result<f64, PostfitError> {
        Ok(planet_mass(self.period, self.semi_amplitude, self.eccentricity, stellar_mass)?
            / MEARTH_MSUN)
    }
}

/// Phase grid `[-0.5, 1.5)` with a 0.001 step.
pub fn phase_grid() -> Vec<f64> {
    let n = ((PHASE_END - PHASE_START) / PHASE_STEP).round() as usize;
    (0..n).map(|i| PHASE_START + i as f64 * PHASE_STEP).collect()
}

/// Planetary mass (solar masses) from the spectroscopic mass function, with `sin i = 1`.
///
/// Solves `m³ / (M★ + m)² = P K³ (1 − e²)^{3/2} / (2π G)` with Brent's method on a
/// bracket that always holds the single positive root, companions heavier than the star
/// included.
pub fn planet_mass(
    period: Day,
    k: MeterPerSecond,
    ecc: f64,
    stellar_mass: SolarMass,
) -> Result<SolarMass, PostfitError> {
    if !(stellar_mass > 0.0) || !(period > 0.0) || !(0.0..1.0).contains(&ecc) {
        return Err(PostfitError::NumericalDomain(format!(
            "mass function undefined for P = {period}, e = {ecc}, M* = {stellar_mass}"
        )));
    }

    let mass_function = period * SECONDS_PER_DAY * k.abs().powi(3) * (1.0 - ecc * ecc).powf(1.5)
        / (DPI * G_SI)
        / MSUN_KG;
    if mass_function == 0.0 {
        return Ok(0.0);
    }

    // With u = (M★ + m)^{1/3} the residual is u³ − ∛fm·u² − M★, one sign change for u > 0,
    // so the root sits between m = 0 and m = (∛fm + ∛M★)³.
    let ms = stellar_mass;
    let cbrt_fm = mass_function.cbrt();
    let f = |m: f64| m - cbrt_fm * (ms + m).powf(2.0 / 3.0);

    let upper = (cbrt_fm + ms.cbrt()).powi(3);
    let mut tol = SimpleConvergency {
        eps: upper * 1e-13,
        max_iter: 200,
    };
    Ok(find_root_brent(0.0, upper, f, &mut tol)?)
}

/// Semi-major axis (AU) from Kepler's third law.
pub fn semi_major_axis_au(period: Day, stellar_mass: SolarMass, planet_mass: SolarMass) -> f64 {
    let p = period * SECONDS_PER_DAY;
    let gm = G_SI * (stellar_mass + planet_mass) * MSUN_KG;
    (gm * p * p / (DPI * DPI)).cbrt() / AU_METERS
}
