//! # Constants and type definitions for orbpost
//!
//! This module centralizes the **physical constants**, **statistical constants**,
//! **artifact file names** and **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Astronomical constants used by the planet-derived quantities
//! - Percentiles defining the Gaussian-equivalent ±1σ credible interval
//! - Histogram and clipping constants of the density reduction
//! - Conventional file names of raw artifacts and exports

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Astronomical Unit in meters (IAU 2012)
pub const AU_METERS: f64 = 149_597_870_700.0;

/// Newtonian constant of gravitation (m³ kg⁻¹ s⁻²)
pub const G_SI: f64 = 6.674_30e-11;

/// Nominal solar mass (kg)
pub const MSUN_KG: f64 = 1.988_47e30;

/// Nominal Earth mass (kg)
pub const MEARTH_KG: f64 = 5.972_17e24;

/// Earth mass in solar masses
pub const MEARTH_MSUN: f64 = MEARTH_KG / MSUN_KG;

// -------------------------------------------------------------------------------------------------
// Statistical constants
// -------------------------------------------------------------------------------------------------

/// Lower Gaussian-equivalent 1σ percentile
pub const P_LOW: f64 = 15.865;

/// Median percentile
pub const P_MED: f64 = 50.0;

/// Upper Gaussian-equivalent 1σ percentile
pub const P_HIGH: f64 = 84.135;

/// Multiplier applied to n_dim in the AIC/AICc recommendation threshold
pub const AICC_DATA_PER_DIM: f64 = 40.0;

/// Number of bins of every 1D/2D histogram (edges = bins + 1)
pub const HIST_BINS: usize = 30;

/// Clipping half-width, in units of the one-sided sigma
pub const CLIP_SIGMAS: f64 = 5.0;

/// Name given to the log-posterior column in the density input
pub const LN_PROB_NAME: &str = "ln_prob";

/// Gelman-Rubin threshold above which a parameter is reported as not converged
pub const GELMAN_RUBIN_THRESHOLD: f64 = 1.01;

// -------------------------------------------------------------------------------------------------
// Conventional artifact names
// -------------------------------------------------------------------------------------------------

/// Ensemble sampler dump
pub const ENSEMBLE_CHAIN_FILE: &str = "emcee_chain.json";

/// Nested-sampling variant A (MultiNest) equal-weight table
pub const NESTED_A_FILE: &str = "post_equal_weights.dat";

/// Nested-sampling variant B (PolyChord) equal-weight table
pub const NESTED_B_FILE: &str = "pyorbit_equal_weights.txt";

/// Zero-content file marking a completed nested-sampling stage
pub const COMPLETION_MARKER_FILE: &str = "nested_sampling.completed";

/// Persisted run context
pub const RUN_CONTEXT_FILE: &str = "run_context.json";

/// Compressed 1D histogram store
pub const HIST1D_STORE_FILE: &str = "_hist1d.json.gz";

/// Group holding the 1D datasets inside the store
pub const HIST1D_GROUP: &str = "hist1d";

/// Prefix of every 2D histogram CSV file
pub const HIST2D_PREFIX: &str = "_hist2d___";

/// Median/sigma text summary
pub const MEDIAN_SIGMAS_FILE: &str = "median_sigmas.txt";

/// Sub-directory of the pipeline output holding the density exports
pub const DENSITY_DIR: &str = "density";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Time in days (BJD or BJD − Tref depending on context)
pub type Day = f64;
/// Velocity in m/s
pub type MeterPerSecond = f64;
/// Mass in solar masses
pub type SolarMass = f64;
