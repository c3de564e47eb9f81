pub mod constants;
pub mod density;
pub mod derived;
pub mod diagnostics;
pub mod kepler;
pub mod loader;
pub mod model_export;
pub mod model_selection;
pub mod orchestrator;
pub mod pipeline;
pub mod posterior;
pub mod postfit_errors;
pub mod run_context;
pub mod summary;

pub use pipeline::{Pipeline, PipelineReport};
pub use postfit_errors::PostfitError;
