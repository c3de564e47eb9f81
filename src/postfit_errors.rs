use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostfitError {
    #[error("Raw artifact layout inconsistent with the declared dimensionality: {0}")]
    DataFormat(String),

    #[error("Expected raw artifact not found at: {0}")]
    MissingArtifact(Utf8PathBuf),

    #[error("Numerical domain error: {0}")]
    NumericalDomain(String),

    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),

    #[error("External sampler error: {0}")]
    ExternalSampler(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model '{model}' references unknown shared model '{reference}'")]
    UnknownModelReference { model: String, reference: String },

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ROOTS finding error: {0}")]
    RootFinding(#[from] roots::SearchError),
}

impl PartialEq for PostfitError {
    fn eq(&self, other: &Self) -> bool {
        use PostfitError::*;
        match (self, other) {
            (DataFormat(a), DataFormat(b)) => a == b,
            (MissingArtifact(a), MissingArtifact(b)) => a == b,
            (NumericalDomain(a), NumericalDomain(b)) => a == b,
            (DegenerateDistribution(a), DegenerateDistribution(b)) => a == b,
            (ExternalSampler(a), ExternalSampler(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (
                UnknownModelReference {
                    model: m1,
                    reference: r1,
                },
                UnknownModelReference {
                    model: m2,
                    reference: r2,
                },
            ) => m1 == m2 && r1 == r2,
            (RootFinding(a), RootFinding(b)) => a == b,

            // Wrapped library errors are not comparable: same variant is enough
            (Io(_), Io(_)) => true,
            (Csv(_), Csv(_)) => true,
            (Json(_), Json(_)) => true,

            _ => false,
        }
    }
}
