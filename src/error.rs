use thiserror::Error;

#[derive(Debug, Error)]
pub enum EstimateError {
    /// No baseline entry for the record's industry code. The caller has to
    /// fix the input; retrying will not help.
    #[error("no industry baseline configured for code {0}")]
    UnknownIndustry(String),

    #[error("invalid baseline for industry {code}: {reason}")]
    InvalidBaseline { code: String, reason: String },

    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EstimateError>;
