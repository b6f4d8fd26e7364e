use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Component must be fitted on reference data first")]
    NotFitted,

    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Upstream prediction failure: {0}")]
    Upstream(String),
}

pub type TrustResult<T> = Result<T, TrustError>;
