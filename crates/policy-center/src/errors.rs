use globalstate_core_types::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("type hierarchy query failed: {0}")]
    Evaluation(#[from] StateError),
    #[error("invalid exclusion rules: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("unsupported exclusion rule: {0}")]
    UnsupportedRule(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
