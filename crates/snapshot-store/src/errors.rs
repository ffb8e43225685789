use globalstate_core_types::StateError;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum SnapErrKind {
    #[error("deep copy failed: {0}")]
    CopyFailed(String),
    #[error("operation unsupported by runtime: {0}")]
    Unsupported(String),
    #[error("snapshot did not capture {0}")]
    NotCaptured(&'static str),
    #[error("export failed: {0}")]
    Export(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct SnapError(pub SnapErrKind);

impl SnapError {
    pub fn new(kind: SnapErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &SnapErrKind {
        &self.0
    }
}

impl From<SnapErrKind> for SnapError {
    fn from(kind: SnapErrKind) -> Self {
        SnapError(kind)
    }
}

/// Runtime failures that abort a restore. Missing targets never get here;
/// they are collected in the report instead.
impl From<StateError> for SnapError {
    fn from(value: StateError) -> Self {
        let kind = match value {
            StateError::Unsupported(message) => SnapErrKind::Unsupported(message),
            other => SnapErrKind::Internal(other.to_string()),
        };
        SnapError(kind)
    }
}

pub type SnapResult<T> = Result<T, SnapError>;
