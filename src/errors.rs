use globalstate_policy_center::PolicyError;
use globalstate_snapshot_store::SnapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlobalStateError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Snapshot(#[from] SnapError),
    #[error("failed to read settings from {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid settings: {0}")]
    Config(String),
}

pub type GlobalStateResult<T> = Result<T, GlobalStateError>;
