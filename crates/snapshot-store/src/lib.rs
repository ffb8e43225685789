pub mod api;
pub mod classify;
pub mod copy;
pub mod errors;
pub mod export;
pub mod model;
pub mod options;
pub mod restore;

pub use api::{FieldMap, Snapshot};
pub use classify::GraphSafetyClassifier;
pub use copy::DeepCopyEngine;
pub use errors::{SnapErrKind, SnapError, SnapResult};
pub use export::CodeExporter;
pub use model::{
    CaptureReport, CapturedValue, Location, MissingTarget, Omission, OmissionReason,
    RestoreReport, UnsafeMember, UnsafeReason,
};
pub use options::{SnapshotOptions, CONTAINERS, GLOBALS_ALIAS, LEGACY_CONTAINERS};
pub use restore::Restorer;

#[cfg(test)]
mod tests;
