use std::fmt;

use thiserror::Error;
use uuid::Uuid;

mod heap;
mod runtime;
mod value;

pub use heap::{Graph, Heap};
pub use runtime::{Introspection, Runtime, Setting, SettingScope, SharedField, TypeHierarchy};
pub use value::{Node, NodeId, Value};

/// Failure reported by a runtime collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown shared field {class}::{field}")]
    UnknownField { class: String, field: String },
    #[error("unknown container: {0}")]
    UnknownContainer(String),
    #[error("operation not supported by runtime: {0}")]
    Unsupported(String),
    #[error("reference {0} points outside its graph")]
    DanglingReference(NodeId),
    #[error("heap has no room for {0} more nodes")]
    HeapExhausted(usize),
    #[error("{message}")]
    Message { message: String },
}

impl StateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
