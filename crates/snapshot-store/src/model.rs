use std::fmt;

use globalstate_core_types::{Graph, Heap, NodeId, StateError, Value};
use serde::{Deserialize, Serialize};

/// A value detached from live state at capture time.
///
/// The graph owns its nodes, so later mutation of live state never reaches
/// it. Attaching it to a heap produces a fresh copy each time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapturedValue(Graph);

impl CapturedValue {
    pub fn new(graph: Graph) -> Self {
        Self(graph)
    }

    pub fn scalar(value: Value) -> Self {
        Self(Graph::scalar(value))
    }

    pub fn graph(&self) -> &Graph {
        &self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_scalar()
    }

    /// The value itself when it is a scalar.
    pub fn as_scalar(&self) -> Option<&Value> {
        self.is_scalar().then(|| self.0.root())
    }

    pub fn attach(&self, heap: &mut Heap) -> Result<Value, StateError> {
        heap.attach(&self.0)
    }
}

impl From<Graph> for CapturedValue {
    fn from(graph: Graph) -> Self {
        Self(graph)
    }
}

/// A place in global state that capture or restore touched.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    Global { name: String },
    Container { name: String },
    ContainerEntry { container: String, key: String },
    Class { name: String },
    SharedField { class: String, field: String },
    Constant { name: String },
    Function { name: String },
}

impl Location {
    pub fn global(name: impl Into<String>) -> Self {
        Self::Global { name: name.into() }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::Container { name: name.into() }
    }

    pub fn container_entry(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ContainerEntry {
            container: container.into(),
            key: key.into(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class { name: name.into() }
    }

    pub fn shared_field(class: impl Into<String>, field: impl Into<String>) -> Self {
        Self::SharedField {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn constant(name: impl Into<String>) -> Self {
        Self::Constant { name: name.into() }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::Function { name: name.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Global { name } => write!(f, "global {name}"),
            Location::Container { name } => write!(f, "container {name}"),
            Location::ContainerEntry { container, key } => write!(f, "{container}[{key}]"),
            Location::Class { name } => write!(f, "class {name}"),
            Location::SharedField { class, field } => write!(f, "{class}::{field}"),
            Location::Constant { name } => write!(f, "constant {name}"),
            Location::Function { name } => write!(f, "function {name}"),
        }
    }
}

/// Why a reachable member makes a value unsafe to duplicate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnsafeReason {
    Resource { resource: String },
    AnonymousType,
    Unserializable { class: String },
    Dangling { node: NodeId },
}

impl fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeReason::Resource { resource } => write!(f, "resource handle ({resource})"),
            UnsafeReason::AnonymousType => f.write_str("instance of an anonymous type"),
            UnsafeReason::Unserializable { class } => {
                write!(f, "instance of non-serializable class {class}")
            }
            UnsafeReason::Dangling { node } => write!(f, "dangling reference {node}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UnsafeMember {
    /// Path from the inspected value, e.g. `$[handlers][0]`.
    pub path: String,
    pub reason: UnsafeReason,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OmissionReason {
    ExcludedByPolicy,
    Unsafe { members: Vec<UnsafeMember> },
    PolicyError { message: String },
    CopyFailed { message: String },
    Unreadable { message: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Omission {
    pub location: Location,
    pub reason: OmissionReason,
}

/// What a capture kept and what it left out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub captured: usize,
    pub omissions: Vec<Omission>,
}

impl CaptureReport {
    pub(crate) fn omit(&mut self, location: Location, reason: OmissionReason) {
        self.omissions.push(Omission { location, reason });
    }

    pub fn omission(&self, location: &Location) -> Option<&OmissionReason> {
        self.omissions
            .iter()
            .find(|omission| &omission.location == location)
            .map(|omission| &omission.reason)
    }

    pub fn excluded_count(&self) -> usize {
        self.count(|reason| matches!(reason, OmissionReason::ExcludedByPolicy))
    }

    pub fn unsafe_count(&self) -> usize {
        self.count(|reason| matches!(reason, OmissionReason::Unsafe { .. }))
    }

    fn count(&self, predicate: impl Fn(&OmissionReason) -> bool) -> usize {
        self.omissions
            .iter()
            .filter(|omission| predicate(&omission.reason))
            .count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTarget {
    pub location: Location,
    pub message: String,
}

/// Outcome of one restore operation. Missing targets never abort a restore.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub written: usize,
    pub deleted: usize,
    pub reset: usize,
    /// Heap nodes reclaimed once the restore finished.
    pub collected: usize,
    pub missing: Vec<MissingTarget>,
}

impl RestoreReport {
    pub(crate) fn missing(&mut self, location: Location, message: impl Into<String>) {
        self.missing.push(MissingTarget {
            location,
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: RestoreReport) {
        self.written += other.written;
        self.deleted += other.deleted;
        self.reset += other.reset;
        self.collected += other.collected;
        self.missing.extend(other.missing);
    }

    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }
}
