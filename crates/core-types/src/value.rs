use std::fmt;

use indexmap::IndexMap;

/// Slot of a composite node inside a [`crate::Heap`] or [`crate::Graph`].
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value held by a named location, a container entry or a field.
///
/// Everything except [`Value::Ref`] is a scalar and is copied by value.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(tag = "t", content = "v", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(NodeId),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Ref(_))
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// Composite storage referenced through [`Value::Ref`].
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(tag = "node", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Ordered associative container.
    Array { entries: IndexMap<String, Value> },
    /// Instance of a named class.
    Object {
        class: String,
        fields: IndexMap<String, Value>,
    },
    /// Instance of an anonymous type, e.g. a closure with its bound variables.
    Closure { bound: IndexMap<String, Value> },
    /// Opaque handle to an external resource; never duplicable.
    Resource { kind: String },
}

impl Node {
    pub fn array<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Node::Array {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Node::Array {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(idx, v)| (idx.to_string(), v))
                .collect(),
        }
    }

    pub fn object<K, I>(class: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Node::Object {
            class: class.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn resource(kind: impl Into<String>) -> Self {
        Node::Resource { kind: kind.into() }
    }

    /// Immediate members, in declaration order.
    pub fn children(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        match self {
            Node::Array { entries } => Box::new(entries.iter().map(|(k, v)| (k.as_str(), v))),
            Node::Object { fields, .. } => Box::new(fields.iter().map(|(k, v)| (k.as_str(), v))),
            Node::Closure { bound } => Box::new(bound.iter().map(|(k, v)| (k.as_str(), v))),
            Node::Resource { .. } => Box::new(std::iter::empty()),
        }
    }

    pub fn children_mut(&mut self) -> Box<dyn Iterator<Item = &mut Value> + '_> {
        match self {
            Node::Array { entries } => Box::new(entries.values_mut()),
            Node::Object { fields, .. } => Box::new(fields.values_mut()),
            Node::Closure { bound } => Box::new(bound.values_mut()),
            Node::Resource { .. } => Box::new(std::iter::empty()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Array { .. } => "array",
            Node::Object { .. } => "object",
            Node::Closure { .. } => "closure",
            Node::Resource { .. } => "resource",
        }
    }
}
