use std::path::PathBuf;

use crate::heap::{Graph, Heap};
use crate::value::Value;
use crate::StateError;

/// Type-hierarchy facts about named types.
pub trait TypeHierarchy {
    /// Whether `ty` transitively extends `base`. A type is not its own subtype.
    fn is_subtype_of(&self, ty: &str, base: &str) -> Result<bool, StateError>;

    /// Whether `ty` transitively implements `interface`.
    fn implements(&self, ty: &str, interface: &str) -> Result<bool, StateError>;
}

/// Structural access to composite values.
pub trait Introspection {
    fn heap(&self) -> &Heap;

    /// Whether instances of `class` survive a structural encode. Classes that
    /// wrap external state not visible as fields answer `false`.
    fn is_serializable(&self, class: &str) -> bool;
}

/// Scope in which a configuration setting may be changed.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SettingScope {
    User,
    PerDirectory,
    System,
    All,
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setting {
    pub value: Option<String>,
    pub scope: SettingScope,
}

impl Setting {
    pub fn new(value: impl Into<String>, scope: SettingScope) -> Self {
        Self {
            value: Some(value.into()),
            scope,
        }
    }
}

/// A class-scoped shared field as seen at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct SharedField {
    pub name: String,
    /// `None` while the field is uninitialized.
    pub value: Option<Value>,
    /// Statically declared default, when the declaration carries one.
    pub default: Option<Graph>,
}

/// Everything the snapshot machinery needs from the host runtime.
///
/// Listings of classes, interfaces, traits, constants and functions are
/// restricted to user-defined entries and keep declaration order.
pub trait Runtime: TypeHierarchy + Introspection {
    fn heap_mut(&mut self) -> &mut Heap;

    fn global_names(&self) -> Vec<String>;
    fn global(&self, name: &str) -> Option<&Value>;
    fn set_global(&mut self, name: &str, value: Value);
    fn remove_global(&mut self, name: &str) -> bool;

    /// Entries of a well-known container; `None` when the container is not
    /// present or does not hold an associative array.
    fn container_entries(&self, container: &str) -> Option<Vec<(String, Value)>>;
    fn set_container_entry(
        &mut self,
        container: &str,
        key: &str,
        value: Value,
    ) -> Result<(), StateError>;
    fn remove_container_entry(&mut self, container: &str, key: &str) -> Result<bool, StateError>;

    fn declared_classes(&self) -> Vec<String>;
    fn declared_interfaces(&self) -> Vec<String>;
    fn declared_traits(&self) -> Vec<String>;

    fn shared_fields(&self, class: &str) -> Result<Vec<SharedField>, StateError>;
    /// Writes a shared field regardless of its declared visibility.
    fn set_shared_field(&mut self, class: &str, field: &str, value: Value)
        -> Result<(), StateError>;

    fn constants(&self) -> Vec<(String, Value)>;
    fn function_names(&self) -> Vec<String>;

    fn remove_function(&mut self, name: &str) -> Result<(), StateError> {
        Err(StateError::Unsupported(format!("remove function {name}")))
    }

    fn settings(&self) -> Vec<(String, Setting)>;
    fn loaded_files(&self) -> Vec<PathBuf>;

    /// Frees composite storage no live location can reach and returns how
    /// many nodes went. Node ids taken before the call may be stale after it.
    fn collect_garbage(&mut self) -> usize {
        0
    }
}
