use std::collections::HashSet;
use std::path::PathBuf;

use globalstate_core_types::{
    Graph, Heap, Introspection, Node, Runtime, Setting, SharedField, StateError, TypeHierarchy,
    Value,
};
use indexmap::IndexMap;
use tracing::debug;

mod decl;

pub use decl::{ClassDecl, FieldDecl, InterfaceDecl, Origin};

#[derive(Debug)]
struct ClassState {
    decl: ClassDecl,
    values: IndexMap<String, Option<Value>>,
}

#[derive(Debug)]
struct Constant {
    value: Value,
    origin: Origin,
}

/// Live process state kept entirely in memory.
///
/// Stands in for the host runtime: it owns the heap, the global name table,
/// declared types and the immutable-at-capture categories.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    heap: Heap,
    globals: IndexMap<String, Value>,
    classes: IndexMap<String, ClassState>,
    interfaces: IndexMap<String, InterfaceDecl>,
    traits: IndexMap<String, Origin>,
    constants: IndexMap<String, Constant>,
    functions: IndexMap<String, Origin>,
    settings: IndexMap<String, Setting>,
    loaded_files: Vec<PathBuf>,
    function_removal: bool,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows [`Runtime::remove_function`] to succeed.
    pub fn with_function_removal(mut self) -> Self {
        self.function_removal = true;
        self
    }

    pub fn alloc(&mut self, node: Node) -> Result<Value, StateError> {
        self.heap.alloc_ref(node)
    }

    /// Replaces a well-known container with a fresh array of `entries`.
    pub fn set_container<K, I>(&mut self, name: &str, entries: I) -> Result<(), StateError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let array = self.alloc(Node::array(entries))?;
        self.globals.insert(name.to_string(), array);
        Ok(())
    }

    pub fn declare_class(&mut self, decl: ClassDecl) -> Result<(), StateError> {
        if let Some(parent) = &decl.parent {
            if !self.classes.contains_key(parent) {
                return Err(StateError::UnknownClass(parent.clone()));
            }
        }
        if let Some(missing) = decl
            .interfaces
            .iter()
            .find(|iface| !self.interfaces.contains_key(iface.as_str()))
        {
            return Err(StateError::UnknownType(missing.clone()));
        }
        let mut values = IndexMap::new();
        for field in &decl.fields {
            let value = match &field.default {
                Some(graph) => Some(self.heap.attach(graph)?),
                None => None,
            };
            values.insert(field.name.clone(), value);
        }
        debug!(class = %decl.name, origin = ?decl.origin, "class declared");
        self.classes
            .insert(decl.name.clone(), ClassState { decl, values });
        Ok(())
    }

    pub fn declare_interface(&mut self, decl: InterfaceDecl) -> Result<(), StateError> {
        if let Some(missing) = decl
            .extends
            .iter()
            .find(|iface| !self.interfaces.contains_key(iface.as_str()))
        {
            return Err(StateError::UnknownType(missing.clone()));
        }
        self.interfaces.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn declare_trait(&mut self, name: &str, origin: Origin) {
        self.traits.insert(name.to_string(), origin);
    }

    pub fn define_constant(&mut self, name: &str, value: Value, origin: Origin) {
        self.constants
            .insert(name.to_string(), Constant { value, origin });
    }

    pub fn declare_function(&mut self, name: &str, origin: Origin) {
        self.functions.insert(name.to_string(), origin);
    }

    pub fn set_setting(&mut self, name: &str, setting: Setting) {
        self.settings.insert(name.to_string(), setting);
    }

    pub fn add_loaded_file(&mut self, path: impl Into<PathBuf>) {
        self.loaded_files.push(path.into());
    }

    /// Current value of an initialized shared field.
    pub fn shared_field(&self, class: &str, field: &str) -> Option<&Value> {
        self.classes
            .get(class)
            .and_then(|state| state.values.get(field))
            .and_then(Option::as_ref)
    }

    fn container_node_mut(
        &mut self,
        container: &str,
    ) -> Result<&mut IndexMap<String, Value>, StateError> {
        let id = self
            .globals
            .get(container)
            .and_then(Value::node_id)
            .ok_or_else(|| StateError::UnknownContainer(container.to_string()))?;
        match self.heap.get_mut(id) {
            Some(Node::Array { entries }) => Ok(entries),
            _ => Err(StateError::UnknownContainer(container.to_string())),
        }
    }

    fn is_type_known(&self, ty: &str) -> bool {
        self.classes.contains_key(ty) || self.interfaces.contains_key(ty)
    }

    /// Interfaces reachable from `interface` through `extends`, itself included.
    fn interface_closure<'a>(&'a self, interface: &'a str, out: &mut HashSet<&'a str>) {
        let mut pending = vec![interface];
        while let Some(name) = pending.pop() {
            if !out.insert(name) {
                continue;
            }
            if let Some(decl) = self.interfaces.get(name) {
                pending.extend(decl.extends.iter().map(String::as_str));
            }
        }
    }
}

impl TypeHierarchy for InMemoryRuntime {
    fn is_subtype_of(&self, ty: &str, base: &str) -> Result<bool, StateError> {
        for name in [ty, base] {
            if !self.is_type_known(name) {
                return Err(StateError::UnknownType(name.to_string()));
            }
        }
        if let Some(decl) = self.interfaces.get(ty) {
            let mut reachable = HashSet::new();
            for parent in &decl.extends {
                self.interface_closure(parent, &mut reachable);
            }
            return Ok(reachable.contains(base));
        }
        let mut current = self.classes.get(ty).and_then(|c| c.decl.parent.as_deref());
        while let Some(parent) = current {
            if parent == base {
                return Ok(true);
            }
            current = self.classes.get(parent).and_then(|c| c.decl.parent.as_deref());
        }
        Ok(false)
    }

    fn implements(&self, ty: &str, interface: &str) -> Result<bool, StateError> {
        if !self.is_type_known(ty) {
            return Err(StateError::UnknownType(ty.to_string()));
        }
        if !self.interfaces.contains_key(interface) {
            return Err(StateError::UnknownType(interface.to_string()));
        }
        let mut reachable = HashSet::new();
        if self.interfaces.contains_key(ty) {
            self.interface_closure(ty, &mut reachable);
            return Ok(reachable.contains(interface));
        }
        let mut current = self.classes.get(ty);
        while let Some(class) = current {
            for iface in &class.decl.interfaces {
                self.interface_closure(iface, &mut reachable);
            }
            current = class
                .decl
                .parent
                .as_deref()
                .and_then(|parent| self.classes.get(parent));
        }
        Ok(reachable.contains(interface))
    }
}

impl Introspection for InMemoryRuntime {
    fn heap(&self) -> &Heap {
        &self.heap
    }

    fn is_serializable(&self, class: &str) -> bool {
        self.classes
            .get(class)
            .map(|state| state.decl.serializable)
            .unwrap_or(true)
    }
}

impl Runtime for InMemoryRuntime {
    fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    fn global_names(&self) -> Vec<String> {
        self.globals.keys().cloned().collect()
    }

    fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    fn remove_global(&mut self, name: &str) -> bool {
        self.globals.shift_remove(name).is_some()
    }

    fn container_entries(&self, container: &str) -> Option<Vec<(String, Value)>> {
        let id = self.globals.get(container)?.node_id()?;
        match self.heap.get(id)? {
            Node::Array { entries } => Some(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn set_container_entry(
        &mut self,
        container: &str,
        key: &str,
        value: Value,
    ) -> Result<(), StateError> {
        self.container_node_mut(container)?
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_container_entry(&mut self, container: &str, key: &str) -> Result<bool, StateError> {
        Ok(self
            .container_node_mut(container)?
            .shift_remove(key)
            .is_some())
    }

    fn declared_classes(&self) -> Vec<String> {
        self.classes
            .values()
            .filter(|state| state.decl.origin == Origin::User)
            .map(|state| state.decl.name.clone())
            .collect()
    }

    fn declared_interfaces(&self) -> Vec<String> {
        self.interfaces
            .values()
            .filter(|decl| decl.origin == Origin::User)
            .map(|decl| decl.name.clone())
            .collect()
    }

    fn declared_traits(&self) -> Vec<String> {
        user_names(&self.traits)
    }

    fn shared_fields(&self, class: &str) -> Result<Vec<SharedField>, StateError> {
        let state = self
            .classes
            .get(class)
            .ok_or_else(|| StateError::UnknownClass(class.to_string()))?;
        Ok(state
            .decl
            .fields
            .iter()
            .map(|field| SharedField {
                name: field.name.clone(),
                value: state.values.get(&field.name).cloned().flatten(),
                default: field.default.clone(),
            })
            .collect())
    }

    fn set_shared_field(
        &mut self,
        class: &str,
        field: &str,
        value: Value,
    ) -> Result<(), StateError> {
        let state = self
            .classes
            .get_mut(class)
            .ok_or_else(|| StateError::UnknownClass(class.to_string()))?;
        let slot = state
            .values
            .get_mut(field)
            .ok_or_else(|| StateError::UnknownField {
                class: class.to_string(),
                field: field.to_string(),
            })?;
        *slot = Some(value);
        Ok(())
    }

    fn constants(&self) -> Vec<(String, Value)> {
        self.constants
            .iter()
            .filter(|(_, constant)| constant.origin == Origin::User)
            .map(|(name, constant)| (name.clone(), constant.value.clone()))
            .collect()
    }

    fn function_names(&self) -> Vec<String> {
        user_names(&self.functions)
    }

    fn remove_function(&mut self, name: &str) -> Result<(), StateError> {
        if !self.function_removal {
            return Err(StateError::Unsupported(format!("remove function {name}")));
        }
        match self.functions.get(name) {
            Some(Origin::User) => {
                self.functions.shift_remove(name);
                Ok(())
            }
            Some(Origin::Builtin) => Err(StateError::Unsupported(format!(
                "remove builtin function {name}"
            ))),
            None => Err(StateError::new(format!("unknown function {name}"))),
        }
    }

    fn settings(&self) -> Vec<(String, Setting)> {
        self.settings
            .iter()
            .map(|(name, setting)| (name.clone(), setting.clone()))
            .collect()
    }

    fn loaded_files(&self) -> Vec<PathBuf> {
        self.loaded_files.clone()
    }

    fn collect_garbage(&mut self) -> usize {
        let roots = self
            .globals
            .values_mut()
            .chain(
                self.classes
                    .values_mut()
                    .flat_map(|state| state.values.values_mut().flatten()),
            )
            .chain(
                self.constants
                    .values_mut()
                    .map(|constant| &mut constant.value),
            );
        let freed = self.heap.collect(roots);
        debug!(freed, live = self.heap.len(), "heap collected");
        freed
    }
}

fn user_names(table: &IndexMap<String, Origin>) -> Vec<String> {
    table
        .iter()
        .filter(|(_, origin)| **origin == Origin::User)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Convenience for declaring a field default made of one scalar-only array.
pub fn array_default<K, I>(entries: I) -> Graph
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Graph::single(Node::array(entries))
}
