use std::collections::{HashMap, HashSet};

use globalstate_core_types::TypeHierarchy;

use crate::errors::PolicyResult;
use crate::model::ExclusionRules;

/// Rule set deciding which named locations and shared fields stay out of a
/// snapshot.
///
/// Rules are append-only: there is no way to narrow an exclusion once added.
/// Evaluation never mutates the policy, so one policy can back any number of
/// snapshots.
#[derive(Clone, Debug, Default)]
pub struct ExclusionPolicy {
    globals: HashSet<String>,
    types: HashSet<String>,
    prefixes: Vec<String>,
    subtypes_of: Vec<String>,
    implementors_of: Vec<String>,
    fields: HashMap<String, HashSet<String>>,
}

impl ExclusionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &ExclusionRules) -> Self {
        let mut policy = Self::new();
        policy.extend(rules);
        policy
    }

    pub fn extend(&mut self, rules: &ExclusionRules) {
        rules.globals.iter().for_each(|name| self.add_global(name));
        rules.types.iter().for_each(|ty| self.add_exact_type(ty));
        rules.prefixes.iter().for_each(|prefix| self.add_prefix(prefix));
        rules.subtypes_of.iter().for_each(|base| self.add_subtypes_of(base));
        rules
            .implementors_of
            .iter()
            .for_each(|iface| self.add_implementors_of(iface));
        for (ty, fields) in &rules.fields {
            fields.iter().for_each(|field| self.add_field(ty, field));
        }
    }

    pub fn add_global(&mut self, name: &str) {
        self.globals.insert(name.to_string());
    }

    pub fn add_exact_type(&mut self, ty: &str) {
        self.types.insert(ty.to_string());
    }

    pub fn add_prefix(&mut self, prefix: &str) {
        push_unique(&mut self.prefixes, prefix);
    }

    pub fn add_subtypes_of(&mut self, base: &str) {
        push_unique(&mut self.subtypes_of, base);
    }

    pub fn add_implementors_of(&mut self, interface: &str) {
        push_unique(&mut self.implementors_of, interface);
    }

    pub fn add_field(&mut self, owner: &str, field: &str) {
        self.fields
            .entry(owner.to_string())
            .or_default()
            .insert(field.to_string());
    }

    pub fn is_global_excluded(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    /// Whether the shared field `owner::field` is excluded.
    ///
    /// Checks run cheapest first and stop at the first match: exact type,
    /// prefix, subtype, implemented interface, then the explicit field list.
    /// Only the hierarchy checks consult `hierarchy`, and their failures are
    /// returned to the caller.
    pub fn is_field_excluded<H>(&self, hierarchy: &H, owner: &str, field: &str) -> PolicyResult<bool>
    where
        H: TypeHierarchy + ?Sized,
    {
        if self.types.contains(owner) {
            return Ok(true);
        }
        if self
            .prefixes
            .iter()
            .any(|prefix| owner.starts_with(prefix.as_str()))
        {
            return Ok(true);
        }
        for base in &self.subtypes_of {
            if hierarchy.is_subtype_of(owner, base)? {
                return Ok(true);
            }
        }
        for interface in &self.implementors_of {
            if hierarchy.implements(owner, interface)? {
                return Ok(true);
            }
        }
        Ok(self
            .fields
            .get(owner)
            .map(|fields| fields.contains(field))
            .unwrap_or(false))
    }

    /// Sorted, serializable view of the current rules.
    pub fn rules(&self) -> ExclusionRules {
        let mut globals: Vec<String> = self.globals.iter().cloned().collect();
        globals.sort();
        let mut types: Vec<String> = self.types.iter().cloned().collect();
        types.sort();
        ExclusionRules {
            globals,
            types,
            prefixes: self.prefixes.clone(),
            subtypes_of: self.subtypes_of.clone(),
            implementors_of: self.implementors_of.clone(),
            fields: self
                .fields
                .iter()
                .map(|(ty, fields)| {
                    let mut fields: Vec<String> = fields.iter().cloned().collect();
                    fields.sort();
                    (ty.clone(), fields)
                })
                .collect(),
        }
    }
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    if !target.iter().any(|existing| existing == value) {
        target.push(value.to_string());
    }
}
