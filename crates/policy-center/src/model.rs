use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serializable form of an exclusion rule set, as read from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExclusionRules {
    /// Free-global names never captured or restored.
    pub globals: Vec<String>,
    /// Exact type names whose shared fields are skipped.
    pub types: Vec<String>,
    /// Type-name prefixes whose shared fields are skipped.
    pub prefixes: Vec<String>,
    /// Base types; shared fields of any subtype are skipped.
    pub subtypes_of: Vec<String>,
    /// Interfaces; shared fields of any implementor are skipped.
    pub implementors_of: Vec<String>,
    /// Individual shared fields, keyed by owning type.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ExclusionRules {
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
            && self.types.is_empty()
            && self.prefixes.is_empty()
            && self.subtypes_of.is_empty()
            && self.implementors_of.is_empty()
            && self.fields.values().all(Vec::is_empty)
    }

    /// Appends every rule of `other`. Rules only ever widen.
    pub fn merge(&mut self, other: ExclusionRules) {
        self.globals.extend(other.globals);
        self.types.extend(other.types);
        self.prefixes.extend(other.prefixes);
        self.subtypes_of.extend(other.subtypes_of);
        self.implementors_of.extend(other.implementors_of);
        for (ty, fields) in other.fields {
            self.fields.entry(ty).or_default().extend(fields);
        }
    }
}
