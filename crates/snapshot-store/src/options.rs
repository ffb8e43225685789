use serde::{Deserialize, Serialize};

/// Well-known request/environment containers, captured key by key.
pub const CONTAINERS: [&str; 7] = [
    "_ENV", "_POST", "_GET", "_COOKIE", "_SERVER", "_FILES", "_REQUEST",
];

/// Long-form aliases some hosts still expose next to [`CONTAINERS`].
pub const LEGACY_CONTAINERS: [&str; 6] = [
    "HTTP_ENV_VARS",
    "HTTP_POST_VARS",
    "HTTP_GET_VARS",
    "HTTP_COOKIE_VARS",
    "HTTP_SERVER_VARS",
    "HTTP_POST_FILES",
];

/// Self-referencing alias of the global table; never a free global.
pub const GLOBALS_ALIAS: &str = "GLOBALS";

/// Which categories a snapshot captures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotOptions {
    pub global_variables: bool,
    pub container_variables: bool,
    pub shared_fields: bool,
    pub constants: bool,
    pub functions: bool,
    pub classes: bool,
    pub interfaces: bool,
    pub traits: bool,
    pub settings: bool,
    pub loaded_files: bool,
    /// Also treat [`LEGACY_CONTAINERS`] as well-known containers.
    pub legacy_containers: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl SnapshotOptions {
    pub fn all() -> Self {
        Self {
            global_variables: true,
            container_variables: true,
            shared_fields: true,
            constants: true,
            functions: true,
            classes: true,
            interfaces: true,
            traits: true,
            settings: true,
            loaded_files: true,
            legacy_containers: false,
        }
    }

    pub fn none() -> Self {
        Self {
            global_variables: false,
            container_variables: false,
            shared_fields: false,
            constants: false,
            functions: false,
            classes: false,
            interfaces: false,
            traits: false,
            settings: false,
            loaded_files: false,
            legacy_containers: false,
        }
    }

    /// Variables only: free globals, containers and shared fields.
    pub fn variables() -> Self {
        Self {
            global_variables: true,
            container_variables: true,
            shared_fields: true,
            ..Self::none()
        }
    }

    /// The class listing is needed both on its own and to enumerate shared
    /// fields.
    pub fn lists_classes(&self) -> bool {
        self.classes || self.shared_fields
    }

    pub fn container_names(&self) -> Vec<&'static str> {
        let mut names = CONTAINERS.to_vec();
        if self.legacy_containers {
            names.extend(LEGACY_CONTAINERS);
        }
        names
    }

    /// Names that are never free globals under these options.
    pub fn is_reserved_name(&self, name: &str) -> bool {
        name == GLOBALS_ALIAS
            || CONTAINERS.contains(&name)
            || (self.legacy_containers && LEGACY_CONTAINERS.contains(&name))
    }
}
