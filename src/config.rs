//! Settings for capture categories, exclusion rules and logging.
//!
//! Resolution order: built-in defaults, then a YAML file, then
//! `GLOBALSTATE__SECTION__KEY` environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use globalstate_policy_center::ExclusionRules;
use globalstate_snapshot_store::SnapshotOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{GlobalStateError, GlobalStateResult};

const ENV_PREFIX: &str = "GLOBALSTATE__";
const LOCAL_SETTINGS: &str = "config/globalstate.yaml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub log_level: String,
    pub capture: SnapshotOptions,
    pub exclusions: ExclusionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: String::from("info"),
            capture: SnapshotOptions::default(),
            exclusions: ExclusionSettings::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExclusionSettings {
    /// Extra rules document loaded through the policy loader.
    pub rules_file: Option<PathBuf>,
    /// Whether `GLOBALSTATE_EXCLUDE__*` variables widen the rules.
    pub include_env: bool,
    pub rules: ExclusionRules,
}

impl Default for ExclusionSettings {
    fn default() -> Self {
        Self {
            rules_file: None,
            include_env: true,
            rules: ExclusionRules::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from the first default location that
    /// exists. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> GlobalStateResult<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_path(),
        };

        let mut settings = match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path).map_err(|err| GlobalStateError::Io {
                    path: path.display().to_string(),
                    message: err.to_string(),
                })?;
                let settings = Self::from_yaml(&content)?;
                info!(path = %path.display(), "settings loaded");
                settings
            }
            Some(path) => {
                debug!(path = %path.display(), "settings file not found; using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        settings.apply_env_overrides(env::vars())?;
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> GlobalStateResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|err| GlobalStateError::Config(err.to_string()))
    }

    /// Applies `GLOBALSTATE__SECTION__KEY=value` pairs; other keys are ignored.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> GlobalStateResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, raw) in vars {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path = stripped.to_ascii_lowercase();
            let value = raw.trim();
            match path.split_once("__") {
                None if path == "log_level" => self.log_level = value.to_string(),
                Some(("capture", flag)) => {
                    let enabled = parse_bool(&key, value)?;
                    self.set_capture_flag(flag, enabled)
                        .ok_or_else(|| unknown_key(&key))?;
                }
                Some(("exclusions", "rules_file")) => {
                    self.exclusions.rules_file =
                        (!value.is_empty()).then(|| PathBuf::from(value));
                }
                Some(("exclusions", "include_env")) => {
                    self.exclusions.include_env = parse_bool(&key, value)?;
                }
                _ => return Err(unknown_key(&key)),
            }
        }
        Ok(())
    }

    fn set_capture_flag(&mut self, flag: &str, enabled: bool) -> Option<()> {
        let capture = &mut self.capture;
        let slot = match flag {
            "global_variables" => &mut capture.global_variables,
            "container_variables" => &mut capture.container_variables,
            "shared_fields" => &mut capture.shared_fields,
            "constants" => &mut capture.constants,
            "functions" => &mut capture.functions,
            "classes" => &mut capture.classes,
            "interfaces" => &mut capture.interfaces,
            "traits" => &mut capture.traits,
            "settings" => &mut capture.settings,
            "loaded_files" => &mut capture.loaded_files,
            "legacy_containers" => &mut capture.legacy_containers,
            _ => return None,
        };
        *slot = enabled;
        Some(())
    }
}

/// `./config/globalstate.yaml`, else `<config dir>/globalstate/config.yaml`.
pub fn default_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_SETTINGS);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|mut path| {
        path.push("globalstate");
        path.push("config.yaml");
        path
    })
}

fn parse_bool(key: &str, value: &str) -> GlobalStateResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GlobalStateError::Config(format!(
            "{key}: expected a boolean, got {value:?}"
        ))),
    }
}

fn unknown_key(key: &str) -> GlobalStateError {
    GlobalStateError::Config(format!("unknown setting {key}"))
}
