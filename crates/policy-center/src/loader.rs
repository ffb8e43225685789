use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::api::ExclusionPolicy;
use crate::errors::{PolicyError, PolicyResult};
use crate::model::ExclusionRules;

const ENV_PREFIX: &str = "GLOBALSTATE_EXCLUDE__";
const ENV_JSON: &str = "GLOBALSTATE_EXCLUDE_JSON";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Builds a policy from an optional YAML rules file plus environment rules.
pub fn load_policy(path: Option<&Path>) -> PolicyResult<ExclusionPolicy> {
    let mut options = LoadOptions::default();
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    options.include_env = true;
    load_policy_with_options(&options)
}

pub fn load_policy_with_options(options: &LoadOptions) -> PolicyResult<ExclusionPolicy> {
    let mut rules = ExclusionRules::default();

    for path in &options.paths {
        if path.exists() {
            rules.merge(rules_from_file(path)?);
        } else {
            debug!(path = %path.display(), "exclusion rules file not found; skipping");
        }
    }

    if options.include_env {
        rules.merge(rules_from_env()?);
    }

    info!(
        globals = rules.globals.len(),
        types = rules.types.len(),
        prefixes = rules.prefixes.len(),
        subtypes_of = rules.subtypes_of.len(),
        implementors_of = rules.implementors_of.len(),
        field_owners = rules.fields.len(),
        "exclusion policy loaded"
    );
    Ok(ExclusionPolicy::from_rules(&rules))
}

pub fn rules_from_file(path: &Path) -> PolicyResult<ExclusionRules> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(format!("{}", err)))?;
    parse_rules(&content)
}

pub fn parse_rules(content: &str) -> PolicyResult<ExclusionRules> {
    if content.trim().is_empty() {
        return Ok(ExclusionRules::default());
    }
    serde_yaml::from_str(content).map_err(|err| PolicyError::Invalid(format!("{}", err)))
}

fn rules_from_env() -> PolicyResult<ExclusionRules> {
    let mut rules = ExclusionRules::default();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            apply_env_rule(&mut rules, &stripped.to_ascii_lowercase(), &raw)?;
        }
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let extra: ExclusionRules = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{}", err)))?;
            rules.merge(extra);
        }
    }

    Ok(rules)
}

fn apply_env_rule(rules: &mut ExclusionRules, rule: &str, raw: &str) -> PolicyResult<()> {
    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string);
    match rule {
        "globals" => rules.globals.extend(items),
        "types" => rules.types.extend(items),
        "prefixes" => rules.prefixes.extend(items),
        "subtypes_of" => rules.subtypes_of.extend(items),
        "implementors_of" => rules.implementors_of.extend(items),
        "fields" => {
            for item in items {
                let Some((owner, field)) = item.split_once("::") else {
                    return Err(PolicyError::InvalidValue(format!(
                        "expected Type::field, got {item}"
                    )));
                };
                if owner.is_empty() || field.is_empty() {
                    return Err(PolicyError::InvalidValue(format!(
                        "expected Type::field, got {item}"
                    )));
                }
                rules
                    .fields
                    .entry(owner.to_string())
                    .or_default()
                    .push(field.to_string());
            }
        }
        other => return Err(PolicyError::UnsupportedRule(other.to_string())),
    }
    Ok(())
}
