use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use globalstate_core_types::{Runtime, Setting, SnapshotId, Value};
use globalstate_policy_center::ExclusionPolicy;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::classify::GraphSafetyClassifier;
use crate::copy::DeepCopyEngine;
use crate::model::{CaptureReport, CapturedValue, Location, OmissionReason};
use crate::options::SnapshotOptions;

pub type FieldMap = IndexMap<String, CapturedValue>;

/// Immutable record of global state taken at one instant.
///
/// Categories not selected by the options are left empty. Values that were
/// excluded or unsafe to duplicate are absent and listed in [`Snapshot::report`].
#[derive(Clone, Debug)]
pub struct Snapshot {
    id: SnapshotId,
    taken_at: DateTime<Utc>,
    policy: Arc<ExclusionPolicy>,
    options: SnapshotOptions,
    globals: FieldMap,
    containers: IndexMap<String, FieldMap>,
    shared_fields: IndexMap<String, FieldMap>,
    constants: FieldMap,
    functions: Vec<String>,
    classes: Option<Vec<String>>,
    interfaces: Vec<String>,
    traits: Vec<String>,
    settings: IndexMap<String, Setting>,
    loaded_files: Vec<PathBuf>,
    report: CaptureReport,
}

impl Snapshot {
    /// Reads `runtime` once per selected category. Never fails: anything that
    /// cannot be captured is omitted and reported.
    pub fn capture<R>(policy: Arc<ExclusionPolicy>, runtime: &R, options: SnapshotOptions) -> Self
    where
        R: Runtime + ?Sized,
    {
        let mut snapshot = Snapshot {
            id: SnapshotId::new(),
            taken_at: Utc::now(),
            policy,
            options,
            globals: IndexMap::new(),
            containers: IndexMap::new(),
            shared_fields: IndexMap::new(),
            constants: IndexMap::new(),
            functions: Vec::new(),
            classes: None,
            interfaces: Vec::new(),
            traits: Vec::new(),
            settings: IndexMap::new(),
            loaded_files: Vec::new(),
            report: CaptureReport::default(),
        };
        let mut capture = Capture {
            runtime,
            report: &mut snapshot.report,
        };

        if options.constants {
            for (name, value) in runtime.constants() {
                if let Some(captured) = capture.value(Location::constant(&name), &value) {
                    snapshot.constants.insert(name, captured);
                }
            }
        }
        if options.functions {
            snapshot.functions = runtime.function_names();
        }
        if options.lists_classes() {
            snapshot.classes = Some(runtime.declared_classes());
        }
        if options.interfaces {
            snapshot.interfaces = runtime.declared_interfaces();
        }
        if options.global_variables {
            snapshot.globals = capture.globals(&snapshot.policy, &options);
        }
        if options.container_variables {
            snapshot.containers = capture.containers(&snapshot.policy, &options);
        }
        if options.shared_fields {
            let classes = snapshot.classes.as_deref().unwrap_or_default();
            snapshot.shared_fields = capture.shared_fields(&snapshot.policy, classes);
        }
        if options.traits {
            snapshot.traits = runtime.declared_traits();
        }
        if options.settings {
            snapshot.settings = runtime.settings().into_iter().collect();
        }
        if options.loaded_files {
            snapshot.loaded_files = runtime.loaded_files();
        }

        info!(
            snapshot = %snapshot.id,
            captured = snapshot.report.captured,
            excluded = snapshot.report.excluded_count(),
            unsafe_values = snapshot.report.unsafe_count(),
            omitted = snapshot.report.omissions.len(),
            "snapshot captured"
        );
        snapshot
    }

    pub fn id(&self) -> &SnapshotId {
        &self.id
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn policy(&self) -> &Arc<ExclusionPolicy> {
        &self.policy
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    pub fn global_variables(&self) -> &FieldMap {
        &self.globals
    }

    /// Containers considered by this snapshot, captured or not.
    pub fn container_names(&self) -> Vec<&'static str> {
        self.options.container_names()
    }

    pub fn container_variables(&self) -> &IndexMap<String, FieldMap> {
        &self.containers
    }

    /// Captured shared fields per class; classes with nothing captured are
    /// absent.
    pub fn shared_fields(&self) -> &IndexMap<String, FieldMap> {
        &self.shared_fields
    }

    pub fn constants(&self) -> &FieldMap {
        &self.constants
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn classes(&self) -> &[String] {
        self.classes.as_deref().unwrap_or_default()
    }

    /// The class listing, or `None` when it was not captured.
    pub fn captured_classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn traits(&self) -> &[String] {
        &self.traits
    }

    pub fn settings(&self) -> &IndexMap<String, Setting> {
        &self.settings
    }

    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded_files
    }

    pub fn report(&self) -> &CaptureReport {
        &self.report
    }
}

struct Capture<'a, R: Runtime + ?Sized> {
    runtime: &'a R,
    report: &'a mut CaptureReport,
}

impl<'a, R: Runtime + ?Sized> Capture<'a, R> {
    fn globals(&mut self, policy: &ExclusionPolicy, options: &SnapshotOptions) -> FieldMap {
        let mut captured = IndexMap::new();
        for name in self.runtime.global_names() {
            if options.is_reserved_name(&name) {
                continue;
            }
            if policy.is_global_excluded(&name) {
                self.report
                    .omit(Location::global(&name), OmissionReason::ExcludedByPolicy);
                continue;
            }
            let Some(value) = self.runtime.global(&name) else {
                continue;
            };
            if let Some(copy) = self.value(Location::global(&name), value) {
                captured.insert(name, copy);
            }
        }
        captured
    }

    fn containers(
        &mut self,
        policy: &ExclusionPolicy,
        options: &SnapshotOptions,
    ) -> IndexMap<String, FieldMap> {
        let mut captured = IndexMap::new();
        for container in options.container_names() {
            if policy.is_global_excluded(container) {
                self.report
                    .omit(Location::container(container), OmissionReason::ExcludedByPolicy);
                continue;
            }
            let entries = match self.runtime.container_entries(container) {
                Some(entries) => entries,
                None => {
                    debug!(container, "container absent; captured as empty");
                    Vec::new()
                }
            };
            let mut copies = IndexMap::new();
            for (key, value) in entries {
                if let Some(copy) = self.value(Location::container_entry(container, &key), &value)
                {
                    copies.insert(key, copy);
                }
            }
            captured.insert(container.to_string(), copies);
        }
        captured
    }

    fn shared_fields(
        &mut self,
        policy: &ExclusionPolicy,
        classes: &[String],
    ) -> IndexMap<String, FieldMap> {
        let mut captured = IndexMap::new();
        for class in classes {
            let fields = match self.runtime.shared_fields(class) {
                Ok(fields) => fields,
                Err(err) => {
                    warn!(class = %class, error = %err, "cannot enumerate shared fields");
                    self.report.omit(
                        Location::class(class),
                        OmissionReason::Unreadable {
                            message: err.to_string(),
                        },
                    );
                    continue;
                }
            };

            let mut copies = IndexMap::new();
            for field in fields {
                let Some(value) = field.value else {
                    continue;
                };
                let location = Location::shared_field(class, &field.name);
                match policy.is_field_excluded(self.runtime, class, &field.name) {
                    Ok(true) => {
                        self.report.omit(location, OmissionReason::ExcludedByPolicy);
                        continue;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(%location, error = %err, "exclusion check failed; field omitted");
                        self.report.omit(
                            location,
                            OmissionReason::PolicyError {
                                message: err.to_string(),
                            },
                        );
                        continue;
                    }
                }
                if let Some(copy) = self.value(location, &value) {
                    copies.insert(field.name, copy);
                }
            }
            if !copies.is_empty() {
                captured.insert(class.clone(), copies);
            }
        }
        captured
    }

    /// Copies one value, or records why it was left out.
    fn value(&mut self, location: Location, value: &Value) -> Option<CapturedValue> {
        if value.is_scalar() {
            self.report.captured += 1;
            return Some(CapturedValue::scalar(value.clone()));
        }

        let classifier = GraphSafetyClassifier::new(self.runtime);
        if !classifier.is_safe_to_duplicate(value) {
            let members = classifier.unsafe_members(value);
            debug!(%location, members = members.len(), "value unsafe to duplicate; omitted");
            self.report.omit(location, OmissionReason::Unsafe { members });
            return None;
        }

        match DeepCopyEngine::new(self.runtime).copy(value) {
            Ok(copy) => {
                self.report.captured += 1;
                Some(copy)
            }
            Err(err) => {
                warn!(%location, error = %err, "deep copy failed; value omitted");
                self.report.omit(
                    location,
                    OmissionReason::CopyFailed {
                        message: err.to_string(),
                    },
                );
                None
            }
        }
    }
}
