use std::collections::HashSet;

use globalstate_core_types::{Runtime, StateError};
use indexmap::IndexSet;
use tracing::{debug, info, warn};

use crate::api::{FieldMap, Snapshot};
use crate::errors::{SnapErrKind, SnapResult};
use crate::model::{Location, RestoreReport};

/// Writes a snapshot back into live state.
///
/// Restoring the same snapshot twice leaves the same observable state as
/// restoring it once. Targets that vanished since capture are reported, not
/// fatal.
#[derive(Clone, Copy, Debug, Default)]
pub struct Restorer;

impl Restorer {
    pub fn new() -> Self {
        Self
    }

    /// Reconciles free globals and well-known containers with the snapshot.
    ///
    /// Every live free global that is neither reserved nor excluded is
    /// overwritten with its captured copy, or deleted when the snapshot has
    /// none. Containers are reconciled over the union of live and captured
    /// keys.
    pub fn restore_named_locations<R>(
        &self,
        runtime: &mut R,
        snapshot: &Snapshot,
    ) -> SnapResult<RestoreReport>
    where
        R: Runtime + ?Sized,
    {
        let options = snapshot.options();
        if !options.global_variables && !options.container_variables {
            return Err(SnapErrKind::NotCaptured("global or container variables").into());
        }

        let mut report = RestoreReport::default();
        if options.container_variables {
            for (container, captured) in snapshot.container_variables() {
                restore_container(runtime, container, captured, &mut report)?;
            }
        }

        if options.global_variables {
            let policy = snapshot.policy();
            let captured = snapshot.global_variables();
            for name in runtime.global_names() {
                if options.is_reserved_name(&name) || policy.is_global_excluded(&name) {
                    continue;
                }
                match captured.get(&name) {
                    Some(copy) => {
                        let value = copy.attach(runtime.heap_mut())?;
                        runtime.set_global(&name, value);
                        report.written += 1;
                    }
                    None => {
                        runtime.remove_global(&name);
                        report.deleted += 1;
                    }
                }
            }
        }

        info!(
            snapshot = %snapshot.id(),
            written = report.written,
            deleted = report.deleted,
            missing = report.missing.len(),
            "named locations restored"
        );
        Ok(report)
    }

    /// Writes captured shared fields back, then resets initialized fields of
    /// classes declared after capture to their declared defaults.
    ///
    /// A field with no statically known default is left as it is, and so are
    /// fields the policy excludes.
    pub fn restore_class_fields<R>(
        &self,
        runtime: &mut R,
        snapshot: &Snapshot,
    ) -> SnapResult<RestoreReport>
    where
        R: Runtime + ?Sized,
    {
        let mut report = RestoreReport::default();
        for (class, fields) in snapshot.shared_fields() {
            for (field, copy) in fields {
                let value = copy.attach(runtime.heap_mut())?;
                match runtime.set_shared_field(class, field, value) {
                    Ok(()) => report.written += 1,
                    Err(err) => {
                        warn!(
                            class = %class,
                            field = %field,
                            error = %err,
                            "shared field target missing"
                        );
                        report.missing(Location::shared_field(class, field), err.to_string());
                    }
                }
            }
        }

        match snapshot.captured_classes() {
            Some(known) => reset_new_classes(runtime, snapshot, known, &mut report)?,
            None => {
                debug!(snapshot = %snapshot.id(), "class listing not captured; new classes untouched")
            }
        }

        info!(
            snapshot = %snapshot.id(),
            written = report.written,
            reset = report.reset,
            missing = report.missing.len(),
            "shared fields restored"
        );
        Ok(report)
    }

    /// Deletes user functions declared after capture.
    pub fn restore_functions<R>(
        &self,
        runtime: &mut R,
        snapshot: &Snapshot,
    ) -> SnapResult<RestoreReport>
    where
        R: Runtime + ?Sized,
    {
        if !snapshot.options().functions {
            return Err(SnapErrKind::NotCaptured("functions").into());
        }

        let known: HashSet<&str> = snapshot.functions().iter().map(String::as_str).collect();
        let mut report = RestoreReport::default();
        for name in runtime.function_names() {
            if known.contains(name.as_str()) {
                continue;
            }
            match runtime.remove_function(&name) {
                Ok(()) => report.deleted += 1,
                Err(err @ StateError::Unsupported(_)) => return Err(err.into()),
                Err(err) => report.missing(Location::function(&name), err.to_string()),
            }
        }
        Ok(report)
    }

    /// Named locations followed by shared fields, then a heap collection so
    /// the values the restore replaced do not pile up. Functions are left
    /// alone since few runtimes can delete them.
    ///
    /// Node ids taken from the runtime before this call may be stale after it.
    pub fn restore_all<R>(
        &self,
        runtime: &mut R,
        snapshot: &Snapshot,
    ) -> SnapResult<RestoreReport>
    where
        R: Runtime + ?Sized,
    {
        let options = snapshot.options();
        let mut report = RestoreReport::default();
        if options.global_variables || options.container_variables {
            report.merge(self.restore_named_locations(runtime, snapshot)?);
        }
        report.merge(self.restore_class_fields(runtime, snapshot)?);
        report.collected = runtime.collect_garbage();
        debug!(
            snapshot = %snapshot.id(),
            collected = report.collected,
            "heap collected after restore"
        );
        Ok(report)
    }
}

fn restore_container<R>(
    runtime: &mut R,
    container: &str,
    captured: &FieldMap,
    report: &mut RestoreReport,
) -> SnapResult<()>
where
    R: Runtime + ?Sized,
{
    let Some(live) = runtime.container_entries(container) else {
        if !captured.is_empty() {
            warn!(container, "container missing at restore; skipped");
            report.missing(Location::container(container), "container not present");
        }
        return Ok(());
    };

    let keys: IndexSet<String> = live
        .into_iter()
        .map(|(key, _)| key)
        .chain(captured.keys().cloned())
        .collect();

    for key in keys {
        let outcome = match captured.get(&key) {
            Some(copy) => {
                let value = copy.attach(runtime.heap_mut())?;
                runtime
                    .set_container_entry(container, &key, value)
                    .map(|()| report.written += 1)
            }
            None => runtime
                .remove_container_entry(container, &key)
                .map(|removed| {
                    if removed {
                        report.deleted += 1;
                    }
                }),
        };
        if let Err(err) = outcome {
            report.missing(Location::container_entry(container, &key), err.to_string());
        }
    }
    Ok(())
}

fn reset_new_classes<R>(
    runtime: &mut R,
    snapshot: &Snapshot,
    known: &[String],
    report: &mut RestoreReport,
) -> SnapResult<()>
where
    R: Runtime + ?Sized,
{
    let known: HashSet<&str> = known.iter().map(String::as_str).collect();
    let policy = snapshot.policy();
    for class in runtime.declared_classes() {
        if known.contains(class.as_str()) {
            continue;
        }
        let fields = match runtime.shared_fields(&class) {
            Ok(fields) => fields,
            Err(err) => {
                report.missing(Location::class(&class), err.to_string());
                continue;
            }
        };
        for field in fields {
            if field.value.is_none() {
                continue;
            }
            let Some(default) = field.default else {
                continue;
            };
            match policy.is_field_excluded(&*runtime, &class, &field.name) {
                Ok(false) => {}
                Ok(true) => continue,
                Err(err) => {
                    warn!(
                        class = %class,
                        field = %field.name,
                        error = %err,
                        "exclusion check failed; field left as is"
                    );
                    continue;
                }
            }
            let value = runtime.heap_mut().attach(&default)?;
            match runtime.set_shared_field(&class, &field.name, value) {
                Ok(()) => report.reset += 1,
                Err(err) => {
                    report.missing(Location::shared_field(&class, &field.name), err.to_string())
                }
            }
        }
    }
    Ok(())
}
