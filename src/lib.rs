//! Snapshot and restore of process-wide global state.
//!
//! [`GlobalState`] bundles an exclusion policy with the categories to capture,
//! so a runner can take a snapshot before a unit of work and put everything
//! back afterwards.

use std::sync::Arc;

use globalstate_core_types::Runtime;
use globalstate_policy_center::{load_policy_with_options, LoadOptions};
use tracing::info;

pub mod config;
pub mod errors;
pub mod telemetry;

pub use config::{ExclusionSettings, Settings};
pub use errors::{GlobalStateError, GlobalStateResult};
pub use globalstate_core_types as core_types;
pub use globalstate_policy_center::{ExclusionPolicy, ExclusionRules};
pub use globalstate_snapshot_store::{
    CaptureReport, CodeExporter, Location, OmissionReason, RestoreReport, Restorer, Snapshot,
    SnapshotOptions,
};

#[derive(Clone, Debug)]
pub struct GlobalState {
    policy: Arc<ExclusionPolicy>,
    options: SnapshotOptions,
    restorer: Restorer,
}

impl GlobalState {
    pub fn new(policy: ExclusionPolicy, options: SnapshotOptions) -> Self {
        Self {
            policy: Arc::new(policy),
            options,
            restorer: Restorer::new(),
        }
    }

    /// Builds the policy from the configured rules file, environment rules
    /// and inline rules, in that order.
    pub fn from_settings(settings: &Settings) -> GlobalStateResult<Self> {
        let exclusions = &settings.exclusions;
        let load = LoadOptions {
            paths: exclusions.rules_file.iter().cloned().collect(),
            include_env: exclusions.include_env,
        };
        let mut policy = load_policy_with_options(&load)?;
        policy.extend(&exclusions.rules);
        info!(
            log_level = %settings.log_level,
            legacy_containers = settings.capture.legacy_containers,
            "global state configured"
        );
        Ok(Self::new(policy, settings.capture))
    }

    pub fn policy(&self) -> &Arc<ExclusionPolicy> {
        &self.policy
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    pub fn capture<R>(&self, runtime: &R) -> Snapshot
    where
        R: Runtime + ?Sized,
    {
        Snapshot::capture(self.policy.clone(), runtime, self.options)
    }

    /// Restores named locations and shared fields.
    pub fn restore<R>(
        &self,
        runtime: &mut R,
        snapshot: &Snapshot,
    ) -> GlobalStateResult<RestoreReport>
    where
        R: Runtime + ?Sized,
    {
        Ok(self.restorer.restore_all(runtime, snapshot)?)
    }

    /// Runs `body` between a capture and a restore, so whatever it does to
    /// global state is undone before this returns. The restore compacts the
    /// heap, so node ids `body` hands back are stale.
    pub fn isolate<R, T, F>(
        &self,
        runtime: &mut R,
        body: F,
    ) -> GlobalStateResult<(T, RestoreReport)>
    where
        R: Runtime + ?Sized,
        F: FnOnce(&mut R) -> T,
    {
        let snapshot = self.capture(&*runtime);
        let output = body(runtime);
        let report = self.restore(runtime, &snapshot)?;
        Ok((output, report))
    }

    pub fn export(&self, snapshot: &Snapshot) -> GlobalStateResult<String> {
        Ok(CodeExporter::new().export(snapshot)?)
    }
}
