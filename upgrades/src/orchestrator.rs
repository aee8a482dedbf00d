//! Staged, logically atomic upgrades.
//!
//! A run moves through `Resolved -> Deployed -> Repointed -> Verified`. The
//! repoint is the commit point: before it nothing observable changed except
//! for a freshly deployed, unreferenced implementation; after it the proxy
//! serves the new logic. A failing stage ends the run with an
//! [`UpgradeFailure`]; there is no rollback and no retry.
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use alloy_primitives::Address;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::{
    controller::ProxyController,
    endpoint::Endpoint,
    module::ModuleDefinition,
    record::{DeploymentRecord, ProxyKind},
    store::{validate_name, RecordStore},
    Error, ErrorKind, Result,
};

/// A step of an upgrade run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStage {
    /// Looking up the source record and the proxy's current implementation.
    Resolve,
    /// Deploying the new implementation.
    Deploy,
    /// Pointing the proxy at the new implementation.
    Repoint,
    /// Re-reading the proxy and recording the new lineage entry.
    Verify,
}

impl fmt::Display for UpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Deploy => "deploy",
            Self::Repoint => "repoint",
            Self::Verify => "verify",
        })
    }
}

/// Where a run stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum UpgradeState {
    /// The source record was found.
    Resolved,
    /// The new implementation exists on chain.
    Deployed,
    /// The proxy points at the new implementation.
    Repointed,
    /// The new pointer was read back and recorded.
    Verified,
    /// The run stopped at `stage`.
    Failed {
        /// The stage that failed.
        stage: UpgradeStage,
    },
}

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeReport {
    /// The record written under the target name.
    pub record: DeploymentRecord,
    /// The implementation the proxy pointed at before the run.
    pub previous_implementation: Address,
}

impl UpgradeReport {
    /// State a successful run ends in.
    #[must_use]
    pub fn state(&self) -> UpgradeState {
        UpgradeState::Verified
    }
}

/// Outcome of a failed run.
#[derive(Debug, thiserror::Error)]
#[error("upgrade failed at {stage} stage: {error}")]
pub struct UpgradeFailure {
    /// The stage that failed.
    pub stage: UpgradeStage,
    /// Why it failed.
    #[source]
    pub error: Error,
    /// The proxy, if it was resolved.
    pub proxy: Option<Address>,
    /// The implementation the proxy pointed at before the run, if known.
    pub previous: Option<Address>,
    /// The implementation the run deployed, once the deploy stage is done.
    pub new_implementation: Option<Address>,
    /// A deployed implementation the proxy is known not to point at.
    ///
    /// `None` when the slot could not be read back after a failed repoint:
    /// the implementation may be live.
    pub leaked: Option<Address>,
}

impl UpgradeFailure {
    /// State a failed run ends in.
    #[must_use]
    pub fn state(&self) -> UpgradeState {
        UpgradeState::Failed { stage: self.stage }
    }

    /// Category of the underlying error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Flat summary of a run, for structured output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeResult {
    /// The upgraded proxy, if it was resolved.
    pub proxy: Option<Address>,
    /// Implementation before the run, if known.
    pub previous_implementation: Option<Address>,
    /// Implementation the run deployed, if it got that far.
    pub new_implementation: Option<Address>,
    /// Whether the run reached `Verified`.
    pub succeeded: bool,
    /// Why the run failed.
    pub reason: Option<String>,
    /// State the run ended in.
    pub stage: UpgradeState,
}

impl From<&UpgradeReport> for UpgradeResult {
    fn from(report: &UpgradeReport) -> Self {
        Self {
            proxy: Some(report.record.proxy),
            previous_implementation: Some(report.previous_implementation),
            new_implementation: Some(report.record.implementation),
            succeeded: true,
            reason: None,
            stage: report.state(),
        }
    }
}

impl From<&UpgradeFailure> for UpgradeResult {
    fn from(failure: &UpgradeFailure) -> Self {
        Self {
            proxy: failure.proxy,
            previous_implementation: failure.previous,
            new_implementation: failure.new_implementation,
            succeeded: false,
            reason: Some(failure.error.to_string()),
            stage: failure.state(),
        }
    }
}

impl From<&Result<UpgradeReport, UpgradeFailure>> for UpgradeResult {
    fn from(outcome: &Result<UpgradeReport, UpgradeFailure>) -> Self {
        match outcome {
            Ok(report) => report.into(),
            Err(failure) => failure.into(),
        }
    }
}

/// What a run knows so far, to attach to a failure.
#[derive(Clone, Copy, Default)]
struct Progress {
    proxy: Option<Address>,
    previous: Option<Address>,
    new_implementation: Option<Address>,
    leaked: Option<Address>,
}

impl Progress {
    fn fail(&self, stage: UpgradeStage, error: Error) -> UpgradeFailure {
        warn!(
            proxy = ?self.proxy,
            %stage,
            new_implementation = ?self.new_implementation,
            leaked = ?self.leaked,
            %error,
            "upgrade failed"
        );
        UpgradeFailure {
            stage,
            error,
            proxy: self.proxy,
            previous: self.previous,
            new_implementation: self.new_implementation,
            leaked: self.leaked,
        }
    }
}

type ProxyLock = Arc<tokio::sync::Mutex<()>>;

/// Runs deployments and upgrades, keeping the record store in step with the
/// chain.
///
/// At most one upgrade runs per proxy at a time within this orchestrator;
/// upgrades of distinct proxies do not wait for each other.
pub struct Orchestrator<E, S> {
    controller: ProxyController<E>,
    store: S,
    locks: Mutex<HashMap<Address, ProxyLock>>,
}

impl<E, S> fmt::Debug for Orchestrator<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl<E: Endpoint, S: RecordStore> Orchestrator<E, S> {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(controller: ProxyController<E>, store: S) -> Self {
        Self { controller, store, locks: Mutex::new(HashMap::new()) }
    }

    /// The controller proxies are driven with.
    #[must_use]
    pub fn controller(&self) -> &ProxyController<E> {
        &self.controller
    }

    /// The store records are kept in.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Deploys `definition` behind a new proxy and records it under `name`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidName`] - If `name` is not a valid logical name.
    /// * [`Error::AlreadyRecorded`] - If `name` is taken.
    /// * [`Error::DeploymentFailed`] - If the deployment fails.
    /// * [`Error::Storage`] - If the record cannot be written.
    pub async fn deploy_proxy(
        &self,
        name: &str,
        kind: ProxyKind,
        definition: &ModuleDefinition,
        init_data: &[u8],
        caller: Address,
    ) -> Result<DeploymentRecord> {
        validate_name(name)?;
        if self.store.exists(name).await? {
            return Err(Error::AlreadyRecorded { name: name.to_owned() });
        }

        let deployment = self
            .controller
            .initialize(kind, definition, init_data, caller)
            .instrument(info_span!("deploy_proxy", name, %kind))
            .await?;
        let record = DeploymentRecord {
            logical_name: name.to_owned(),
            proxy: deployment.proxy,
            implementation: deployment.implementation,
            interface: definition.interface.clone(),
            kind,
            admin: deployment.admin,
            version: definition.version(),
        };
        self.store.put(name, &record).await?;
        Ok(record)
    }

    /// Upgrades the proxy recorded under `source_name` to a fresh
    /// deployment of `definition` and records the result under
    /// `target_name`.
    ///
    /// # Errors
    ///
    /// An [`UpgradeFailure`] naming the failed stage:
    ///
    /// * [`UpgradeStage::Resolve`] - [`Error::NotFound`] for an unknown
    ///   source, [`Error::InvalidName`] for an unusable target.
    /// * [`UpgradeStage::Deploy`] - [`Error::DeploymentFailed`].
    /// * [`UpgradeStage::Repoint`] - [`Error::Unauthorized`] or a repoint
    ///   error. The new implementation is reported as leaked only when the
    ///   proxy is known not to point at it.
    /// * [`UpgradeStage::Verify`] - A verification or storage error.
    pub async fn upgrade(
        &self,
        source_name: &str,
        target_name: &str,
        definition: &ModuleDefinition,
        caller: Address,
    ) -> Result<UpgradeReport, UpgradeFailure> {
        let span = info_span!(
            "upgrade",
            source = source_name,
            target = target_name,
            module = %definition.name,
        );
        self.run_upgrade(source_name, target_name, definition, caller)
            .instrument(span)
            .await
    }

    async fn run_upgrade(
        &self,
        source_name: &str,
        target_name: &str,
        definition: &ModuleDefinition,
        caller: Address,
    ) -> Result<UpgradeReport, UpgradeFailure> {
        let mut progress = Progress::default();

        // Resolved
        validate_name(target_name)
            .map_err(|e| progress.fail(UpgradeStage::Resolve, e))?;
        let source = self
            .store
            .get(source_name)
            .await
            .map_err(|e| progress.fail(UpgradeStage::Resolve, e))?;
        let proxy = source.proxy;
        progress.proxy = Some(proxy);

        let slot = self.lock_for(proxy);
        let _guard = slot.lock.lock().await;

        let previous = self
            .controller
            .implementation(proxy)
            .await
            .map_err(|e| progress.fail(UpgradeStage::Resolve, e))?
            .unwrap_or(source.implementation);
        progress.previous = Some(previous);
        info!(
            %proxy,
            %previous,
            state = ?UpgradeState::Resolved,
            "upgrade progressed",
        );

        // Deployed
        let implementation = self
            .controller
            .deployer()
            .deploy(definition, &[])
            .await
            .map_err(|e| progress.fail(UpgradeStage::Deploy, e))?;
        if implementation == previous {
            return Err(progress.fail(
                UpgradeStage::Deploy,
                Error::DeploymentFailed(format!(
                    "new implementation {implementation} is the current one"
                )),
            ));
        }
        progress.new_implementation = Some(implementation);
        info!(
            %proxy,
            %implementation,
            state = ?UpgradeState::Deployed,
            "upgrade progressed",
        );

        // Repointed
        if let Err(error) = self
            .controller
            .repoint(source.kind, proxy, source.admin, implementation, caller)
            .await
        {
            progress.leaked =
                self.unlinked(&error, proxy, implementation).await;
            return Err(progress.fail(UpgradeStage::Repoint, error));
        }
        info!(
            %proxy,
            %implementation,
            state = ?UpgradeState::Repointed,
            "upgrade progressed",
        );

        // Verified
        self.controller
            .verify_implementation(proxy, implementation)
            .await
            .map_err(|e| progress.fail(UpgradeStage::Verify, e))?;
        let record = DeploymentRecord {
            logical_name: target_name.to_owned(),
            proxy,
            implementation,
            interface: definition.interface.clone(),
            kind: source.kind,
            admin: source.admin,
            version: definition.version(),
        };
        self.store
            .put(target_name, &record)
            .await
            .map_err(|e| progress.fail(UpgradeStage::Verify, e))?;
        info!(
            %proxy,
            %implementation,
            state = ?UpgradeState::Verified,
            "upgrade progressed",
        );

        Ok(UpgradeReport { record, previous_implementation: previous })
    }

    /// `implementation` if a failed repoint provably left the proxy
    /// elsewhere.
    ///
    /// A transaction that timed out may still have landed, so anything but
    /// a refused upgrade is settled by reading the slot.
    async fn unlinked(
        &self,
        error: &Error,
        proxy: Address,
        implementation: Address,
    ) -> Option<Address> {
        if matches!(error, Error::Unauthorized { .. }) {
            return Some(implementation);
        }
        match self.controller.implementation(proxy).await {
            Ok(current) if current == Some(implementation) => {
                warn!(%proxy, %implementation, "repoint landed despite error");
                None
            }
            Ok(_) => Some(implementation),
            Err(e) => {
                warn!(
                    %proxy,
                    %implementation,
                    error = %e,
                    "cannot tell whether repoint landed"
                );
                None
            }
        }
    }

    fn lock_for(&self, proxy: Address) -> LockSlot<'_> {
        let mut locks =
            self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(locks.entry(proxy).or_default());
        LockSlot { locks: &self.locks, proxy, lock }
    }
}

/// A proxy's lock, borrowed from the orchestrator's map for one run.
///
/// The map entry is removed when the last run holding it finishes.
struct LockSlot<'a> {
    locks: &'a Mutex<HashMap<Address, ProxyLock>>,
    proxy: Address,
    lock: ProxyLock,
}

impl Drop for LockSlot<'_> {
    fn drop(&mut self) {
        let mut locks =
            self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.proxy);
        }
    }
}
