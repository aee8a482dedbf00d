//! Upgrades that stop before reaching `Verified`.
mod common;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::{Address, Bytes, B256};
use common::{Fixture, ADMIN};
use devnet::Devnet;
use proxy_upgrades::{
    erc1967, DeploymentRecord, DevnetEndpoint, Endpoint, EndpointError, Error,
    ErrorKind, ImplementationDeployer, MemoryRecordStore, Orchestrator,
    ProxyArtifacts, ProxyController, ProxyKind, RecordStore, UpgradeResult,
    UpgradeStage, UpgradeState,
};

const TIMEOUT: Duration = Duration::from_millis(50);
const STALL: Duration = Duration::from_secs(3600);

/// Devnet endpoint whose deployments or transactions can be made to hang.
#[derive(Clone)]
struct Stalling {
    inner: DevnetEndpoint,
    deploys: Arc<AtomicBool>,
    sends: Arc<AtomicBool>,
    /// Transactions land, but their confirmation never arrives.
    confirmations: Arc<AtomicBool>,
}

impl Stalling {
    fn new(devnet: &Arc<Devnet>) -> Self {
        Self {
            inner: DevnetEndpoint::new(Arc::clone(devnet)),
            deploys: Arc::default(),
            sends: Arc::default(),
            confirmations: Arc::default(),
        }
    }

    async fn maybe_stall(flag: &AtomicBool) {
        if flag.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
    }
}

impl Endpoint for Stalling {
    async fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> Result<Address, EndpointError> {
        Self::maybe_stall(&self.deploys).await;
        self.inner.deploy(from, bytecode, args).await
    }

    async fn call(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        self.inner.call(from, to, input).await
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        Self::maybe_stall(&self.sends).await;
        let output = self.inner.send(from, to, input).await;
        Self::maybe_stall(&self.confirmations).await;
        output
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, EndpointError> {
        self.inner.code_at(address).await
    }

    async fn storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, EndpointError> {
        self.inner.storage_at(address, slot).await
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Default)]
struct Unwritable {
    inner: MemoryRecordStore,
    refuse_puts: AtomicBool,
}

impl RecordStore for Unwritable {
    async fn put(
        &self,
        name: &str,
        record: &DeploymentRecord,
    ) -> proxy_upgrades::Result<()> {
        if self.refuse_puts.load(Ordering::SeqCst) {
            return Err(Error::Storage("disk full".to_owned()));
        }
        self.inner.put(name, record).await
    }

    async fn get(
        &self,
        name: &str,
    ) -> proxy_upgrades::Result<DeploymentRecord> {
        self.inner.get(name).await
    }

    async fn exists(&self, name: &str) -> proxy_upgrades::Result<bool> {
        self.inner.exists(name).await
    }

    async fn list(&self) -> proxy_upgrades::Result<Vec<DeploymentRecord>> {
        self.inner.list().await
    }
}

struct Stalled {
    devnet: Arc<Devnet>,
    endpoint: Stalling,
    orchestrator: Orchestrator<Stalling, MemoryRecordStore>,
}

impl Stalled {
    fn new() -> Self {
        common::init_tracing();
        let devnet = Arc::new(Devnet::new());
        devnet.set_timestamp(common::START_TIME);
        let endpoint = Stalling::new(&devnet);
        let deployer =
            ImplementationDeployer::new(endpoint.clone(), common::DEPLOYER)
                .with_timeout(TIMEOUT);
        let orchestrator = Orchestrator::new(
            ProxyController::new(deployer, ProxyArtifacts::devnet()),
            MemoryRecordStore::new(),
        );
        Self { devnet, endpoint, orchestrator }
    }

    async fn implementation(&self, proxy: Address) -> Option<Address> {
        erc1967::implementation(&self.endpoint, proxy)
            .await
            .expect("should read slot")
    }
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let fx = Fixture::new();
    let v2 = fx.auction(ProxyKind::AdminManaged, 2);

    let failure = fx
        .orchestrator
        .upgrade("NftAuction", "NftAuctionV2", &v2, ADMIN)
        .await
        .expect_err("nothing was deployed");
    assert_eq!(failure.kind(), ErrorKind::NotFound);
    assert_eq!(failure.state(), UpgradeState::Failed {
        stage: UpgradeStage::Resolve
    });
    assert_eq!(failure.proxy, None);
    assert_eq!(failure.leaked, None);
}

#[tokio::test]
async fn unusable_target_name_is_rejected_before_deploying() {
    let fx = Fixture::new();
    let v1 = fx.auction(ProxyKind::SelfManaged, 1);
    let v2 = fx.auction(ProxyKind::SelfManaged, 2);
    let deployed = fx
        .orchestrator
        .deploy_proxy(
            "NftAuctionUUPS",
            ProxyKind::SelfManaged,
            &v1,
            &common::init_data(),
            ADMIN,
        )
        .await
        .expect("should deploy");
    let nonce = fx.devnet.nonce(common::DEPLOYER);

    let failure = fx
        .orchestrator
        .upgrade("NftAuctionUUPS", "../NftAuctionUUPSV2", &v2, ADMIN)
        .await
        .expect_err("target name escapes the store");
    assert_eq!(failure.stage, UpgradeStage::Resolve);
    assert!(matches!(failure.error, Error::InvalidName(_)));
    assert_eq!(fx.devnet.nonce(common::DEPLOYER), nonce);
    let current = fx
        .orchestrator
        .controller()
        .implementation(deployed.proxy)
        .await
        .expect("should read slot");
    assert_eq!(current, Some(deployed.implementation));
}

#[tokio::test]
async fn name_is_recorded_once() {
    let fx = Fixture::new();
    let v1 = fx.auction(ProxyKind::AdminManaged, 1);
    let kind = ProxyKind::AdminManaged;
    fx.orchestrator
        .deploy_proxy("NftAuction", kind, &v1, &common::init_data(), ADMIN)
        .await
        .expect("should deploy");

    let err = fx
        .orchestrator
        .deploy_proxy("NftAuction", kind, &v1, &common::init_data(), ADMIN)
        .await
        .expect_err("name is taken");
    assert!(
        matches!(err, Error::AlreadyRecorded { name } if name == "NftAuction")
    );
}

#[tokio::test]
async fn stalled_deployment_leaves_proxy_untouched() {
    let fx = Stalled::new();
    let v1 = common::nft_auction(&fx.devnet, ProxyKind::SelfManaged, 1);
    let v2 = common::nft_auction(&fx.devnet, ProxyKind::SelfManaged, 2);
    let deployed = fx
        .orchestrator
        .deploy_proxy(
            "NftAuctionUUPS",
            ProxyKind::SelfManaged,
            &v1,
            &common::init_data(),
            ADMIN,
        )
        .await
        .expect("should deploy");

    fx.endpoint.deploys.store(true, Ordering::SeqCst);
    let failure = fx
        .orchestrator
        .upgrade("NftAuctionUUPS", "NftAuctionUUPSV2", &v2, ADMIN)
        .await
        .expect_err("deployment stalls");
    assert_eq!(failure.stage, UpgradeStage::Deploy);
    assert_eq!(failure.kind(), ErrorKind::DeploymentFailed);
    assert_eq!(failure.previous, Some(deployed.implementation));
    assert_eq!(failure.leaked, None);

    assert_eq!(
        fx.implementation(deployed.proxy).await,
        Some(deployed.implementation)
    );
    assert!(!fx
        .orchestrator
        .store()
        .exists("NftAuctionUUPSV2")
        .await
        .expect("should check"));
}

#[tokio::test]
async fn stalled_repoint_reports_leaked_implementation() {
    let fx = Stalled::new();
    let kind = ProxyKind::AdminManaged;
    let v1 = common::nft_auction(&fx.devnet, kind, 1);
    let v2 = common::nft_auction(&fx.devnet, kind, 2);
    let deployed = fx
        .orchestrator
        .deploy_proxy("NftAuction", kind, &v1, &common::init_data(), ADMIN)
        .await
        .expect("should deploy");

    fx.endpoint.sends.store(true, Ordering::SeqCst);
    let outcome = fx
        .orchestrator
        .upgrade("NftAuction", "NftAuctionV2", &v2, ADMIN)
        .await;
    let summary = UpgradeResult::from(&outcome);
    let failure = outcome.expect_err("repoint stalls");

    assert_eq!(failure.stage, UpgradeStage::Repoint);
    assert_eq!(failure.kind(), ErrorKind::RepointVerificationFailed);
    let leaked = failure.leaked.expect("new implementation was deployed");
    assert_ne!(leaked, deployed.implementation);
    assert!(!fx.devnet.code_at(leaked).is_empty());
    assert_eq!(
        fx.implementation(deployed.proxy).await,
        Some(deployed.implementation)
    );

    assert!(!summary.succeeded);
    assert_eq!(summary.proxy, Some(deployed.proxy));
    assert_eq!(summary.previous_implementation, Some(deployed.implementation));
    assert_eq!(failure.new_implementation, Some(leaked));
    assert_eq!(summary.new_implementation, Some(leaked));
    let reason = summary.reason.as_deref().unwrap_or_default();
    assert!(reason.contains("50ms"), "{reason}");
    let json = serde_json::to_value(&summary).expect("should serialize");
    assert_eq!(json["succeeded"], false);
    assert!(json.get("previousImplementation").is_some());
}

#[tokio::test]
async fn repoint_that_lands_before_stalling_is_not_leaked() {
    let fx = Stalled::new();
    let kind = ProxyKind::AdminManaged;
    let v1 = common::nft_auction(&fx.devnet, kind, 1);
    let v2 = common::nft_auction(&fx.devnet, kind, 2);
    let deployed = fx
        .orchestrator
        .deploy_proxy("NftAuction", kind, &v1, &common::init_data(), ADMIN)
        .await
        .expect("should deploy");

    fx.endpoint.confirmations.store(true, Ordering::SeqCst);
    let outcome = fx
        .orchestrator
        .upgrade("NftAuction", "NftAuctionV2", &v2, ADMIN)
        .await;
    let summary = UpgradeResult::from(&outcome);
    let failure = outcome.expect_err("confirmation stalls");

    assert_eq!(failure.stage, UpgradeStage::Repoint);
    assert_eq!(failure.kind(), ErrorKind::RepointVerificationFailed);
    let live = fx.implementation(deployed.proxy).await;
    assert_ne!(live, Some(deployed.implementation));
    assert_eq!(failure.new_implementation, live);
    assert_eq!(failure.leaked, None);
    assert_eq!(summary.new_implementation, live);
    assert!(!fx
        .orchestrator
        .store()
        .exists("NftAuctionV2")
        .await
        .expect("should check"));
}

#[tokio::test]
async fn unrecorded_upgrade_still_reports_live_implementation() {
    let fx = Fixture::with_store(Unwritable::default());
    let kind = ProxyKind::SelfManaged;
    let v1 = fx.auction(kind, 1);
    let v2 = fx.auction(kind, 2);
    let deployed = fx
        .orchestrator
        .deploy_proxy("NftAuctionUUPS", kind, &v1, &common::init_data(), ADMIN)
        .await
        .expect("should deploy");

    fx.orchestrator.store().refuse_puts.store(true, Ordering::SeqCst);
    let outcome = fx
        .orchestrator
        .upgrade("NftAuctionUUPS", "NftAuctionUUPSV2", &v2, ADMIN)
        .await;
    let summary = UpgradeResult::from(&outcome);
    let failure = outcome.expect_err("record cannot be written");

    assert_eq!(failure.stage, UpgradeStage::Verify);
    assert!(matches!(failure.error, Error::Storage(_)));
    let live = erc1967::implementation(&fx.endpoint, deployed.proxy)
        .await
        .expect("should read slot");
    assert_ne!(live, Some(deployed.implementation));
    assert_eq!(failure.new_implementation, live);
    assert_eq!(failure.leaked, None);
    assert_eq!(summary.new_implementation, live);
    assert_eq!(summary.previous_implementation, Some(deployed.implementation));
}
