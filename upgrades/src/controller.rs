//! The two proxy administration models behind one interface.
//!
//! - [`ProxyKind::AdminManaged`]: a transparent proxy whose upgrade
//!   authority is a separate `ProxyAdmin` contract, owned by the account
//!   that deployed the proxy.
//! - [`ProxyKind::SelfManaged`]: a bare ERC-1967 proxy; the implementation
//!   exposes `upgradeToAndCall` and checks authorization itself, so the
//!   upgrade is always sent *through the proxy*.
use std::time::Duration;

use alloy_primitives::{hex, Address, Bytes};
use alloy_sol_types::{SolCall, SolError, SolValue};
use tracing::{debug, info, warn};

use crate::{
    abi::{
        AccessControlUnauthorizedAccount, InvalidInitialization,
        OwnableUnauthorizedAccount, ProxyAdmin, UUPSUnauthorizedCallContext,
        UupsUpgradeable,
    },
    deployer::ImplementationDeployer,
    endpoint::{bounded, Endpoint, EndpointError},
    erc1967,
    module::{ModuleDefinition, ProxyArtifacts},
    record::ProxyKind,
    Error, Result,
};

/// Addresses produced by [`ProxyController::initialize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// The proxy users interact with.
    pub proxy: Address,
    /// The implementation the proxy points at.
    pub implementation: Address,
    /// The `ProxyAdmin` of an admin-managed proxy.
    pub admin: Option<Address>,
}

/// Deploys, initializes and repoints proxies.
#[derive(Clone, Debug)]
pub struct ProxyController<E> {
    deployer: ImplementationDeployer<E>,
    artifacts: ProxyArtifacts,
}

impl<E: Endpoint> ProxyController<E> {
    /// Creates a controller deploying implementations with `deployer` and
    /// proxies from `artifacts`.
    #[must_use]
    pub fn new(
        deployer: ImplementationDeployer<E>,
        artifacts: ProxyArtifacts,
    ) -> Self {
        Self { deployer, artifacts }
    }

    /// The deployer implementations are published with.
    #[must_use]
    pub fn deployer(&self) -> &ImplementationDeployer<E> {
        &self.deployer
    }

    fn endpoint(&self) -> &E {
        self.deployer.endpoint()
    }

    fn timeout(&self) -> Duration {
        self.deployer.timeout()
    }

    /// Deploys `definition` behind a new proxy of `kind` and runs
    /// `init_data` in the proxy's context.
    ///
    /// The proxy (and its `ProxyAdmin`, if any) is created by `caller`, who
    /// therefore ends up holding upgrade authority. The initializer never
    /// runs against the raw implementation.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - If any of the contracts cannot be
    ///   created, including when the initializer reverts.
    pub async fn initialize(
        &self,
        kind: ProxyKind,
        definition: &ModuleDefinition,
        init_data: &[u8],
        caller: Address,
    ) -> Result<Deployment> {
        let implementation = self.deployer.deploy(definition, &[]).await?;
        let init_data = Bytes::copy_from_slice(init_data);

        let deployment = match kind {
            ProxyKind::SelfManaged => {
                let args = (implementation, init_data).abi_encode_params();
                let proxy = self
                    .deployer
                    .deploy_code_as(
                        caller,
                        "ERC1967Proxy",
                        &self.artifacts.erc1967_proxy,
                        &args,
                    )
                    .await?;
                Deployment { proxy, implementation, admin: None }
            }
            ProxyKind::AdminManaged => {
                let admin = self
                    .deployer
                    .deploy_code_as(
                        caller,
                        "ProxyAdmin",
                        &self.artifacts.proxy_admin,
                        &caller.abi_encode(),
                    )
                    .await?;
                let args =
                    (implementation, admin, init_data).abi_encode_params();
                let proxy = self
                    .deployer
                    .deploy_code_as(
                        caller,
                        "TransparentUpgradeableProxy",
                        &self.artifacts.transparent_proxy,
                        &args,
                    )
                    .await?;
                Deployment { proxy, implementation, admin: Some(admin) }
            }
        };

        info!(
            module = %definition.name,
            %kind,
            proxy = %deployment.proxy,
            implementation = %deployment.implementation,
            "deployed proxy"
        );
        Ok(deployment)
    }

    /// Invokes a one-time initializer through `proxy` again.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyInitialized`] - If the initializer already ran;
    ///   stored state is left unchanged.
    /// * [`Error::Unauthorized`] - If `caller` may not call it.
    /// * [`Error::Endpoint`] - For any other failure.
    pub async fn call_initializer(
        &self,
        proxy: Address,
        init_data: &[u8],
        caller: Address,
    ) -> Result<()> {
        bounded(self.timeout(), self.endpoint().send(caller, proxy, init_data))
            .await
            .map_err(|e| {
                e.revert_data()
                    .and_then(|data| decode_revert(data, caller, proxy))
                    .unwrap_or(Error::Endpoint(e))
            })?;
        Ok(())
    }

    /// Upgrades an admin-managed `proxy` to a fresh deployment of
    /// `definition`, returning the new implementation.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - If the implementation cannot be
    ///   deployed.
    /// * [`Error::Unauthorized`] - If `caller` does not own the proxy's
    ///   `ProxyAdmin`; the implementation is left unchanged.
    /// * [`Error::RepointVerificationFailed`] - If the proxy does not point
    ///   at the new implementation afterwards.
    pub async fn upgrade(
        &self,
        proxy: Address,
        definition: &ModuleDefinition,
        caller: Address,
    ) -> Result<Address> {
        let admin = self.resolve_admin(proxy).await?;
        let implementation = self.deployer.deploy(definition, &[]).await?;
        self.repoint(
            ProxyKind::AdminManaged,
            proxy,
            Some(admin),
            implementation,
            caller,
        )
        .await?;
        Ok(implementation)
    }

    /// Upgrades a self-managed `proxy` to a fresh deployment of
    /// `definition`, returning the new implementation.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - If the implementation cannot be
    ///   deployed.
    /// * [`Error::Unauthorized`] - If the current implementation refuses
    ///   `caller`; the implementation is left unchanged.
    /// * [`Error::RepointVerificationFailed`] - If the proxy does not point
    ///   at the new implementation afterwards.
    pub async fn upgrade_self(
        &self,
        proxy: Address,
        definition: &ModuleDefinition,
        caller: Address,
    ) -> Result<Address> {
        let implementation = self.deployer.deploy(definition, &[]).await?;
        let kind = ProxyKind::SelfManaged;
        self.repoint(kind, proxy, None, implementation, caller).await?;
        Ok(implementation)
    }

    /// Points `proxy` at the already deployed `new_implementation`, then
    /// checks the ERC-1967 implementation slot.
    ///
    /// `admin` is only used for admin-managed proxies and read from the
    /// admin slot when `None`.
    ///
    /// # Errors
    ///
    /// * [`Error::Unauthorized`] - If `caller` lacks upgrade authority.
    /// * [`Error::RepointRejected`] - If the repoint failed otherwise.
    /// * [`Error::RepointVerificationFailed`] - If the slot does not hold
    ///   `new_implementation` afterwards.
    /// * [`Error::VerificationUnavailable`] - If the slot cannot be read.
    pub async fn repoint(
        &self,
        kind: ProxyKind,
        proxy: Address,
        admin: Option<Address>,
        new_implementation: Address,
        caller: Address,
    ) -> Result<()> {
        let (to, input) = match kind {
            ProxyKind::AdminManaged => {
                let admin = match admin {
                    Some(admin) => admin,
                    None => self.resolve_admin(proxy).await?,
                };
                let call = ProxyAdmin::upgradeAndCallCall {
                    proxy,
                    implementation: new_implementation,
                    data: Bytes::new(),
                };
                (admin, call.abi_encode())
            }
            ProxyKind::SelfManaged => {
                let call = UupsUpgradeable::upgradeToAndCallCall {
                    newImplementation: new_implementation,
                    data: Bytes::new(),
                };
                (proxy, call.abi_encode())
            }
        };

        debug!(%proxy, %to, %caller, %kind, "sending repoint");
        bounded(self.timeout(), self.endpoint().send(caller, to, &input))
            .await
            .map_err(|e| {
                warn!(%proxy, %caller, error = %e, "repoint failed");
                repoint_error(&e, caller, proxy)
            })?;

        self.verify_implementation(proxy, new_implementation).await?;
        info!(
            %proxy,
            implementation = %new_implementation,
            %kind,
            "repointed proxy"
        );
        Ok(())
    }

    /// The implementation `proxy` currently points at.
    ///
    /// # Errors
    ///
    /// * [`Error::VerificationUnavailable`] - If the slot cannot be read.
    pub async fn implementation(
        &self,
        proxy: Address,
    ) -> Result<Option<Address>> {
        let read = erc1967::implementation(self.endpoint(), proxy);
        bounded(self.timeout(), read)
            .await
            .map_err(|e| Error::VerificationUnavailable {
                proxy,
                reason: e.to_string(),
            })
    }

    /// Checks that `proxy` points at `expected`.
    ///
    /// # Errors
    ///
    /// * [`Error::RepointVerificationFailed`] - If it points elsewhere.
    /// * [`Error::VerificationUnavailable`] - If the slot cannot be read.
    pub async fn verify_implementation(
        &self,
        proxy: Address,
        expected: Address,
    ) -> Result<()> {
        let actual = self.implementation(proxy).await?;
        if actual != Some(expected) {
            return Err(Error::RepointVerificationFailed {
                proxy,
                expected,
                actual,
            });
        }
        Ok(())
    }

    async fn resolve_admin(&self, proxy: Address) -> Result<Address> {
        bounded(self.timeout(), erc1967::admin(self.endpoint(), proxy))
            .await
            .map_err(|e| Error::RepointRejected {
                proxy,
                reason: format!("failed to read admin slot: {e}"),
            })?
            .ok_or_else(|| Error::RepointRejected {
                proxy,
                reason: "proxy has no admin".to_owned(),
            })
    }
}

/// Maps well-known revert reasons onto the error taxonomy.
fn decode_revert(
    data: &[u8],
    caller: Address,
    proxy: Address,
) -> Option<Error> {
    let selector = data.get(..4)?;
    let unauthorized = [
        OwnableUnauthorizedAccount::SELECTOR,
        AccessControlUnauthorizedAccount::SELECTOR,
        UUPSUnauthorizedCallContext::SELECTOR,
    ];
    if unauthorized.iter().any(|known| known.as_slice() == selector) {
        Some(Error::Unauthorized { caller })
    } else if selector == InvalidInitialization::SELECTOR.as_slice() {
        Some(Error::AlreadyInitialized { proxy })
    } else {
        None
    }
}

fn repoint_error(
    err: &EndpointError,
    caller: Address,
    proxy: Address,
) -> Error {
    let reason = match err.revert_data() {
        Some(data) => {
            if let Some(known) = decode_revert(data, caller, proxy) {
                return known;
            }
            format!("reverted with 0x{}", hex::encode(data))
        }
        None => err.to_string(),
    };
    Error::RepointRejected { proxy, reason }
}
