//! Publishing of new implementations.
use std::time::Duration;

use alloy_primitives::Address;
use tracing::{debug, info};

use crate::{
    config::Config,
    endpoint::{bounded, Endpoint, EndpointError},
    module::ModuleDefinition,
    Error, Result,
};

/// Publishes contracts through an [`Endpoint`] and confirms they carry code.
///
/// A failed deployment is reported, never retried.
#[derive(Clone, Debug)]
pub struct ImplementationDeployer<E> {
    endpoint: E,
    deployer: Address,
    timeout: Duration,
}

impl<E: Endpoint> ImplementationDeployer<E> {
    /// Creates a deployer sending from `deployer`, with the default call
    /// timeout.
    #[must_use]
    pub fn new(endpoint: E, deployer: Address) -> Self {
        let timeout = Config::default().call_timeout();
        Self { endpoint, deployer, timeout }
    }

    /// Creates a deployer from the `deployer` and timeout of `config`.
    pub fn from_config(endpoint: E, config: &Config) -> Self {
        Self::new(endpoint, config.deployer).with_timeout(config.call_timeout())
    }

    /// Bounds every endpoint call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint deployments go through.
    #[must_use]
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Account deployments are sent from.
    #[must_use]
    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// Upper bound of every endpoint call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deploys a fresh implementation of `definition`.
    ///
    /// The implementation starts from blank storage. Whatever its
    /// constructor writes stays in the implementation's own storage, which a
    /// proxy never reads.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - If the creation is rejected, reverts,
    ///   times out or leaves no code behind.
    pub async fn deploy(
        &self,
        definition: &ModuleDefinition,
        constructor_args: &[u8],
    ) -> Result<Address> {
        let address = self
            .deploy_code(
                &definition.name,
                &definition.bytecode,
                constructor_args,
            )
            .await?;
        info!(
            module = %definition.name,
            version = %definition.version(),
            implementation = %address,
            "deployed implementation"
        );
        Ok(address)
    }

    /// Deploys raw `bytecode`, labelled `label` in errors and logs.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - See [`Self::deploy`].
    pub async fn deploy_code(
        &self,
        label: &str,
        bytecode: &[u8],
        constructor_args: &[u8],
    ) -> Result<Address> {
        self.deploy_code_as(self.deployer, label, bytecode, constructor_args)
            .await
    }

    /// Like [`Self::deploy_code`], but sent from `from`.
    ///
    /// Constructors that record their sender (e.g. as owner) see `from`.
    ///
    /// # Errors
    ///
    /// * [`Error::DeploymentFailed`] - See [`Self::deploy`].
    pub async fn deploy_code_as(
        &self,
        from: Address,
        label: &str,
        bytecode: &[u8],
        constructor_args: &[u8],
    ) -> Result<Address> {
        let address = bounded(
            self.timeout,
            self.endpoint.deploy(from, bytecode, constructor_args),
        )
        .await
        .map_err(|e| failed(label, &e))?;

        let code = bounded(self.timeout, self.endpoint.code_at(address))
            .await
            .map_err(|e| failed(label, &e))?;
        if code.is_empty() {
            return Err(Error::DeploymentFailed(format!(
                "{label}: no code at {address} after creation"
            )));
        }

        debug!(label, %from, %address, "contract created");
        Ok(address)
    }
}

fn failed(label: &str, err: &EndpointError) -> Error {
    Error::DeploymentFailed(format!("{label}: {err}"))
}
