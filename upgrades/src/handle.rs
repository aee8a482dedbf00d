//! Typed access to a proxy through its active interface.
use std::time::Duration;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;

use crate::{
    config::Config,
    endpoint::{bounded, Endpoint},
    record::DeploymentRecord,
    Error, Result,
};

/// A proxy paired with the interface of the implementation it currently
/// points at.
///
/// Handles go stale on upgrade: re-resolve one from the new record instead of
/// reusing the old one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyHandle {
    /// Address of the proxy.
    pub proxy: Address,
    /// Interface calls are checked against.
    pub interface: JsonAbi,
    timeout: Duration,
}

impl From<&DeploymentRecord> for ProxyHandle {
    fn from(record: &DeploymentRecord) -> Self {
        Self::new(record.proxy, record.interface.clone())
    }
}

impl ProxyHandle {
    /// Creates a handle with the default call timeout.
    #[must_use]
    pub fn new(proxy: Address, interface: JsonAbi) -> Self {
        let timeout = Config::default().call_timeout();
        Self { proxy, interface, timeout }
    }

    /// Bounds every call made through the handle by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upper bound of every call made through the handle.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the interface declares a function with `C`'s selector.
    #[must_use]
    pub fn supports<C: SolCall>(&self) -> bool {
        self.interface
            .functions()
            .any(|function| function.selector() == C::SELECTOR)
    }

    /// ABI-encodes `call`.
    ///
    /// # Errors
    ///
    /// * [`Error::NotInInterface`] - If the interface lacks the function.
    pub fn encode<C: SolCall>(&self, call: &C) -> Result<Bytes> {
        if !self.supports::<C>() {
            return Err(Error::NotInInterface {
                signature: C::SIGNATURE.to_owned(),
            });
        }
        Ok(call.abi_encode().into())
    }

    /// Decodes the return data of `C`.
    ///
    /// # Errors
    ///
    /// * [`Error::Decode`] - If `data` does not match `C`'s outputs.
    pub fn decode<C: SolCall>(&self, data: &[u8]) -> Result<C::Return> {
        C::abi_decode_returns(data).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Executes `call` read-only through the proxy.
    ///
    /// # Errors
    ///
    /// * [`Error::NotInInterface`] - If the interface lacks the function.
    /// * [`Error::Endpoint`] - If the call fails or times out.
    /// * [`Error::Decode`] - If the return data is malformed.
    pub async fn call<E: Endpoint, C: SolCall>(
        &self,
        endpoint: &E,
        from: Address,
        call: &C,
    ) -> Result<C::Return> {
        let input = self.encode(call)?;
        let output =
            bounded(self.timeout, endpoint.call(from, self.proxy, &input))
                .await?;
        self.decode::<C>(&output)
    }

    /// Sends `call` as a transaction through the proxy.
    ///
    /// # Errors
    ///
    /// * [`Error::NotInInterface`] - If the interface lacks the function.
    /// * [`Error::Endpoint`] - If the transaction fails or times out.
    pub async fn send<E: Endpoint, C: SolCall>(
        &self,
        endpoint: &E,
        from: Address,
        call: &C,
    ) -> Result<Bytes> {
        let input = self.encode(call)?;
        let send = endpoint.send(from, self.proxy, &input);
        Ok(bounded(self.timeout, send).await?)
    }
}
