use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use devnet::{Devnet, DevnetError};

use super::{Endpoint, EndpointError};

/// [`Endpoint`] backed by an in-process [`Devnet`].
///
/// Every operation first waits for the devnet's simulated latency, which is
/// how tests exercise stalled endpoints.
#[derive(Clone, Debug)]
pub struct DevnetEndpoint {
    devnet: Arc<Devnet>,
}

impl DevnetEndpoint {
    /// Wraps a shared devnet.
    #[must_use]
    pub fn new(devnet: Arc<Devnet>) -> Self {
        Self { devnet }
    }

    /// The chain behind this endpoint.
    #[must_use]
    pub fn devnet(&self) -> &Devnet {
        &self.devnet
    }

    async fn round_trip(&self) {
        let latency = self.devnet.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl From<DevnetError> for EndpointError {
    fn from(err: DevnetError) -> Self {
        match err {
            DevnetError::Reverted(revert) => Self::Reverted(revert.into_data()),
            err @ DevnetError::UnknownBytecode(_) => {
                Self::Rejected(err.to_string())
            }
        }
    }
}

impl Endpoint for DevnetEndpoint {
    async fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> Result<Address, EndpointError> {
        self.round_trip().await;
        Ok(self.devnet.deploy(from, bytecode, args)?)
    }

    async fn call(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        self.round_trip().await;
        Ok(self.devnet.call(from, to, input)?)
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        self.round_trip().await;
        Ok(self.devnet.send(from, to, input)?)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, EndpointError> {
        self.round_trip().await;
        Ok(self.devnet.code_at(address))
    }

    async fn storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, EndpointError> {
        self.round_trip().await;
        let word = self.devnet.storage_at(address, U256::from_be_bytes(slot.0));
        Ok(B256::from(word))
    }
}
