//! The execution endpoint every component talks to.
//!
//! An [`Endpoint`] is a chain: something that creates accounts from
//! bytecode, executes calls against them and exposes their raw storage.
//! [`DevnetEndpoint`] runs in-process; `RpcEndpoint` (feature `rpc`) talks
//! JSON-RPC to a node.
use std::{future::Future, time::Duration};

use alloy_primitives::{hex, Address, Bytes, B256};

mod devnet;
#[cfg(feature = "rpc")]
mod rpc;

pub use devnet::DevnetEndpoint;
#[cfg(feature = "rpc")]
pub use rpc::RpcEndpoint;

/// A failed endpoint operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    /// Execution reverted with the given revert data.
    #[error("execution reverted: 0x{}", hex::encode(.0))]
    Reverted(Bytes),
    /// The endpoint refused the request before executing it.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The endpoint could not be reached or did not answer in time.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl EndpointError {
    /// The revert data, if execution reverted.
    #[must_use]
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::Reverted(data) => Some(data),
            Self::Rejected(_) | Self::Transport(_) => None,
        }
    }
}

/// A chain to deploy to and call into.
///
/// `from` selects the account an operation is made on behalf of; nothing is
/// read from ambient state.
pub trait Endpoint: Send + Sync {
    /// Creates a contract from `bytecode`, running its constructor with the
    /// ABI-encoded `args`, and returns its address.
    fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> impl Future<Output = Result<Address, EndpointError>> + Send;

    /// Executes a read-only call; any state change is discarded.
    fn call(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> impl Future<Output = Result<Bytes, EndpointError>> + Send;

    /// Executes a state-mutating call.
    fn send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> impl Future<Output = Result<Bytes, EndpointError>> + Send;

    /// Code stored at `address`, empty for accounts without code.
    fn code_at(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<Bytes, EndpointError>> + Send;

    /// Raw storage word of `address` at `slot`.
    fn storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> impl Future<Output = Result<B256, EndpointError>> + Send;
}

/// Runs `operation`, giving up after `limit`.
///
/// # Errors
///
/// * [`EndpointError::Transport`] - If `limit` elapses first.
/// * Whatever `operation` fails with.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, EndpointError>>,
) -> Result<T, EndpointError> {
    tokio::time::timeout(limit, operation).await.map_err(|_| {
        EndpointError::Transport(format!(
            "no answer within {}ms",
            limit.as_millis()
        ))
    })?
}
