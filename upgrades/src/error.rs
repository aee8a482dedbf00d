//! Error types of the upgrade lifecycle.
use alloy_primitives::Address;

use crate::endpoint::EndpointError;

/// Convenience alias for results whose error is [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while deploying, upgrading or verifying a
/// proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No record exists under the requested logical name.
    #[error("no deployment recorded under `{name}`")]
    NotFound {
        /// The logical name that was looked up.
        name: String,
    },
    /// An implementation or proxy could not be published.
    #[error("deployment failed: {0}")]
    DeploymentFailed(String),
    /// The caller lacks upgrade authority over the proxy.
    #[error("account {caller} is not authorized to upgrade")]
    Unauthorized {
        /// The account the upgrade was sent from.
        caller: Address,
    },
    /// The one-time initializer already ran through this proxy.
    #[error("proxy {proxy} is already initialized")]
    AlreadyInitialized {
        /// The proxy whose initializer was invoked again.
        proxy: Address,
    },
    /// After a repoint the proxy does not point at the new implementation.
    #[error(
        "proxy {proxy} points at {actual:?} instead of {expected} after repoint"
    )]
    RepointVerificationFailed {
        /// The repointed proxy.
        proxy: Address,
        /// The implementation the proxy should point at.
        expected: Address,
        /// The implementation found in the slot, `None` if it is empty.
        actual: Option<Address>,
    },
    /// The repoint transaction itself failed for a reason other than
    /// authorization.
    #[error("repoint of proxy {proxy} failed: {reason}")]
    RepointRejected {
        /// The proxy being repointed.
        proxy: Address,
        /// What the endpoint reported.
        reason: String,
    },
    /// The proxy could not be read back, e.g. because the endpoint stalled.
    #[error("could not verify proxy {proxy}: {reason}")]
    VerificationUnavailable {
        /// The proxy being verified.
        proxy: Address,
        /// What the endpoint reported.
        reason: String,
    },
    /// A call was encoded for a function the proxy's interface lacks.
    #[error("function `{signature}` is not part of the active interface")]
    NotInInterface {
        /// Solidity signature of the refused function.
        signature: String,
    },
    /// Return data did not match the expected ABI type.
    #[error("could not decode return data: {0}")]
    Decode(String),
    /// A deployment lineage with this name already exists.
    #[error("a deployment is already recorded under `{name}`")]
    AlreadyRecorded {
        /// The taken logical name.
        name: String,
    },
    /// A logical name that cannot be used as a record key.
    #[error("invalid logical name `{0}`")]
    InvalidName(String),
    /// The record store could not be read or written.
    #[error("record store: {0}")]
    Storage(String),
    /// The configuration could not be loaded.
    #[error("configuration: {0}")]
    Config(String),
    /// An endpoint call failed outside of any stage-specific handling.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::DeploymentFailed`].
    DeploymentFailed,
    /// See [`Error::Unauthorized`].
    Unauthorized,
    /// See [`Error::AlreadyInitialized`].
    AlreadyInitialized,
    /// The proxy was not, or could not be shown to be, repointed.
    RepointVerificationFailed,
    /// Anything else.
    Other,
}

impl Error {
    /// The category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DeploymentFailed(_) => ErrorKind::DeploymentFailed,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            Self::RepointVerificationFailed { .. }
            | Self::RepointRejected { .. }
            | Self::VerificationUnavailable { .. } => {
                ErrorKind::RepointVerificationFailed
            }
            Self::NotInInterface { .. }
            | Self::Decode(_)
            | Self::AlreadyRecorded { .. }
            | Self::InvalidName(_)
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Endpoint(_) => ErrorKind::Other,
        }
    }
}
