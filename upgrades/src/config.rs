//! Runtime configuration, read from TOML.
//!
//! ```toml
//! deployments_dir = "deployments"
//! call_timeout_ms = 30000
//! deployer = "0x3f1Eae7D46d88F08fc2F8ed27FCb2AB183EB2d0E"
//!
//! [network]
//! rpc_url = "http://localhost:8547"
//! private_keys = ["0x..."]
//! ```
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_primitives::{address, Address};
use serde::Deserialize;

use crate::{Error, Result};

/// Account used for deployments when none is configured.
pub const DEFAULT_DEPLOYER: Address =
    address!("0x3f1eae7d46d88f08fc2f8ed27fcb2ab183eb2d0e");

/// Settings shared by every component.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding one JSON record per logical name.
    pub deployments_dir: PathBuf,
    /// Upper bound for every endpoint call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Account deployments are sent from.
    pub deployer: Address,
    /// Node to talk to; the devnet is used when absent.
    pub network: Option<NetworkConfig>,
}

/// JSON-RPC connection settings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// HTTP URL of the node.
    pub rpc_url: String,
    /// Hex-encoded keys of the accounts allowed to send transactions.
    #[serde(default)]
    pub private_keys: Vec<String>,
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("rpc_url", &self.rpc_url)
            .field(
                "private_keys",
                &format_args!("[{} redacted]", self.private_keys.len()),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deployments_dir: PathBuf::from("deployments"),
            call_timeout_ms: 30_000,
            deployer: DEFAULT_DEPLOYER,
            network: None,
        }
    }
}

impl Config {
    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] - If the document is not valid TOML or has
    ///   unknown or mistyped keys.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        if config.call_timeout_ms == 0 {
            return Err(Error::Config(
                "call_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] - If the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Upper bound for every endpoint call.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
