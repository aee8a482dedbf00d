//! The persisted view of a deployment.
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Who holds upgrade authority over a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyKind {
    /// Transparent proxy, upgraded through a separate `ProxyAdmin`.
    #[serde(rename = "transparent")]
    AdminManaged,
    /// UUPS proxy, upgraded through the implementation itself.
    #[serde(rename = "uups")]
    SelfManaged,
}

impl std::fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdminManaged => f.write_str("transparent"),
            Self::SelfManaged => f.write_str("uups"),
        }
    }
}

/// A proxy and the implementation it pointed at when the record was
/// written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Key of the lineage this record belongs to.
    pub logical_name: String,
    /// Stable address users interact with.
    pub proxy: Address,
    /// Implementation behind `proxy`.
    pub implementation: Address,
    /// Interface of `implementation`.
    pub interface: JsonAbi,
    /// Administration model of `proxy`.
    pub kind: ProxyKind,
    /// The `ProxyAdmin` of an admin-managed proxy.
    pub admin: Option<Address>,
    /// Version tag of the module definition `implementation` was built
    /// from.
    pub version: B256,
}
