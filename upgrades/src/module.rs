//! What gets deployed: module definitions and the proxy artifacts wrapped
//! around them.
use alloy_json_abi::JsonAbi;
use alloy_primitives::{keccak256, Bytes, B256};
use devnet::proxy::{
    ERC1967_PROXY_CODE, PROXY_ADMIN_CODE, TRANSPARENT_PROXY_CODE,
};

/// An upgradeable module, as built: creation bytecode plus the interface it
/// exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDefinition {
    /// Human-readable name, used in logs.
    pub name: String,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// Interface descriptor of the deployed module.
    pub interface: JsonAbi,
}

impl ModuleDefinition {
    /// Creates a definition.
    pub fn new(
        name: impl Into<String>,
        bytecode: impl Into<Bytes>,
        interface: JsonAbi,
    ) -> Self {
        Self { name: name.into(), bytecode: bytecode.into(), interface }
    }

    /// Content-derived version tag: the hash of the bytecode.
    #[must_use]
    pub fn version(&self) -> B256 {
        keccak256(&self.bytecode)
    }
}

/// Creation bytecode of the proxy-side contracts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyArtifacts {
    /// Bare ERC-1967 proxy used for self-managed (UUPS) modules.
    /// Constructor: `(address implementation, bytes data)`.
    pub erc1967_proxy: Bytes,
    /// Transparent proxy. Constructor: `(address logic, address admin, bytes
    /// data)`.
    pub transparent_proxy: Bytes,
    /// Admin of transparent proxies. Constructor: `(address initialOwner)`.
    pub proxy_admin: Bytes,
}

impl ProxyArtifacts {
    /// The proxy programs built into the devnet.
    #[must_use]
    pub fn devnet() -> Self {
        Self {
            erc1967_proxy: Bytes::from_static(ERC1967_PROXY_CODE),
            transparent_proxy: Bytes::from_static(TRANSPARENT_PROXY_CODE),
            proxy_admin: Bytes::from_static(PROXY_ADMIN_CODE),
        }
    }
}
