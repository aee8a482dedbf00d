//! Proxy programs and the helpers that make a module upgradeable.
//!
//! Two administration models are provided:
//!
//! - [`TransparentUpgradeableProxy`] + [`ProxyAdmin`]: the upgrade authority
//!   is a separate admin program; the implementation knows nothing about
//!   upgrades.
//! - [`Erc1967Proxy`] + [`UupsUpgradeable`]: the proxy is a bare forwarder
//!   and the implementation itself exposes `upgradeToAndCall`.
pub mod erc1967;
mod initializable;
mod transparent;
mod uups;

pub use erc1967::{Erc1967Proxy, Erc1967Utils, ADMIN_SLOT, IMPLEMENTATION_SLOT};
pub use initializable::{
    Initializable, InvalidInitialization, INITIALIZABLE_STORAGE,
};
pub use transparent::{
    IProxyAdmin, ITransparentUpgradeableProxy, ProxyAdmin,
    ProxyDeniedAdminAccess, TransparentUpgradeableProxy,
    UPGRADE_INTERFACE_VERSION,
};
pub use uups::{
    IUupsUpgradeable, UUPSUnauthorizedCallContext,
    UUPSUnsupportedProxiableUUID, UupsUpgradeable,
};

/// Bytecode of the built-in [`Erc1967Proxy`].
pub const ERC1967_PROXY_CODE: &[u8] = b"devnet:ERC1967Proxy";
/// Bytecode of the built-in [`TransparentUpgradeableProxy`].
pub const TRANSPARENT_PROXY_CODE: &[u8] =
    b"devnet:TransparentUpgradeableProxy";
/// Bytecode of the built-in [`ProxyAdmin`].
pub const PROXY_ADMIN_CODE: &[u8] = b"devnet:ProxyAdmin";
