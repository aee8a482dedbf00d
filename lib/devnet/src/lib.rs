//! # Devnet - an in-memory chain for upgradeable proxies
//!
//! This crate runs "programs" (plain Rust types implementing [`Program`])
//! against an account model that mirrors the parts of the EVM proxies rely
//! on: per-account storage, contract creation with nonce-derived addresses,
//! regular calls, and delegate calls that execute foreign code against the
//! caller's storage.
//!
//! It ships the proxy programs an upgrade flow needs ([`Erc1967Proxy`],
//! [`TransparentUpgradeableProxy`], [`ProxyAdmin`]) and the building blocks
//! a module program composes to become upgradeable ([`Initializable`],
//! [`Ownable`], [`UupsUpgradeable`]).
//!
//! ```rust
//! use alloy_primitives::Address;
//! use devnet::{Context, Devnet, Program, ProgramResult};
//!
//! struct Echo;
//!
//! impl Program for Echo {
//!     fn call(&self, _ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
//!         Ok(input.to_vec())
//!     }
//! }
//!
//! let devnet = Devnet::new();
//! let code = devnet.install("Echo", Echo);
//! let alice = Address::repeat_byte(0xa1);
//! let echo = devnet.deploy(alice, &code, &[]).expect("should deploy");
//! let output = devnet.call(alice, echo, b"ping").expect("should echo");
//! assert_eq!(&output[..], b"ping");
//! ```
//!
//! [`Erc1967Proxy`]: crate::proxy::Erc1967Proxy
//! [`TransparentUpgradeableProxy`]: crate::proxy::TransparentUpgradeableProxy
//! [`ProxyAdmin`]: crate::proxy::ProxyAdmin
//! [`Initializable`]: crate::proxy::Initializable
//! [`UupsUpgradeable`]: crate::proxy::UupsUpgradeable
//! [`Ownable`]: crate::access::Ownable
pub mod access;
mod chain;
pub mod proxy;
pub mod storage;

pub use chain::{Context, Devnet, DevnetError, Program, ProgramResult, Revert};
