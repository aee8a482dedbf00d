//! # Proxy upgrades
//!
//! Lifecycle management for upgradeable modules behind [ERC-1967] proxies:
//! deploy an implementation behind a proxy, later swap the implementation
//! while the proxy keeps its address and storage, and gather evidence that
//! state survived and the new logic is reachable.
//!
//! Two administration models are supported, selected with [`ProxyKind`]:
//!
//! - **Admin-managed** (transparent proxy): upgrade authority sits in a
//!   separate `ProxyAdmin` contract.
//! - **Self-managed** (UUPS): the implementation authorizes its own
//!   replacement, invoked through the proxy.
//!
//! The building blocks, bottom-up:
//!
//! - [`store`]: durable records, keyed by logical name.
//! - [`ImplementationDeployer`]: publishes implementations.
//! - [`ProxyController`]: deploys, initializes and repoints proxies.
//! - [`Orchestrator`]: runs an upgrade as a staged state machine.
//! - [`Verifier`]: captures and compares proxy state.
//!
//! Everything talks to the chain through an [`Endpoint`]. Tests use the
//! in-process [`DevnetEndpoint`]; enable the `rpc` feature for a JSON-RPC
//! endpoint.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use alloy_json_abi::JsonAbi;
//! use devnet::{Context, Devnet, Program, ProgramResult};
//! use proxy_upgrades::{
//!     DevnetEndpoint, ImplementationDeployer, MemoryRecordStore,
//!     ModuleDefinition, Orchestrator, ProxyArtifacts, ProxyController,
//!     ProxyKind,
//! };
//!
//! struct Module;
//!
//! impl Program for Module {
//!     fn call(&self, _ctx: &mut Context<'_>, _input: &[u8]) -> ProgramResult {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let devnet = Arc::new(Devnet::new());
//! let bytecode = devnet.install("Module", Module);
//! let definition =
//!     ModuleDefinition::new("Module", bytecode, JsonAbi::default());
//!
//! let owner = alloy_primitives::Address::repeat_byte(0xa1);
//! let deployer =
//!     ImplementationDeployer::new(DevnetEndpoint::new(devnet), owner);
//! let controller = ProxyController::new(deployer, ProxyArtifacts::devnet());
//! let orchestrator = Orchestrator::new(controller, MemoryRecordStore::new());
//!
//! let record = orchestrator
//!     .deploy_proxy(
//!         "Module",
//!         ProxyKind::AdminManaged,
//!         &definition,
//!         &[],
//!         owner,
//!     )
//!     .await
//!     .expect("should deploy");
//! assert!(record.admin.is_some());
//! # });
//! ```
//!
//! [ERC-1967]: https://eips.ethereum.org/EIPS/eip-1967
pub mod abi;
pub mod config;
pub mod controller;
pub mod deployer;
pub mod endpoint;
pub mod erc1967;
mod error;
pub mod handle;
pub mod module;
pub mod orchestrator;
pub mod record;
pub mod store;
#[cfg(test)]
mod testing;
pub mod verify;

pub use config::Config;
pub use controller::{Deployment, ProxyController};
pub use deployer::ImplementationDeployer;
pub use endpoint::{DevnetEndpoint, Endpoint, EndpointError};
#[cfg(feature = "rpc")]
pub use endpoint::RpcEndpoint;
pub use error::{Error, ErrorKind, Result};
pub use handle::ProxyHandle;
pub use module::{ModuleDefinition, ProxyArtifacts};
pub use orchestrator::{
    Orchestrator, UpgradeFailure, UpgradeReport, UpgradeResult, UpgradeStage,
    UpgradeState,
};
pub use record::{DeploymentRecord, ProxyKind};
pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use verify::{compare_states, Probe, Snapshot, StateDelta, Verifier};
