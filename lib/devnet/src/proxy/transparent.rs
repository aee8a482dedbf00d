//! Admin-managed ("transparent") proxies.
//!
//! The proxy routes calls by sender: the admin can only upgrade, everyone
//! else is forwarded to the implementation. The admin is a [`ProxyAdmin`]
//! program owned by an externally owned account, so authority over the
//! upgrade sits outside of both the proxy and the implementation.
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
pub use sol::*;

use super::erc1967::Erc1967Utils;
use crate::{access::Ownable, Context, Program, ProgramResult, Revert};

/// The version of the upgrade interface of the proxy programs.
pub const UPGRADE_INTERFACE_VERSION: &str = "5.0.0";

#[cfg_attr(coverage_nightly, coverage(off))]
mod sol {
    use alloy_sol_types::sol;

    sol! {
        /// The proxy caller is the current admin, and can't fallback to the
        /// proxy target.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error ProxyDeniedAdminAccess();
    }

    sol! {
        /// Entry point only the admin of a transparent proxy can reach.
        #[allow(missing_docs)]
        interface ITransparentUpgradeableProxy {
            function upgradeToAndCall(address newImplementation, bytes data) external payable;
        }

        /// Public surface of a [`super::ProxyAdmin`].
        #[allow(missing_docs)]
        interface IProxyAdmin {
            function upgradeAndCall(address proxy, address implementation, bytes data) external payable;
            function owner() external view returns (address);
            function transferOwnership(address newOwner) external;
            function UPGRADE_INTERFACE_VERSION() external view returns (string);
        }
    }
}

use IProxyAdmin::IProxyAdminCalls;

/// Proxy whose upgrade entry point is reserved to its admin.
///
/// Constructor arguments: `(address logic, address admin, bytes data)`.
pub struct TransparentUpgradeableProxy;

impl Program for TransparentUpgradeableProxy {
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        args: &[u8],
    ) -> Result<(), Revert> {
        let (logic, admin, data) =
            <(Address, Address, Bytes)>::abi_decode_params(args)
                .map_err(|e| Revert::malformed(&e))?;
        Erc1967Utils::change_admin(ctx, admin)?;
        Erc1967Utils::upgrade_to_and_call(ctx, logic, &data)
    }

    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
        if ctx.sender() != Erc1967Utils::get_admin(ctx) {
            let implementation = Erc1967Utils::get_implementation(ctx);
            return ctx.delegate(implementation, input);
        }

        let call =
            ITransparentUpgradeableProxy::upgradeToAndCallCall::abi_decode(
                input,
            )
            .map_err(|_| ProxyDeniedAdminAccess {})?;
        Erc1967Utils::upgrade_to_and_call(
            ctx,
            call.newImplementation,
            &call.data,
        )?;
        Ok(Vec::new())
    }
}

/// Admin program of [`TransparentUpgradeableProxy`] instances.
///
/// Constructor arguments: `(address initialOwner)`.
pub struct ProxyAdmin;

impl Program for ProxyAdmin {
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        args: &[u8],
    ) -> Result<(), Revert> {
        let initial_owner = Address::abi_decode(args)
            .map_err(|e| Revert::malformed(&e))?;
        Ownable::init(ctx, initial_owner)
    }

    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
        let call = IProxyAdminCalls::abi_decode(input)
            .map_err(|e| Revert::malformed(&e))?;
        match call {
            IProxyAdminCalls::upgradeAndCall(call) => {
                Ownable::only_owner(ctx)?;
                let upgrade =
                    ITransparentUpgradeableProxy::upgradeToAndCallCall {
                        newImplementation: call.implementation,
                        data: call.data,
                    };
                ctx.call(call.proxy, &upgrade.abi_encode())?;
                Ok(Vec::new())
            }
            IProxyAdminCalls::owner(_) => {
                Ok(IProxyAdmin::ownerCall::abi_encode_returns(&Ownable::owner(
                    ctx,
                )))
            }
            IProxyAdminCalls::transferOwnership(call) => {
                Ownable::transfer_ownership(ctx, call.newOwner)?;
                Ok(Vec::new())
            }
            IProxyAdminCalls::UPGRADE_INTERFACE_VERSION(_) => Ok(
                IProxyAdmin::UPGRADE_INTERFACE_VERSIONCall::abi_encode_returns(
                    &UPGRADE_INTERFACE_VERSION.to_string(),
                ),
            ),
        }
    }
}
