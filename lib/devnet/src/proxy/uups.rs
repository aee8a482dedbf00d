//! An upgradeability mechanism designed for UUPS (Universal Upgradeable Proxy
//! Standard) proxies as defined in [ERC-1822].
//!
//! [ERC-1822]: https://eips.ethereum.org/EIPS/eip-1822
//!
//! A module program mixes this in by routing its input through
//! [`UupsUpgradeable::dispatch`] before its own selectors. The module decides
//! who may upgrade by supplying the authorization check.
use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolCall, SolInterface};
pub use sol::*;

use super::{
    erc1967::{ERC1967InvalidImplementation, Erc1967Utils, IMPLEMENTATION_SLOT},
    UPGRADE_INTERFACE_VERSION,
};
use crate::{Context, ProgramResult, Revert};

#[cfg_attr(coverage_nightly, coverage(off))]
mod sol {
    use alloy_sol_types::sol;

    sol! {
        /// The call is from an unauthorized context.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error UUPSUnauthorizedCallContext();

        /// The storage `slot` is unsupported as a UUID.
        ///
        /// * `slot` - The unsupported UUID returned by the implementation.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error UUPSUnsupportedProxiableUUID(bytes32 slot);
    }

    sol! {
        /// Upgrade surface a UUPS implementation exposes.
        #[allow(missing_docs)]
        interface IUupsUpgradeable {
            function upgradeToAndCall(address newImplementation, bytes data) external payable;
            function proxiableUUID() external view returns (bytes32);
            function UPGRADE_INTERFACE_VERSION() external view returns (string);
        }
    }
}

use IUupsUpgradeable::IUupsUpgradeableCalls;

/// UUPS upgrade logic a module program composes.
pub struct UupsUpgradeable;

impl UupsUpgradeable {
    /// Handles the UUPS selectors, or returns `None` when `input` is meant
    /// for the module itself.
    ///
    /// `authorize` runs before any upgrade, in the proxy's context and with
    /// the old implementation's logic.
    pub fn dispatch(
        ctx: &mut Context<'_>,
        input: &[u8],
        authorize: impl FnOnce(&Context<'_>) -> Result<(), Revert>,
    ) -> Option<ProgramResult> {
        let call = IUupsUpgradeableCalls::abi_decode(input).ok()?;
        let result = match call {
            IUupsUpgradeableCalls::upgradeToAndCall(call) => {
                authorize(ctx).and_then(|()| {
                    Self::upgrade_to_and_call(
                        ctx,
                        call.newImplementation,
                        &call.data,
                    )
                })
                .map(|()| Vec::new())
            }
            IUupsUpgradeableCalls::proxiableUUID(_) => {
                Self::proxiable_uuid(ctx).map(|uuid| {
                    IUupsUpgradeable::proxiableUUIDCall::abi_encode_returns(
                        &uuid,
                    )
                })
            }
            IUupsUpgradeableCalls::UPGRADE_INTERFACE_VERSION(_) => {
                use IUupsUpgradeable::UPGRADE_INTERFACE_VERSIONCall as Version;
                Ok(Version::abi_encode_returns(
                    &UPGRADE_INTERFACE_VERSION.to_owned(),
                ))
            }
        };
        Some(result)
    }

    /// Upgrades the proxy this call runs in to `new_implementation`, then
    /// delegates `data` to it if nonempty.
    ///
    /// The caller is responsible for authorization.
    ///
    /// # Errors
    ///
    /// * [`UUPSUnauthorizedCallContext`] - If not called through an active
    ///   proxy.
    /// * [`ERC1967InvalidImplementation`] - If `new_implementation` does not
    ///   answer `proxiableUUID`.
    /// * [`UUPSUnsupportedProxiableUUID`] - If it answers with another slot.
    pub fn upgrade_to_and_call(
        ctx: &mut Context<'_>,
        new_implementation: Address,
        data: &[u8],
    ) -> Result<(), Revert> {
        Self::only_proxy(ctx)?;

        let query = IUupsUpgradeable::proxiableUUIDCall {}.abi_encode();
        let slot = ctx
            .call(new_implementation, &query)
            .ok()
            .and_then(|output| {
                IUupsUpgradeable::proxiableUUIDCall::abi_decode_returns(
                    &output,
                )
                .ok()
            })
            .ok_or(ERC1967InvalidImplementation {
                implementation: new_implementation,
            })?;
        if slot != B256::from(IMPLEMENTATION_SLOT) {
            return Err(UUPSUnsupportedProxiableUUID { slot }.into());
        }

        Erc1967Utils::upgrade_to_and_call(ctx, new_implementation, data)
    }

    /// The ERC-1822 UUID: the slot this implementation expects to be stored
    /// in.
    ///
    /// # Errors
    ///
    /// * [`UUPSUnauthorizedCallContext`] - If called through a proxy.
    pub fn proxiable_uuid(ctx: &Context<'_>) -> Result<B256, Revert> {
        Self::not_delegated(ctx)?;
        Ok(B256::from(IMPLEMENTATION_SLOT))
    }

    /// Checks that the running code is the active implementation of the
    /// proxy it runs for.
    ///
    /// # Errors
    ///
    /// * [`UUPSUnauthorizedCallContext`] - Otherwise.
    pub fn only_proxy(ctx: &Context<'_>) -> Result<(), Revert> {
        if !ctx.is_delegated()
            || Erc1967Utils::get_implementation(ctx) != ctx.code_address()
        {
            return Err(UUPSUnauthorizedCallContext {}.into());
        }
        Ok(())
    }

    /// Checks that the running code executes on its own storage.
    ///
    /// # Errors
    ///
    /// * [`UUPSUnauthorizedCallContext`] - Otherwise.
    pub fn not_delegated(ctx: &Context<'_>) -> Result<(), Revert> {
        if ctx.is_delegated() {
            return Err(UUPSUnauthorizedCallContext {}.into());
        }
        Ok(())
    }
}
