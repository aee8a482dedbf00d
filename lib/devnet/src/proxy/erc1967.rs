//! Getters and setters for [ERC-1967] slots, and the proxy that forwards
//! every call to the implementation stored in them.
//!
//! [ERC-1967]: https://eips.ethereum.org/EIPS/eip-1967
use alloy_primitives::{uint, Address, Bytes, U256};
use alloy_sol_types::SolValue;
pub use sol::*;

use crate::{
    storage::{address_to_word, word_to_address},
    Context, Program, ProgramResult, Revert,
};

#[cfg_attr(coverage_nightly, coverage(off))]
mod sol {
    use alloy_sol_types::sol;

    sol! {
        /// Indicates an error related to the fact that the `implementation`
        /// of the proxy is invalid.
        ///
        /// * `implementation` - Address of the invalid implementation.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error ERC1967InvalidImplementation(address implementation);

        /// Indicates an error related to the fact that the `admin` of the
        /// proxy is invalid.
        ///
        /// * `admin` - Address of the invalid admin.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error ERC1967InvalidAdmin(address admin);
    }
}

/// Storage slot with the address of the current implementation.
/// This is the keccak-256 hash of "eip1967.proxy.implementation" subtracted by
/// 1.
pub const IMPLEMENTATION_SLOT: U256 = uint!(
    0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc_U256
);

/// Storage slot with the admin of the contract.
/// This is the keccak-256 hash of "eip1967.proxy.admin" subtracted by 1.
pub const ADMIN_SLOT: U256 = uint!(
    0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103_U256
);

/// Accessors for the [ERC-1967] slots of the account a [`Context`] runs
/// for.
///
/// [ERC-1967]: https://eips.ethereum.org/EIPS/eip-1967
pub struct Erc1967Utils;

impl Erc1967Utils {
    /// Returns the current implementation address.
    #[must_use]
    pub fn get_implementation(ctx: &Context<'_>) -> Address {
        word_to_address(ctx.sload(IMPLEMENTATION_SLOT))
    }

    /// Performs implementation upgrade with additional setup call if
    /// `data` is nonempty.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Execution context of the proxy.
    /// * `new_implementation` - The new implementation address.
    /// * `data` - The data to pass to the setup call.
    ///
    /// # Errors
    ///
    /// * [`ERC1967InvalidImplementation`] - If `new_implementation` has no
    ///   code.
    /// * Any revert of the setup call.
    pub fn upgrade_to_and_call(
        ctx: &mut Context<'_>,
        new_implementation: Address,
        data: &[u8],
    ) -> Result<(), Revert> {
        Self::set_implementation(ctx, new_implementation)?;
        tracing::debug!(
            proxy = %ctx.address(),
            implementation = %new_implementation,
            "upgraded"
        );

        if !data.is_empty() {
            ctx.delegate(new_implementation, data)?;
        }
        Ok(())
    }

    /// Returns the current admin.
    #[must_use]
    pub fn get_admin(ctx: &Context<'_>) -> Address {
        word_to_address(ctx.sload(ADMIN_SLOT))
    }

    /// Changes the admin of the proxy.
    ///
    /// # Errors
    ///
    /// * [`ERC1967InvalidAdmin`] - If `new_admin` is [`Address::ZERO`].
    pub fn change_admin(
        ctx: &mut Context<'_>,
        new_admin: Address,
    ) -> Result<(), Revert> {
        if new_admin.is_zero() {
            return Err(ERC1967InvalidAdmin { admin: new_admin }.into());
        }
        ctx.sstore(ADMIN_SLOT, address_to_word(new_admin));
        Ok(())
    }

    fn set_implementation(
        ctx: &mut Context<'_>,
        new_implementation: Address,
    ) -> Result<(), Revert> {
        if !ctx.has_code(new_implementation) {
            return Err(ERC1967InvalidImplementation {
                implementation: new_implementation,
            }
            .into());
        }
        ctx.sstore(IMPLEMENTATION_SLOT, address_to_word(new_implementation));
        Ok(())
    }
}

/// Proxy that forwards every call to the implementation in the ERC-1967
/// implementation slot.
///
/// Constructor arguments: `(address implementation, bytes data)`. When
/// `data` is nonempty it is delegated to the implementation during
/// construction, which is how a proxy gets initialized.
///
/// The proxy has no upgrade entry point of its own. Upgrades go through the
/// implementation, see [`crate::proxy::UupsUpgradeable`].
pub struct Erc1967Proxy;

impl Program for Erc1967Proxy {
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        args: &[u8],
    ) -> Result<(), Revert> {
        let (implementation, data) = <(Address, Bytes)>::abi_decode_params(args)
            .map_err(|e| Revert::malformed(&e))?;
        Erc1967Utils::upgrade_to_and_call(ctx, implementation, &data)
    }

    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
        let implementation = Erc1967Utils::get_implementation(ctx);
        ctx.delegate(implementation, input)
    }
}
