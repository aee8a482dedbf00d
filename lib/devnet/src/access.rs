//! Single-owner access control for programs.
//!
//! The owner lives in the `openzeppelin.storage.Ownable` namespace, so it
//! can be shared by a proxy and every implementation that runs behind it
//! without colliding with module storage.
use alloy_primitives::{uint, Address, U256};
pub use sol::*;

use crate::{
    storage::{address_to_word, word_to_address},
    Context, Revert,
};

#[cfg_attr(coverage_nightly, coverage(off))]
mod sol {
    use alloy_sol_types::sol;

    sol! {
        /// The caller account is not authorized to perform an operation.
        ///
        /// * `account` - Account that was found to not be authorized.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error OwnableUnauthorizedAccount(address account);

        /// The owner is not a valid owner account (eg. [`Address::ZERO`]).
        ///
        /// * `owner` - Account that's not allowed to become the owner.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error OwnableInvalidOwner(address owner);
    }

    sol! {
        /// Public surface of an [`super::Ownable`] program.
        #[allow(missing_docs)]
        interface IOwnable {
            function owner() external view returns (address);
            function transferOwnership(address newOwner) external;
        }
    }
}

/// Storage location of the owner.
pub const OWNABLE_STORAGE: U256 = uint!(
    0x9016d09d72d40fdae2fd8ceac6b6234c7706214fd39c1cd1e609a0528c199300_U256
);

/// Owner bookkeeping shared by programs.
pub struct Ownable;

impl Ownable {
    /// Returns the address of the current owner.
    #[must_use]
    pub fn owner(ctx: &Context<'_>) -> Address {
        word_to_address(ctx.sload(OWNABLE_STORAGE))
    }

    /// Sets the first owner.
    ///
    /// # Errors
    ///
    /// * [`OwnableInvalidOwner`] - If `initial_owner` is [`Address::ZERO`].
    pub fn init(
        ctx: &mut Context<'_>,
        initial_owner: Address,
    ) -> Result<(), Revert> {
        if initial_owner.is_zero() {
            return Err(OwnableInvalidOwner { owner: initial_owner }.into());
        }
        ctx.sstore(OWNABLE_STORAGE, address_to_word(initial_owner));
        Ok(())
    }

    /// Checks that the caller is the owner.
    ///
    /// # Errors
    ///
    /// * [`OwnableUnauthorizedAccount`] - If the caller is not the owner.
    pub fn only_owner(ctx: &Context<'_>) -> Result<(), Revert> {
        let account = ctx.sender();
        if Self::owner(ctx) != account {
            return Err(OwnableUnauthorizedAccount { account }.into());
        }
        Ok(())
    }

    /// Transfers ownership to `new_owner`. Can only be called by the owner.
    ///
    /// # Errors
    ///
    /// * [`OwnableUnauthorizedAccount`] - If the caller is not the owner.
    /// * [`OwnableInvalidOwner`] - If `new_owner` is [`Address::ZERO`].
    pub fn transfer_ownership(
        ctx: &mut Context<'_>,
        new_owner: Address,
    ) -> Result<(), Revert> {
        Self::only_owner(ctx)?;
        Self::init(ctx, new_owner)
    }
}
