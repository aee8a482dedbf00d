//! One-time initialization for programs running behind a proxy.
//!
//! Implementations have no usable constructor: whatever a constructor writes
//! lands in the implementation's own storage, which the proxy never reads.
//! Setup therefore happens in an initializer invoked through the proxy, and
//! this helper keeps that initializer from running twice.
use alloy_primitives::{uint, U256};
pub use sol::*;

use crate::{Context, Revert};

#[cfg_attr(coverage_nightly, coverage(off))]
mod sol {
    use alloy_sol_types::sol;

    sol! {
        /// The contract is already initialized.
        #[derive(Debug, PartialEq)]
        #[allow(missing_docs)]
        error InvalidInitialization();
    }
}

/// Storage location of the initialized version.
pub const INITIALIZABLE_STORAGE: U256 = uint!(
    0xf0c57e16840df040f15088dc2f81fe391c3923bec73e23a9662efc9c229c6a00_U256
);

/// Version marker of an implementation that can never be initialized.
const DISABLED: u64 = u64::MAX;

/// Initialized-version bookkeeping.
pub struct Initializable;

impl Initializable {
    /// Guards a first-time initializer.
    ///
    /// # Errors
    ///
    /// * [`InvalidInitialization`] - If the storage was already initialized
    ///   (or initializers were disabled).
    pub fn initializer(ctx: &mut Context<'_>) -> Result<(), Revert> {
        Self::reinitializer(ctx, 1)
    }

    /// Guards an initializer that migrates storage to `version`.
    ///
    /// # Errors
    ///
    /// * [`InvalidInitialization`] - If the storage is already at `version`
    ///   or later.
    pub fn reinitializer(
        ctx: &mut Context<'_>,
        version: u64,
    ) -> Result<(), Revert> {
        if Self::initialized_version(ctx) >= version {
            return Err(InvalidInitialization {}.into());
        }
        ctx.sstore(INITIALIZABLE_STORAGE, U256::from(version));
        Ok(())
    }

    /// Locks the current storage against any future initialization.
    ///
    /// Meant for implementation constructors, so the raw implementation can
    /// never be initialized and taken over.
    pub fn disable_initializers(ctx: &mut Context<'_>) {
        ctx.sstore(INITIALIZABLE_STORAGE, U256::from(DISABLED));
    }

    /// Highest version the storage was initialized to.
    #[must_use]
    pub fn initialized_version(ctx: &Context<'_>) -> u64 {
        ctx.sload(INITIALIZABLE_STORAGE).saturating_to()
    }
}
