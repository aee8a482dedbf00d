//! Reads of the [ERC-1967] proxy slots through an [`Endpoint`].
//!
//! [ERC-1967]: https://eips.ethereum.org/EIPS/eip-1967
use alloy_primitives::{b256, Address, B256};

use crate::endpoint::{Endpoint, EndpointError};

/// Storage slot with the address of the current implementation.
/// This is the keccak-256 hash of "eip1967.proxy.implementation" subtracted by
/// 1.
pub const IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// Storage slot with the admin of the contract.
/// This is the keccak-256 hash of "eip1967.proxy.admin" subtracted by 1.
pub const ADMIN_SLOT: B256 =
    b256!("0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

/// The implementation `proxy` currently points at, `None` if the slot is
/// empty.
///
/// # Errors
///
/// If the endpoint cannot read the slot.
pub async fn implementation<E: Endpoint>(
    endpoint: &E,
    proxy: Address,
) -> Result<Option<Address>, EndpointError> {
    read_address(endpoint, proxy, IMPLEMENTATION_SLOT).await
}

/// The admin of `proxy`, `None` if the slot is empty.
///
/// # Errors
///
/// If the endpoint cannot read the slot.
pub async fn admin<E: Endpoint>(
    endpoint: &E,
    proxy: Address,
) -> Result<Option<Address>, EndpointError> {
    read_address(endpoint, proxy, ADMIN_SLOT).await
}

async fn read_address<E: Endpoint>(
    endpoint: &E,
    proxy: Address,
    slot: B256,
) -> Result<Option<Address>, EndpointError> {
    let word = endpoint.storage_at(proxy, slot).await?;
    let address = Address::from_word(word);
    Ok((!address.is_zero()).then_some(address))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{keccak256, U256};

    use super::*;

    fn derive(label: &str) -> B256 {
        let hash = U256::from_be_bytes(keccak256(label).0);
        B256::from(hash - U256::from(1))
    }

    #[test]
    fn slots_are_derived_from_labels() {
        assert_eq!(IMPLEMENTATION_SLOT, derive("eip1967.proxy.implementation"));
        assert_eq!(ADMIN_SLOT, derive("eip1967.proxy.admin"));
    }

    #[test]
    fn slots_match_devnet() {
        assert_eq!(
            U256::from_be_bytes(IMPLEMENTATION_SLOT.0),
            devnet::proxy::IMPLEMENTATION_SLOT
        );
        assert_eq!(
            U256::from_be_bytes(ADMIN_SLOT.0),
            devnet::proxy::ADMIN_SLOT
        );
    }
}
