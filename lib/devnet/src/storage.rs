//! Helpers for computing storage locations and packing values into words.
//!
//! Programs address storage the way Solidity lays it out, so that a module
//! that keeps its layout across versions keeps its data across upgrades.
use alloy_primitives::{keccak256, uint, Address, B256, U256};

/// Slot of `mapping[key]` for a mapping declared at `base`.
#[must_use]
pub fn mapping_slot(key: U256, base: U256) -> U256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&key.to_be_bytes::<32>());
    preimage[32..].copy_from_slice(&base.to_be_bytes::<32>());
    keccak256(preimage).into()
}

/// Base slot of an [ERC-7201] namespace.
///
/// `keccak256(abi.encode(uint256(keccak256(namespace)) - 1)) & ~0xff`
///
/// [ERC-7201]: https://eips.ethereum.org/EIPS/eip-7201
#[must_use]
pub fn namespace_slot(namespace: &str) -> U256 {
    let inner = <U256 as From<B256>>::from(keccak256(namespace.as_bytes())) - uint!(1_U256);
    let outer = <U256 as From<B256>>::from(keccak256(inner.to_be_bytes::<32>()));
    outer & !uint!(0xff_U256)
}

/// Packs `address` into the low-order bytes of a storage word.
#[must_use]
pub fn address_to_word(address: Address) -> U256 {
    <U256 as From<B256>>::from(address.into_word())
}

/// Reads the address held in the low-order bytes of a storage word.
#[must_use]
pub fn word_to_address(word: U256) -> Address {
    Address::from_word(B256::from(word))
}
