//! Module programs shared by unit tests.
use alloy_json_abi::JsonAbi;
use alloy_primitives::{uint, Address, U256};
use alloy_sol_types::{sol, SolCall, SolInterface};
use devnet::{
    access::Ownable,
    proxy::{Initializable, UupsUpgradeable},
    Context, Devnet, Program, ProgramResult, Revert,
};

use crate::module::ModuleDefinition;

pub(crate) const DEPLOYER: Address = Address::repeat_byte(0xde);
pub(crate) const ALICE: Address = Address::repeat_byte(0xa1);
pub(crate) const BOB: Address = Address::repeat_byte(0xb0);

sol! {
    interface IVault {
        function initialize(uint256 value) external;
        function value() external view returns (uint256);
        function setValue(uint256 value) external;
        function version() external view returns (uint256);
    }
}

pub(crate) use IVault::{initializeCall, setValueCall, valueCall, versionCall};

pub(crate) const VALUE_SLOT: U256 = uint!(0_U256);

/// Stored value plus a code-level version, upgradeable both ways.
struct Vault(u64);

impl Program for Vault {
    fn construct(
        &self,
        ctx: &mut Context<'_>,
        _args: &[u8],
    ) -> Result<(), Revert> {
        Initializable::disable_initializers(ctx);
        Ok(())
    }

    fn call(&self, ctx: &mut Context<'_>, input: &[u8]) -> ProgramResult {
        if let Some(result) =
            UupsUpgradeable::dispatch(ctx, input, Ownable::only_owner)
        {
            return result;
        }
        match IVault::IVaultCalls::abi_decode(input)
            .map_err(|e| Revert::malformed(&e))?
        {
            IVault::IVaultCalls::initialize(call) => {
                Initializable::initializer(ctx)?;
                let owner = ctx.sender();
                Ownable::init(ctx, owner)?;
                ctx.sstore(VALUE_SLOT, call.value);
                Ok(Vec::new())
            }
            IVault::IVaultCalls::value(_) => {
                Ok(valueCall::abi_encode_returns(&ctx.sload(VALUE_SLOT)))
            }
            IVault::IVaultCalls::setValue(call) => {
                ctx.sstore(VALUE_SLOT, call.value);
                Ok(Vec::new())
            }
            IVault::IVaultCalls::version(_) => {
                Ok(versionCall::abi_encode_returns(&U256::from(self.0)))
            }
        }
    }
}

/// Installs version `version` of the vault and describes it.
pub(crate) fn vault(devnet: &Devnet, version: u64) -> ModuleDefinition {
    let bytecode = devnet.install(&format!("Vault{version}"), Vault(version));
    let interface = JsonAbi::parse([
        "function initialize(uint256 value)",
        "function value() returns (uint256)",
        "function setValue(uint256 value)",
        "function version() returns (uint256)",
        "function upgradeToAndCall(address newImplementation, bytes data)",
        "function proxiableUUID() returns (bytes32)",
    ])
    .expect("vault interface should parse");
    ModuleDefinition::new(format!("Vault{version}"), bytecode, interface)
}

/// Calldata of the vault initializer.
pub(crate) fn init_data(value: u64) -> Vec<u8> {
    initializeCall { value: U256::from(value) }.abi_encode()
}
