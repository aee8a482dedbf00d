//! Solidity interfaces and errors of the proxy contracts this crate drives.
#![allow(missing_docs)]
use alloy_sol_types::sol;

sol! {
    /// Admin contract of a transparent proxy.
    interface ProxyAdmin {
        function upgradeAndCall(
            address proxy,
            address implementation,
            bytes data
        ) external payable;
        function owner() external view returns (address);
    }

    /// Upgrade entry point of a UUPS implementation, reached through the
    /// proxy.
    interface UupsUpgradeable {
        function upgradeToAndCall(
            address newImplementation,
            bytes data
        ) external payable;
    }
}

sol! {
    #[derive(Debug, PartialEq)]
    error OwnableUnauthorizedAccount(address account);

    #[derive(Debug, PartialEq)]
    error AccessControlUnauthorizedAccount(address account, bytes32 neededRole);

    #[derive(Debug, PartialEq)]
    error UUPSUnauthorizedCallContext();

    #[derive(Debug, PartialEq)]
    error InvalidInitialization();
}
