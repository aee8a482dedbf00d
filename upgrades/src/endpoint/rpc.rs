use std::{fmt, str::FromStr};

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::{RpcError, TransportErrorKind},
};
use alloy_primitives::{Address, Bytes, B256};
use eyre::{eyre, Context};

use super::{Endpoint, EndpointError};
use crate::{config::NetworkConfig, Error};

/// [`Endpoint`] talking JSON-RPC to a node.
///
/// Transactions are signed locally; the `from` of an operation must be one
/// of the accounts the endpoint was given a private key for.
#[derive(Clone)]
pub struct RpcEndpoint {
    provider: DynProvider,
    accounts: Vec<Address>,
}

impl fmt::Debug for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcEndpoint")
            .field("accounts", &self.accounts)
            .finish_non_exhaustive()
    }
}

impl RpcEndpoint {
    /// Connects to `rpc_url`, signing with `private_keys`.
    ///
    /// # Errors
    ///
    /// If no key is given, a key is malformed, or the URL does not parse.
    pub fn connect(
        rpc_url: &str,
        private_keys: &[String],
    ) -> eyre::Result<Self> {
        let mut signers = private_keys.iter().map(|key| {
            PrivateKeySigner::from_str(key).wrap_err("invalid private key")
        });
        let first = signers
            .next()
            .ok_or_else(|| eyre!("at least one private key is required"))??;

        let mut accounts = vec![first.address()];
        let mut wallet = EthereumWallet::from(first);
        for signer in signers {
            let signer = signer?;
            accounts.push(signer.address());
            wallet.register_signer(signer);
        }

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(rpc_url.parse()?)
            .erased();
        Ok(Self { provider, accounts })
    }

    /// Connects to the node described by `network`.
    ///
    /// # Errors
    ///
    /// * [`Error::Config`] - If the connection settings are unusable.
    pub fn from_config(network: &NetworkConfig) -> crate::Result<Self> {
        Self::connect(&network.rpc_url, &network.private_keys)
            .map_err(|e| Error::Config(format!("{e:#}")))
    }

    /// Accounts this endpoint can send from.
    #[must_use]
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    async fn try_deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> eyre::Result<Address> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_deploy_code([bytecode, args].concat());
        let receipt =
            self.provider.send_transaction(tx).await?.get_receipt().await?;
        if !receipt.status() {
            return Err(EndpointError::Reverted(Bytes::new()).into());
        }
        receipt
            .contract_address()
            .ok_or_else(|| eyre!("receipt carries no contract address"))
    }

    async fn try_send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> eyre::Result<Bytes> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input.to_vec());
        let receipt =
            self.provider.send_transaction(tx).await?.get_receipt().await?;
        if !receipt.status() {
            return Err(EndpointError::Reverted(Bytes::new()).into());
        }
        // Receipts do not carry return data.
        Ok(Bytes::new())
    }
}

/// Maps a failure of the provider stack onto the endpoint taxonomy.
fn classify(report: &eyre::Report) -> EndpointError {
    if let Some(err) = report.downcast_ref::<EndpointError>() {
        return err.clone();
    }
    match report.downcast_ref::<RpcError<TransportErrorKind>>() {
        Some(err) => {
            if let Some(data) =
                err.as_error_resp().and_then(|payload| payload.as_revert_data())
            {
                EndpointError::Reverted(data)
            } else if matches!(err, RpcError::Transport(_)) {
                EndpointError::Transport(err.to_string())
            } else {
                EndpointError::Rejected(err.to_string())
            }
        }
        None => EndpointError::Rejected(format!("{report:#}")),
    }
}

impl Endpoint for RpcEndpoint {
    async fn deploy(
        &self,
        from: Address,
        bytecode: &[u8],
        args: &[u8],
    ) -> Result<Address, EndpointError> {
        self.try_deploy(from, bytecode, args).await.map_err(|e| classify(&e))
    }

    async fn call(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input.to_vec());
        self.provider
            .call(tx)
            .await
            .map_err(|e| classify(&eyre::Report::new(e)))
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<Bytes, EndpointError> {
        self.try_send(from, to, input).await.map_err(|e| classify(&e))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, EndpointError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| classify(&eyre::Report::new(e)))
    }

    async fn storage_at(
        &self,
        address: Address,
        slot: B256,
    ) -> Result<B256, EndpointError> {
        self.provider
            .get_storage_at(address, slot.into())
            .await
            .map(B256::from)
            .map_err(|e| classify(&eyre::Report::new(e)))
    }
}
