//! alloy-backed [`ChainClient`] talking HTTP JSON-RPC to an EVM node.

use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, TxHash};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
    SimpleNonceManager, WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::{ChainClient, ChainConnector, ChainError, ContractCall, TokenDomain};
use crate::exact::facilitator::IEIP3009;
use crate::networks::NetworkDescriptor;

/// Combined filler type for gas, blob gas, nonce, and chain ID.
///
/// Nonces are fetched from the node's pending state for every transaction;
/// submissions are serialized by [`SignerContext`](super::SignerContext), so no
/// local nonce cache is kept.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<SimpleNonceManager>, ChainIdFiller>>,
>;

/// The fully composed provider: fillers, wallet signing, and a [`RootProvider`].
pub type InnerProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// [`ChainClient`] over a single HTTP endpoint, signing with the facilitator key.
#[derive(Debug)]
pub struct AlloyChainClient {
    network: String,
    signer_address: Address,
    inner: InnerProvider,
}

impl AlloyChainClient {
    /// Network this client is bound to.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The underlying alloy provider.
    #[must_use]
    pub const fn inner(&self) -> &InnerProvider {
        &self.inner
    }

    fn request(&self, call: &ContractCall) -> TransactionRequest {
        let txr = TransactionRequest::default()
            .with_from(self.signer_address)
            .with_to(call.to)
            .with_input(call.calldata.clone());
        match call.gas_limit {
            Some(gas_limit) => txr.with_gas_limit(gas_limit),
            None => txr,
        }
    }
}

impl ChainClient for AlloyChainClient {
    async fn authorization_state(
        &self,
        token: Address,
        authorizer: Address,
        nonce: B256,
    ) -> Result<bool, ChainError> {
        let contract = IEIP3009::new(token, &self.inner);
        let used = contract.authorizationState(authorizer, nonce).call().await?;
        Ok(used)
    }

    async fn token_domain(&self, token: Address) -> Result<TokenDomain, ChainError> {
        let contract = IEIP3009::new(token, &self.inner);
        let name = contract.name().call().await?;
        let version = contract.version().call().await?;
        Ok(TokenDomain { name, version })
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64, ChainError> {
        let gas = self.inner.estimate_gas(self.request(call)).await?;
        Ok(gas)
    }

    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        network = %self.network,
        to = %call.to,
    )))]
    async fn send_transaction(&self, call: ContractCall) -> Result<TxHash, ChainError> {
        let pending = self.inner.send_transaction(self.request(&call)).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<bool>, ChainError> {
        let receipt = self.inner.get_transaction_receipt(hash).await?;
        Ok(receipt.map(|r| ReceiptResponse::status(&r)))
    }
}

/// Connects [`AlloyChainClient`]s over HTTP(S).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlloyConnector;

impl ChainConnector for AlloyConnector {
    type Client = AlloyChainClient;

    fn connect(
        &self,
        network: &NetworkDescriptor,
        signer: &PrivateKeySigner,
    ) -> Result<Self::Client, ChainError> {
        let url = &network.rpc_url;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChainError::InvalidEndpoint(format!(
                "{url}: only http(s) endpoints are supported"
            )));
        }
        let is_local = url
            .host_str()
            .is_some_and(|host| matches!(host, "localhost" | "127.0.0.1" | "::1"));
        let client = RpcClient::new(Http::new(url.clone()), is_local);

        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(SimpleNonceManager::default()),
                    ChainIdFiller::new(Some(network.chain_id)),
                ),
            ),
        );
        let signer_address = signer.address();
        let inner: InnerProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_client(client);

        #[cfg(feature = "telemetry")]
        tracing::info!(
            network = %network.name,
            chain_id = network.chain_id,
            rpc_url = %url,
            signer = %signer_address,
            "Using EVM provider"
        );

        Ok(AlloyChainClient {
            network: network.name.clone(),
            signer_address,
            inner,
        })
    }
}
