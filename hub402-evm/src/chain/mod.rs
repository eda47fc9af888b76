//! Chain access for verification and settlement.
//!
//! The verifier and settler never talk to a JSON-RPC client directly. They go
//! through [`ChainClient`], which exposes exactly the reads and writes the
//! exact scheme needs, and obtain clients through a [`ChainConnector`]. The
//! production implementation lives in [`provider`]; tests substitute an
//! in-memory chain.
//!
//! # Submodules
//!
//! - [`provider`] - alloy-backed [`ChainClient`] over HTTP JSON-RPC
//! - [`signer`] - [`SignerContext`], the facilitator key and its cached connection

use std::future::Future;
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, TxHash};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;

use crate::networks::NetworkDescriptor;

pub mod provider;
pub mod signer;

pub use provider::{AlloyChainClient, AlloyConnector};
pub use signer::{SignerContext, SignerError};

/// Failure of a chain read or write, classified by node error category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The call did not complete within its bound.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),
    /// The node could not be reached or replied with garbage.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with an error (revert, invalid call, rejected tx).
    #[error("rejected by node: {0}")]
    Rejected(String),
    /// The facilitator account cannot cover gas.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// The facilitator's own transaction nonce collided.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
    /// The endpoint could not be used to build a client.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ChainError {
    /// Whether the node was never reached or never answered.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::InvalidEndpoint(_)
        )
    }
}

const INSUFFICIENT_FUNDS_MARKERS: &[&str] = &["insufficient funds", "insufficient balance"];
const NONCE_CONFLICT_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "already known",
    "replacement transaction underpriced",
];

impl From<TransportError> for ChainError {
    fn from(e: TransportError) -> Self {
        let Some(payload) = e.as_error_resp() else {
            return Self::Transport(e.to_string());
        };
        let message = payload.message.to_string();
        let lower = message.to_lowercase();
        if INSUFFICIENT_FUNDS_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::InsufficientFunds(message)
        } else if NONCE_CONFLICT_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::NonceConflict(message)
        } else {
            Self::Rejected(message)
        }
    }
}

impl From<alloy_contract::Error> for ChainError {
    fn from(e: alloy_contract::Error) -> Self {
        match e {
            alloy_contract::Error::TransportError(e) => e.into(),
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// An unsigned contract call submitted from the facilitator account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub calldata: Bytes,
    /// Gas limit; estimated by the node when `None`.
    pub gas_limit: Option<u64>,
}

/// EIP-712 `name` and `version` as reported by a token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDomain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
}

/// Read and write access to one EVM network, acting as the facilitator account.
pub trait ChainClient: Send + Sync {
    /// Whether `nonce` was already consumed for `authorizer` on `token`.
    ///
    /// Reads ERC-3009 `authorizationState`.
    fn authorization_state(
        &self,
        token: Address,
        authorizer: Address,
        nonce: B256,
    ) -> impl Future<Output = Result<bool, ChainError>> + Send;

    /// Reads the token's EIP-712 domain name and version.
    fn token_domain(
        &self,
        token: Address,
    ) -> impl Future<Output = Result<TokenDomain, ChainError>> + Send;

    /// Estimates gas for `call` sent from the facilitator account.
    fn estimate_gas(
        &self,
        call: &ContractCall,
    ) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Signs and broadcasts `call`, returning once the node accepted it.
    fn send_transaction(
        &self,
        call: ContractCall,
    ) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Looks up a receipt; `Some(status)` once mined, `None` while pending.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<bool>, ChainError>> + Send;
}

/// Builds a [`ChainClient`] for a network, signing with the given key.
pub trait ChainConnector: Send + Sync {
    /// The client type produced.
    type Client: ChainClient + 'static;

    /// Connects to `network`. Must not block on I/O.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidEndpoint`] if a client cannot be built for the endpoint.
    fn connect(
        &self,
        network: &NetworkDescriptor,
        signer: &PrivateKeySigner,
    ) -> Result<Self::Client, ChainError>;
}

/// Bounds on suspending chain operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on each read, estimate, and broadcast.
    pub rpc: Duration,
    /// Bound on waiting for a broadcast transaction to be mined.
    pub confirmation: Duration,
    /// Delay between receipt lookups while waiting.
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rpc: Duration::from_secs(10),
            confirmation: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Awaits `fut`, failing with [`ChainError::Timeout`] after `limit`.
///
/// # Errors
///
/// Returns the future's own error, or [`ChainError::Timeout`].
pub async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChainError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::{ErrorPayload, RpcError};
    use alloy_transport::TransportErrorKind;

    fn node_error(message: &'static str) -> TransportError {
        RpcError::ErrorResp(ErrorPayload {
            code: -32000,
            message: message.into(),
            data: None,
        })
    }

    #[test]
    fn node_errors_are_classified() {
        assert!(matches!(
            ChainError::from(node_error("insufficient funds for gas * price + value")),
            ChainError::InsufficientFunds(_)
        ));
        assert!(matches!(
            ChainError::from(node_error("nonce too low")),
            ChainError::NonceConflict(_)
        ));
        assert!(matches!(
            ChainError::from(node_error("execution reverted")),
            ChainError::Rejected(_)
        ));
    }

    #[test]
    fn transport_failures_are_unavailable() {
        let err: ChainError = TransportErrorKind::custom_str("connection refused").into();
        assert!(err.is_unavailable());
        assert!(ChainError::Timeout(Duration::from_secs(1)).is_unavailable());
        assert!(!ChainError::Rejected("x".into()).is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out() {
        let never = std::future::pending::<Result<(), ChainError>>();
        let err = bounded(Duration::from_secs(2), never).await.unwrap_err();
        assert_eq!(err, ChainError::Timeout(Duration::from_secs(2)));
    }
}
