//! The facilitator's signing key and its cached chain connection.

use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::{Address, B256, hex};
use alloy_signer_local::PrivateKeySigner;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use super::{ChainConnector, ChainError};
use crate::networks::NetworkDescriptor;

/// Errors from loading the key or connecting with it.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The key is not `0x` followed by 64 hex characters.
    #[error("private key must be 0x followed by 64 hex characters")]
    MalformedKey,
    /// The key is not a valid secp256k1 scalar.
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    /// A client could not be built for the network.
    #[error("failed to connect to {network}: {source}")]
    Connect {
        /// Network identifier.
        network: String,
        /// Underlying failure.
        source: ChainError,
    },
}

struct CachedConnection<T> {
    network: NetworkDescriptor,
    client: Arc<T>,
}

/// Owns the facilitator key for the lifetime of the process.
///
/// Hands out chain clients bound to a network. The most recently used
/// connection is cached; asking for the same network again reuses it, asking
/// for a different one replaces it.
///
/// Also serializes transaction submission from the facilitator account via
/// [`SignerContext::submission`], so at most one broadcast is in flight and
/// account nonces cannot collide.
pub struct SignerContext<C: ChainConnector> {
    signer: PrivateKeySigner,
    connector: C,
    cached: Mutex<Option<CachedConnection<C::Client>>>,
    submission: AsyncMutex<()>,
}

impl<C: ChainConnector> std::fmt::Debug for SignerContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerContext")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl<C: ChainConnector> SignerContext<C> {
    /// Wraps an already parsed signer.
    pub fn new(signer: PrivateKeySigner, connector: C) -> Self {
        Self {
            signer,
            connector,
            cached: Mutex::new(None),
            submission: AsyncMutex::new(()),
        }
    }

    /// Parses a `0x`-prefixed, 64-hex-character private key.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::MalformedKey`] for the wrong shape and
    /// [`SignerError::InvalidKey`] for a scalar outside the curve order.
    pub fn from_hex_key(key: &str, connector: C) -> Result<Self, SignerError> {
        let digits = key.strip_prefix("0x").ok_or(SignerError::MalformedKey)?;
        if digits.len() != 64 {
            return Err(SignerError::MalformedKey);
        }
        let bytes: B256 = hex::decode_to_array::<_, 32>(digits)
            .map(B256::from)
            .map_err(|_| SignerError::MalformedKey)?;
        let signer = PrivateKeySigner::from_bytes(&bytes)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signer, connector))
    }

    /// The facilitator's public address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Returns a client for `network`, reconnecting only if the cached one
    /// belongs to a different network.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Connect`] if the connector rejects the endpoint.
    pub fn signer_for(&self, network: &NetworkDescriptor) -> Result<Arc<C::Client>, SignerError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = cached.as_ref().filter(|c| &c.network == network) {
            return Ok(Arc::clone(&conn.client));
        }
        let client = self
            .connector
            .connect(network, &self.signer)
            .map(Arc::new)
            .map_err(|source| SignerError::Connect {
                network: network.name.clone(),
                source,
            })?;
        #[cfg(feature = "telemetry")]
        tracing::info!(network = %network.name, chain_id = network.chain_id, "Connected signer");
        *cached = Some(CachedConnection {
            network: network.clone(),
            client: Arc::clone(&client),
        });
        Ok(client)
    }

    /// Acquires the per-account submission slot.
    ///
    /// Hold the guard across "reserve nonce, sign, broadcast" and drop it once
    /// the node has accepted (or rejected) the transaction.
    pub async fn submission(&self) -> MutexGuard<'_, ()> {
        self.submission.lock().await
    }
}
