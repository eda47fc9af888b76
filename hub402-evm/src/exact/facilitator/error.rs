//! Error types for the EVM exact scheme facilitator.

use alloy_primitives::B256;
use hub402::proto::ErrorReason;
use hub402::timestamp::UnixTimestamp;

use super::signature::SignatureError;
use crate::chain::{ChainError, SignerError};
use crate::exact::CodecError;
use crate::networks::RegistryError;

/// Why a payment was rejected or could not be settled.
///
/// Carries the detail for logs; [`ExactEvmError::reason`] reduces it to the
/// wire-level [`ErrorReason`].
#[derive(Debug, thiserror::Error)]
pub enum ExactEvmError {
    /// `x402Version` is not `1`.
    #[error("unsupported x402 version {0}")]
    UnsupportedVersion(u64),
    /// No scheme in the requirements.
    #[error("requirements name no scheme")]
    MissingScheme,
    /// No network in the requirements.
    #[error("requirements name no network")]
    MissingNetwork,
    /// Network not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Scheme other than `exact`.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),
    /// Reading the token's EIP-712 domain failed.
    #[error("token domain read failed: {0}")]
    TokenRead(ChainError),
    /// Reading the token's `authorizationState` failed.
    #[error("authorization state read failed: {0}")]
    NonceRead(ChainError),
    /// Signature does not belong to the payer.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// `now >= validBefore`.
    #[error("authorization expired at {valid_before} (now {now})")]
    Expired {
        /// Expiry.
        valid_before: UnixTimestamp,
        /// Time of the check.
        now: UnixTimestamp,
    },
    /// `now < validAfter`.
    #[error("authorization not valid until {valid_after} (now {now})")]
    NotYetValid {
        /// Start of validity.
        valid_after: UnixTimestamp,
        /// Time of the check.
        now: UnixTimestamp,
    },
    /// Nonce already consumed on-chain.
    #[error("authorization nonce {0} already used")]
    NonceUsed(B256),
    /// Authorization does not match the requirements' `extra` constraints.
    #[error("{field} mismatch: required {required}, authorized {authorized}")]
    RequirementMismatch {
        /// Offending field.
        field: &'static str,
        /// Value demanded by the requirements.
        required: String,
        /// Value carried by the authorization.
        authorized: String,
    },
    /// No client could be obtained for the network.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// The node did not accept the transaction.
    #[error("broadcast failed: {0}")]
    Broadcast(ChainError),
}

impl ExactEvmError {
    /// Wire-level reason code.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::UnsupportedVersion(_) => ErrorReason::UnsupportedVersion,
            Self::MissingScheme => ErrorReason::MissingScheme,
            Self::MissingNetwork => ErrorReason::MissingNetwork,
            Self::Registry(_) => ErrorReason::UnsupportedNetwork,
            Self::Codec(_) => ErrorReason::MalformedPayload,
            Self::UnsupportedScheme(_) => ErrorReason::UnsupportedScheme,
            Self::TokenRead(e) | Self::NonceRead(e) if e.is_unavailable() => {
                ErrorReason::NetworkUnavailable
            }
            Self::TokenRead(_) | Self::Signature(_) => ErrorReason::InvalidSignature,
            Self::Expired { .. } => ErrorReason::AuthorizationExpired,
            Self::NotYetValid { .. } => ErrorReason::AuthorizationNotYetValid,
            Self::NonceRead(_) => ErrorReason::InternalError,
            Self::NonceUsed(_) => ErrorReason::NonceAlreadyUsed,
            Self::RequirementMismatch { .. } => ErrorReason::RequirementMismatch,
            Self::Signer(SignerError::Connect { .. }) => ErrorReason::NetworkUnavailable,
            Self::Signer(_) => ErrorReason::InternalError,
            Self::Broadcast(e) if e.is_unavailable() => ErrorReason::NetworkUnavailable,
            Self::Broadcast(ChainError::InsufficientFunds(_)) => ErrorReason::InsufficientFunds,
            Self::Broadcast(_) => ErrorReason::SettlementFailed,
        }
    }
}
