//! Reason codes for rejected verifications and failed settlements.
//!
//! Every failure the facilitator reports is one of the [`ErrorReason`]
//! variants. The codes are stable, machine-readable, and serialized in
//! `snake_case` so that the HTTP boundary can forward them verbatim and map
//! them to a status code without re-deriving intent.

use serde::{Deserialize, Serialize};

/// Machine-readable reason codes for payment failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// The request carried no payment payload.
    MissingPayload,
    /// The request carried no payment requirements.
    MissingRequirements,
    /// `x402Version` is not `1`.
    UnsupportedVersion,
    /// The requirements name no scheme.
    MissingScheme,
    /// The requirements name no network.
    MissingNetwork,
    /// The network is not known to this facilitator.
    UnsupportedNetwork,
    /// The payload could not be decoded into an authorization.
    MalformedPayload,
    /// The scheme is not implemented.
    UnsupportedScheme,
    /// The signature does not recover to the authorization's `from`.
    InvalidSignature,
    /// `validBefore` has passed.
    AuthorizationExpired,
    /// `validAfter` is still in the future.
    AuthorizationNotYetValid,
    /// The authorization nonce was already consumed on-chain.
    NonceAlreadyUsed,
    /// Amount, token or recipient differ from what the requirements demand.
    RequirementMismatch,
    /// The chain node could not be reached or timed out.
    NetworkUnavailable,
    /// The facilitator account cannot pay for gas.
    InsufficientFunds,
    /// The transfer was rejected by the node or reverted on-chain.
    SettlementFailed,
    /// An unexpected facilitator-side failure.
    InternalError,
}

impl ErrorReason {
    /// Returns the `snake_case` string representation matching the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPayload => "missing_payload",
            Self::MissingRequirements => "missing_requirements",
            Self::UnsupportedVersion => "unsupported_version",
            Self::MissingScheme => "missing_scheme",
            Self::MissingNetwork => "missing_network",
            Self::UnsupportedNetwork => "unsupported_network",
            Self::MalformedPayload => "malformed_payload",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::InvalidSignature => "invalid_signature",
            Self::AuthorizationExpired => "authorization_expired",
            Self::AuthorizationNotYetValid => "authorization_not_yet_valid",
            Self::NonceAlreadyUsed => "nonce_already_used",
            Self::RequirementMismatch => "requirement_mismatch",
            Self::NetworkUnavailable => "network_unavailable",
            Self::InsufficientFunds => "insufficient_funds",
            Self::SettlementFailed => "settlement_failed",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether the failure is caused by the caller's input.
    ///
    /// Resubmitting the same payload will fail the same way (or, for the time
    /// window, until the window opens).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::NetworkUnavailable
                | Self::InsufficientFunds
                | Self::SettlementFailed
                | Self::InternalError
        )
    }

    /// Whether the failure is on the facilitator side and may clear on its own.
    ///
    /// Callers should check the authorization's on-chain state before
    /// resubmitting a settlement.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable | Self::InsufficientFunds | Self::InternalError
        )
    }
}

impl core::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
