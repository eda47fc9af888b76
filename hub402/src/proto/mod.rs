//! Protocol types for x402 facilitator messages.
//!
//! This module defines the wire format exchanged between a resource server
//! (or its client) and the facilitator. All types serialize to JSON using
//! camelCase field names.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - What the resource server demands
//! - [`PaymentExtra`] - The closed set of recognised `extra` keys
//! - [`PaymentRequest`] - Inbound `{payload, details}` body for verify and settle
//! - [`VerificationOutcome`] / [`SettlementOutcome`] - Per-call results
//! - [`SupportedKind`] - One advertised `(version, scheme, network)` combination
//! - [`ErrorReason`] - Machine-readable failure codes

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use url::Url;

pub mod error;
pub mod version;

pub use error::ErrorReason;
pub use version::{V1, X402Version1};

/// Reads a JSON string, treating `null` and every other JSON type as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

fn version_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_u64().unwrap_or_default())
}

/// Reads `details` only when it is a JSON object that parses as requirements.
fn lenient_requirements<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<PaymentRequirements>, D::Error> {
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(PaymentRequirements::deserialize(value).ok()),
        _ => Ok(None),
    }
}

/// The only payment scheme this facilitator implements.
pub const EXACT_SCHEME: &str = "exact";

/// A token amount in the token's smallest unit.
///
/// Serialized as a decimal string so that values beyond 2^53 survive
/// `JavaScript` JSON parsers. Deserialization also accepts a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(pub U256);

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

/// Error returned when a token amount is not a non-negative decimal integer.
#[derive(Debug, thiserror::Error)]
#[error("invalid token amount {0:?}: expected a non-negative decimal integer")]
pub struct TokenAmountFormatError(String);

impl FromStr for TokenAmount {
    type Err = TokenAmountFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenAmountFormatError(s.to_owned()));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| TokenAmountFormatError(s.to_owned()))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or a non-negative integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(TokenAmount::from(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Native currency of an EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name (e.g., `PAS`).
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal places of the smallest unit.
    pub decimals: u8,
}

/// Recognised keys of the `extra` object in [`PaymentRequirements`].
///
/// Every field is optional. Unknown keys are ignored here; rejecting them is
/// a decision for the boundary layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentExtra {
    /// Exact amount the authorization must transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<TokenAmount>,
    /// Token contract the authorization must target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    /// Recipient the authorization must pay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<Address>,
    /// EIP-712 domain name of the token, if known to the requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// EIP-712 domain version of the token, if known to the requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Chain id of an advertised custom chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// RPC endpoint of an advertised custom chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Native currency of an advertised custom chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_currency: Option<NativeCurrency>,
}

impl PaymentExtra {
    /// Returns the EIP-712 `(name, version)` pair when both are supplied.
    #[must_use]
    pub fn eip712_domain(&self) -> Option<(&str, &str)> {
        match (&self.name, &self.version) {
            (Some(name), Some(version)) => Some((name, version)),
            _ => None,
        }
    }
}

/// Payment terms supplied by the caller.
///
/// Fields default to empty when absent, `null` or of the wrong JSON type, so
/// that a missing scheme or network surfaces as a verification outcome
/// rather than a JSON error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Protocol version; only `1` is accepted.
    #[serde(default, deserialize_with = "version_or_zero")]
    pub x402_version: u64,
    /// Payment scheme (e.g., `"exact"`).
    #[serde(default, deserialize_with = "string_or_empty")]
    pub scheme: String,
    /// Network identifier (e.g., `"polkadot-hub-testnet"`).
    #[serde(default, deserialize_with = "string_or_empty")]
    pub network: String,
    /// Optional constraints and hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<PaymentExtra>,
}

impl PaymentRequirements {
    /// Requirements for the `exact` scheme on `network` with no constraints.
    #[must_use]
    pub fn exact(network: impl Into<String>) -> Self {
        Self {
            x402_version: u64::from(X402Version1::VALUE),
            scheme: EXACT_SCHEME.to_owned(),
            network: network.into(),
            extra: None,
        }
    }

    /// Attaches `extra` constraints.
    #[must_use]
    pub fn with_extra(mut self, extra: PaymentExtra) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Inbound body of `/verify` and `/settle`.
///
/// A `payload` that is not a string, or `details` that is not a requirements
/// object, reads as absent and is reported by [`PaymentRequest::into_parts`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Hex-encoded payment payload.
    #[serde(default, deserialize_with = "lenient_string")]
    pub payload: Option<String>,
    /// Payment requirements.
    #[serde(default, deserialize_with = "lenient_requirements")]
    pub details: Option<PaymentRequirements>,
}

impl PaymentRequest {
    /// Splits the request into its payload and requirements.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorReason::MissingPayload`] when the payload is absent or
    /// blank, and [`ErrorReason::MissingRequirements`] when `details` is absent.
    pub fn into_parts(self) -> Result<(String, PaymentRequirements), ErrorReason> {
        let payload = self
            .payload
            .filter(|p| !p.trim().is_empty())
            .ok_or(ErrorReason::MissingPayload)?;
        let details = self.details.ok_or(ErrorReason::MissingRequirements)?;
        Ok((payload, details))
    }
}

/// Decoded facts about a verified authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSummary {
    /// Amount transferred.
    pub amount: TokenAmount,
    /// Token contract.
    pub token: Address,
    /// Payer.
    pub from: Address,
    /// Payee.
    pub to: Address,
}

/// Result of a verify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Whether the authorization passed every check.
    pub valid: bool,
    /// Reason for rejection.
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorReason>,
    /// Decoded authorization facts, present when valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AuthorizationSummary>,
}

impl VerificationOutcome {
    /// A successful verification.
    #[must_use]
    pub const fn valid(details: AuthorizationSummary) -> Self {
        Self {
            valid: true,
            reason: None,
            details: Some(details),
        }
    }

    /// A rejected verification.
    #[must_use]
    pub const fn invalid(reason: ErrorReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            details: None,
        }
    }
}

/// Result of a settle call.
///
/// `pending` marks a transaction that was broadcast but whose inclusion could
/// not be confirmed in time. It is not a failure: the hash is always present
/// and the transfer may still land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    /// Whether the transfer was mined and did not revert.
    pub success: bool,
    /// Hash of the broadcast transaction, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// Reason for failure.
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorReason>,
    /// Broadcast but unconfirmed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl SettlementOutcome {
    /// A mined, non-reverted transfer.
    #[must_use]
    pub const fn settled(transaction_hash: B256) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash),
            reason: None,
            pending: false,
        }
    }

    /// A failure before anything was broadcast.
    #[must_use]
    pub const fn failed(reason: ErrorReason) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            reason: Some(reason),
            pending: false,
        }
    }

    /// A broadcast transaction that was rejected on-chain.
    #[must_use]
    pub const fn reverted(transaction_hash: B256) -> Self {
        Self {
            success: false,
            transaction_hash: Some(transaction_hash),
            reason: Some(ErrorReason::SettlementFailed),
            pending: false,
        }
    }

    /// A broadcast transaction whose confirmation is unresolved.
    #[must_use]
    pub const fn pending(transaction_hash: B256) -> Self {
        Self {
            success: false,
            transaction_hash: Some(transaction_hash),
            reason: Some(ErrorReason::NetworkUnavailable),
            pending: true,
        }
    }
}

/// One payment configuration the facilitator can verify and settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Payment scheme.
    pub scheme: String,
    /// Network identifier.
    pub network: String,
    /// Network-specific data; `{}` for built-in networks.
    pub extra: PaymentExtra,
}

impl SupportedKind {
    /// The `exact` scheme on `network`.
    #[must_use]
    pub fn exact(network: impl Into<String>, extra: PaymentExtra) -> Self {
        Self {
            x402_version: V1,
            scheme: EXACT_SCHEME.to_owned(),
            network: network.into(),
            extra,
        }
    }

    /// Views this kind as requirements, the shape `supportedConfigurations` reports.
    #[must_use]
    pub fn as_requirements(&self) -> PaymentRequirements {
        PaymentRequirements {
            x402_version: self.x402_version.into(),
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            extra: Some(self.extra.clone()),
        }
    }
}
