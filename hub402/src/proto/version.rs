//! The x402 protocol version this facilitator speaks.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker for x402 version 1, encoded as the bare integer `1`.
///
/// Only outbound messages use it. Inbound requirements keep `x402Version` as
/// a plain integer so a different version becomes `unsupported_version`
/// rather than a JSON error.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

impl X402Version1 {
    /// Numeric value on the wire.
    pub const VALUE: u8 = 1;

    /// Whether `version` names this protocol version.
    #[must_use]
    pub fn matches(version: u64) -> bool {
        version == u64::from(Self::VALUE)
    }
}

/// Shorthand for building version 1 messages.
pub const V1: X402Version1 = X402Version1;

impl From<X402Version1> for u64 {
    fn from(_: X402Version1) -> Self {
        X402Version1::VALUE.into()
    }
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u64::deserialize(deserializer)? {
            v if Self::matches(v) => Ok(Self),
            v => Err(serde::de::Error::custom(format!(
                "unsupported x402 version {v}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_one() {
        assert_eq!(serde_json::to_string(&V1).unwrap(), "1");
        assert!(serde_json::from_str::<X402Version1>("1").is_ok());
        assert!(serde_json::from_str::<X402Version1>("2").is_err());
    }

    #[test]
    fn matches_only_one() {
        assert!(X402Version1::matches(1));
        assert!(!X402Version1::matches(0));
        assert!(!X402Version1::matches(257));
    }
}
