//! Wire format of the exact-scheme payment payload.
//!
//! The payload is `0x` followed by the hex encoding of ten 32-byte big-endian
//! words, which is the ABI encoding of the static tuple
//! `(address token, address from, address to, uint256 value,
//! uint256 validAfter, uint256 validBefore, bytes32 nonce, uint8 v,
//! bytes32 r, bytes32 s)`.

use alloy_primitives::{Address, B256, U256, hex};
use alloy_sol_types::sol;
use hub402::proto::{AuthorizationSummary, TokenAmount};
use hub402::timestamp::UnixTimestamp;

/// ABI word size in bytes.
const WORD: usize = 32;

/// Number of ABI words in an exact-scheme payload.
pub const PAYLOAD_WORDS: usize = 10;

/// Exact byte length of a decoded exact-scheme payload.
pub const PAYLOAD_LEN: usize = WORD * PAYLOAD_WORDS;

sol!(
    /// ERC-3009 `TransferWithAuthorization` typed-data struct.
    ///
    /// Signed by the payer under the token's EIP-712 domain; rebuilt by the
    /// verifier to recover the signer.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Split secp256k1 signature as carried in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationSignature {
    /// Recovery id, either `0`/`1` or `27`/`28`.
    pub v: u8,
    /// `r` component.
    pub r: B256,
    /// `s` component.
    pub s: B256,
}

/// A decoded ERC-3009 transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Token contract the authorization is for.
    pub token: Address,
    /// Payer.
    pub from: Address,
    /// Payee.
    pub to: Address,
    /// Amount in the token's smallest unit.
    pub value: U256,
    /// Earliest valid time (inclusive).
    pub valid_after: UnixTimestamp,
    /// Expiry (exclusive).
    pub valid_before: UnixTimestamp,
    /// Single-use authorization nonce.
    pub nonce: B256,
    /// Payer's signature over the typed data.
    pub signature: AuthorizationSignature,
}

/// Reasons a payload cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Nothing to decode.
    #[error("payload is empty")]
    Empty,
    /// The payload does not start with `0x`.
    #[error("payload must be 0x-prefixed hex")]
    MissingPrefix,
    /// The payload is not hex.
    #[error("payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// The payload is not exactly [`PAYLOAD_LEN`] bytes.
    #[error("payload must be {PAYLOAD_LEN} bytes, got {0}")]
    InvalidLength(usize),
    /// A word does not fit the type of its field.
    #[error("`{0}` is out of range for its type")]
    OutOfRange(&'static str),
}

fn address_word(word: &[u8], field: &'static str) -> Result<Address, CodecError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(CodecError::OutOfRange(field));
    }
    Ok(Address::from_slice(&word[12..]))
}

fn u64_word(word: &[u8], field: &'static str) -> Result<u64, CodecError> {
    u64::try_from(U256::from_be_slice(word)).map_err(|_| CodecError::OutOfRange(field))
}

fn u8_word(word: &[u8], field: &'static str) -> Result<u8, CodecError> {
    u8::try_from(U256::from_be_slice(word)).map_err(|_| CodecError::OutOfRange(field))
}

impl Authorization {
    /// Decodes a hex payload.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the payload is empty, not `0x`-prefixed
    /// hex, not exactly [`PAYLOAD_LEN`] bytes, or a word overflows its field.
    pub fn decode(payload: &str) -> Result<Self, CodecError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(CodecError::Empty);
        }
        let digits = payload
            .strip_prefix("0x")
            .ok_or(CodecError::MissingPrefix)?;
        // `hex::decode` would strip a second prefix on its own.
        if digits.starts_with("0x") {
            return Err(CodecError::InvalidHex(hex::FromHexError::InvalidHexCharacter {
                c: 'x',
                index: 1,
            }));
        }
        let bytes = hex::decode(digits)?;
        if bytes.len() != PAYLOAD_LEN {
            return Err(CodecError::InvalidLength(bytes.len()));
        }
        let w: Vec<&[u8]> = bytes.chunks_exact(WORD).collect();

        Ok(Self {
            token: address_word(w[0], "token")?,
            from: address_word(w[1], "from")?,
            to: address_word(w[2], "to")?,
            value: U256::from_be_slice(w[3]),
            valid_after: UnixTimestamp::from_secs(u64_word(w[4], "validAfter")?),
            valid_before: UnixTimestamp::from_secs(u64_word(w[5], "validBefore")?),
            nonce: B256::from_slice(w[6]),
            signature: AuthorizationSignature {
                v: u8_word(w[7], "v")?,
                r: B256::from_slice(w[8]),
                s: B256::from_slice(w[9]),
            },
        })
    }

    /// Encodes into the `0x`-prefixed hex payload accepted by [`Authorization::decode`].
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.extend_from_slice(self.token.into_word().as_slice());
        out.extend_from_slice(self.from.into_word().as_slice());
        out.extend_from_slice(self.to.into_word().as_slice());
        out.extend_from_slice(&self.value.to_be_bytes::<WORD>());
        out.extend_from_slice(&U256::from(self.valid_after.as_secs()).to_be_bytes::<WORD>());
        out.extend_from_slice(&U256::from(self.valid_before.as_secs()).to_be_bytes::<WORD>());
        out.extend_from_slice(self.nonce.as_slice());
        out.extend_from_slice(&U256::from(self.signature.v).to_be_bytes::<WORD>());
        out.extend_from_slice(self.signature.r.as_slice());
        out.extend_from_slice(self.signature.s.as_slice());
        hex::encode_prefixed(out)
    }

    /// The EIP-712 message this authorization's signature covers.
    #[must_use]
    pub fn typed_data(&self) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }

    /// Public facts reported back on successful verification.
    #[must_use]
    pub fn summary(&self) -> AuthorizationSummary {
        AuthorizationSummary {
            amount: TokenAmount(self.value),
            token: self.token,
            from: self.from,
            to: self.to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn sample() -> Authorization {
        Authorization {
            token: address!("0x1111111111111111111111111111111111111111"),
            from: address!("0x2222222222222222222222222222222222222222"),
            to: address!("0x3333333333333333333333333333333333333333"),
            value: U256::from(1_000_000u64),
            valid_after: UnixTimestamp::from_secs(100),
            valid_before: UnixTimestamp::from_secs(200),
            nonce: B256::repeat_byte(0xab),
            signature: AuthorizationSignature {
                v: 27,
                r: B256::repeat_byte(0x01),
                s: B256::repeat_byte(0x02),
            },
        }
    }

    #[test]
    fn decodes_what_it_encodes() {
        let auth = sample();
        let encoded = auth.encode();
        assert_eq!(encoded.len(), 2 + PAYLOAD_LEN * 2);
        assert_eq!(Authorization::decode(&encoded).unwrap(), auth);
    }

    #[test]
    fn word_layout_is_abi_static_tuple() {
        let encoded = sample().encode();
        let bytes = hex::decode(&encoded[2..]).unwrap();
        assert_eq!(&bytes[..12], &[0u8; 12]);
        assert_eq!(&bytes[12..32], &[0x11; 20]);
        assert_eq!(bytes[7 * 32 + 31], 27);
    }

    #[test]
    fn rejects_bad_framing() {
        assert!(matches!(Authorization::decode(""), Err(CodecError::Empty)));
        assert!(matches!(
            Authorization::decode("deadbeef"),
            Err(CodecError::MissingPrefix)
        ));
        assert!(matches!(
            Authorization::decode("0xzz"),
            Err(CodecError::InvalidHex(_))
        ));
        let doubled = format!("0x{}", sample().encode());
        assert!(matches!(
            Authorization::decode(&doubled),
            Err(CodecError::InvalidHex(_))
        ));
        assert!(matches!(
            Authorization::decode("0xdeadbeef"),
            Err(CodecError::InvalidLength(4))
        ));
        let long = format!("{}00", sample().encode());
        assert!(matches!(
            Authorization::decode(&long),
            Err(CodecError::InvalidLength(321))
        ));
    }

    #[test]
    fn rejects_dirty_address_padding() {
        let mut bytes = hex::decode(&sample().encode()[2..]).unwrap();
        bytes[32] = 1;
        let payload = hex::encode_prefixed(bytes);
        assert!(matches!(
            Authorization::decode(&payload),
            Err(CodecError::OutOfRange("from"))
        ));
    }

    #[test]
    fn rejects_oversized_fields() {
        let mut bytes = hex::decode(&sample().encode()[2..]).unwrap();
        bytes[5 * 32] = 1;
        assert!(matches!(
            Authorization::decode(&hex::encode_prefixed(&bytes)),
            Err(CodecError::OutOfRange("validBefore"))
        ));

        let mut bytes = hex::decode(&sample().encode()[2..]).unwrap();
        bytes[7 * 32 + 30] = 1;
        assert!(matches!(
            Authorization::decode(&hex::encode_prefixed(&bytes)),
            Err(CodecError::OutOfRange("v"))
        ));
    }

    #[test]
    fn summary_reports_transfer_facts() {
        let summary = sample().summary();
        assert_eq!(summary.amount, TokenAmount::from(1_000_000));
        assert_eq!(summary.to, sample().to);
    }
}
