//! EIP-712 signer recovery for ERC-3009 authorizations.

use alloy_primitives::{Address, B256, Signature, U256};
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain};

use crate::exact::Authorization;

/// Half the secp256k1 group order; canonical (EIP-2) signatures have `s <= N/2`.
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xDFE9_2F46_681B_20A0,
    0x5D57_6E73_57A4_501D,
    0xFFFF_FFFF_FFFF_FFFF,
    0x7FFF_FFFF_FFFF_FFFF,
]);

/// Reasons a signature cannot be attributed to the authorization's payer.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// `v` is not one of `0`, `1`, `27`, `28`.
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    /// `s` is in the upper half of the curve order.
    #[error("non-canonical high-s signature")]
    HighS,
    /// No public key recovers from the signature.
    #[error(transparent)]
    Recovery(#[from] alloy_primitives::SignatureError),
    /// A key recovers, but it is not the payer's.
    #[error("signature recovers to {recovered}, expected {expected}")]
    SignerMismatch {
        /// Address the signature recovers to.
        recovered: Address,
        /// The authorization's `from`.
        expected: Address,
    },
}

/// Builds the token's EIP-712 domain on `chain_id`.
#[must_use]
pub fn token_domain(name: String, version: String, chain_id: u64, token: Address) -> Eip712Domain {
    eip712_domain! {
        name: name,
        version: version,
        chain_id: chain_id,
        verifying_contract: token,
    }
}

/// Digest the payer signed.
#[must_use]
pub fn signing_hash(authorization: &Authorization, domain: &Eip712Domain) -> B256 {
    authorization.typed_data().eip712_signing_hash(domain)
}

fn y_parity(v: u8) -> Result<bool, SignatureError> {
    match v {
        0 | 27 => Ok(false),
        1 | 28 => Ok(true),
        other => Err(SignatureError::InvalidRecoveryId(other)),
    }
}

/// Recovers the signer of `authorization` under `domain` and checks it is `from`.
///
/// # Errors
///
/// Returns a [`SignatureError`] if the signature is malformed, non-canonical,
/// or recovers to any address other than `from`.
pub fn verify_signer(
    authorization: &Authorization,
    domain: &Eip712Domain,
) -> Result<(), SignatureError> {
    let sig = &authorization.signature;
    let parity = y_parity(sig.v)?;
    let s = U256::from_be_bytes(sig.s.0);
    if s > SECP256K1_N_DIV_2 {
        return Err(SignatureError::HighS);
    }
    let signature = Signature::new(U256::from_be_bytes(sig.r.0), s, parity);
    let recovered = signature.recover_address_from_prehash(&signing_hash(authorization, domain))?;
    if recovered == authorization.from {
        Ok(())
    } else {
        Err(SignatureError::SignerMismatch {
            recovered,
            expected: authorization.from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::AuthorizationSignature;
    use alloy_primitives::address;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use hub402::timestamp::UnixTimestamp;

    const TOKEN: Address = address!("0x1111111111111111111111111111111111111111");

    fn signed(signer: &PrivateKeySigner, domain: &Eip712Domain) -> Authorization {
        let mut auth = Authorization {
            token: TOKEN,
            from: signer.address(),
            to: address!("0x3333333333333333333333333333333333333333"),
            value: U256::from(10u64),
            valid_after: UnixTimestamp::from_secs(0),
            valid_before: UnixTimestamp::from_secs(u64::MAX),
            nonce: B256::repeat_byte(7),
            signature: AuthorizationSignature {
                v: 0,
                r: B256::ZERO,
                s: B256::ZERO,
            },
        };
        let sig = signer.sign_hash_sync(&signing_hash(&auth, domain)).unwrap();
        auth.signature = AuthorizationSignature {
            v: 27 + u8::from(sig.v()),
            r: sig.r().into(),
            s: sig.s().into(),
        };
        auth
    }

    fn domain() -> Eip712Domain {
        token_domain("USD Coin".into(), "2".into(), 420_420_422, TOKEN)
    }

    #[test]
    fn half_order_constant_is_n_shifted() {
        let n = U256::from_be_bytes(alloy_primitives::hex!(
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141"
        ));
        assert_eq!(SECP256K1_N_DIV_2, n >> 1);
    }

    #[test]
    fn accepts_both_recovery_id_conventions() {
        let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
        let mut auth = signed(&signer, &domain());
        assert!(verify_signer(&auth, &domain()).is_ok());
        auth.signature.v -= 27;
        assert!(verify_signer(&auth, &domain()).is_ok());
    }

    #[test]
    fn wrong_domain_recovers_someone_else() {
        let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
        let auth = signed(&signer, &domain());
        let other_chain = token_domain("USD Coin".into(), "2".into(), 1, TOKEN);
        assert!(matches!(
            verify_signer(&auth, &other_chain),
            Err(SignatureError::SignerMismatch { .. } | SignatureError::Recovery(_))
        ));
    }

    #[test]
    fn rejects_invalid_v_and_high_s() {
        let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
        let mut auth = signed(&signer, &domain());
        auth.signature.v = 29;
        assert!(matches!(
            verify_signer(&auth, &domain()),
            Err(SignatureError::InvalidRecoveryId(29))
        ));

        let mut auth = signed(&signer, &domain());
        let s = U256::from_be_bytes(auth.signature.s.0);
        let n = SECP256K1_N_DIV_2 * U256::from(2u8) + U256::from(1u8);
        auth.signature.s = B256::from(n - s);
        assert!(matches!(
            verify_signer(&auth, &domain()),
            Err(SignatureError::HighS)
        ));
    }
}
