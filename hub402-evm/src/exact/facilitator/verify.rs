//! Payment verification for the EVM exact scheme.
//!
//! Checks run in a fixed order and stop at the first failure:
//! version, scheme and network presence, network resolution, payload
//! decoding, scheme, signature, time window, on-chain nonce state, and
//! finally the requirements' `extra` constraints.

use std::sync::Arc;

use alloy_primitives::Address;
use alloy_sol_types::Eip712Domain;
use hub402::proto::{
    EXACT_SCHEME, PaymentExtra, PaymentRequirements, TokenAmount, VerificationOutcome, X402Version1,
};
use hub402::timestamp::Clock;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::error::ExactEvmError;
use super::signature;
use crate::chain::{ChainClient, ChainConnector, SignerContext, Timeouts, bounded};
use crate::exact::Authorization;
use crate::networks::{NetworkDescriptor, NetworkRegistry};

/// Awaits a future, optionally instrumenting it with a tracing span.
macro_rules! traced {
    ($fut:expr, $span:expr) => {{
        #[cfg(feature = "telemetry")]
        {
            use tracing::Instrument;
            $fut.instrument($span).await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            $fut.await
        }
    }};
}

/// A payment that passed every verification check.
#[derive(Debug)]
pub struct VerifiedPayment<T> {
    /// The decoded authorization.
    pub authorization: Authorization,
    /// The network it settles on.
    pub network: NetworkDescriptor,
    /// Client bound to that network.
    pub client: Arc<T>,
}

/// Validates authorizations against requirements.
///
/// Performs chain reads only (token domain, authorization state).
pub struct Verifier<'a, C: ChainConnector> {
    pub(super) registry: &'a NetworkRegistry,
    pub(super) signer: &'a SignerContext<C>,
    pub(super) clock: &'a dyn Clock,
    pub(super) timeouts: Timeouts,
}

impl<C: ChainConnector> std::fmt::Debug for Verifier<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<C: ChainConnector> Verifier<'_, C> {
    /// Verifies `payload` against `requirements`.
    pub async fn verify(
        &self,
        payload: &str,
        requirements: &PaymentRequirements,
    ) -> VerificationOutcome {
        match self.check(payload, requirements).await {
            Ok(payment) => VerificationOutcome::valid(payment.authorization.summary()),
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(reason = %e.reason(), error = %e, "Payment rejected");
                VerificationOutcome::invalid(e.reason())
            }
        }
    }

    /// Runs every check, returning the verified payment or the first failure.
    ///
    /// # Errors
    ///
    /// Returns the [`ExactEvmError`] of the first failing check.
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        network = %requirements.network,
        scheme = %requirements.scheme,
    )))]
    pub async fn check(
        &self,
        payload: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedPayment<C::Client>, ExactEvmError> {
        if !X402Version1::matches(requirements.x402_version) {
            return Err(ExactEvmError::UnsupportedVersion(requirements.x402_version));
        }
        if requirements.scheme.trim().is_empty() {
            return Err(ExactEvmError::MissingScheme);
        }
        if requirements.network.trim().is_empty() {
            return Err(ExactEvmError::MissingNetwork);
        }
        let network = self.registry.resolve(&requirements.network)?;
        let authorization = Authorization::decode(payload)?;
        if requirements.scheme != EXACT_SCHEME {
            return Err(ExactEvmError::UnsupportedScheme(requirements.scheme.clone()));
        }

        let client = self.signer.signer_for(network)?;
        let domain = self
            .domain(&*client, network, &authorization, requirements.extra.as_ref())
            .await?;
        signature::verify_signer(&authorization, &domain)?;
        self.assert_time(&authorization)?;
        self.assert_unused_nonce(&*client, &authorization).await?;
        assert_requirements(&authorization, requirements.extra.as_ref())?;

        Ok(VerifiedPayment {
            authorization,
            network: network.clone(),
            client,
        })
    }

    /// Builds the token's EIP-712 domain, preferring `extra.name`/`extra.version`.
    async fn domain<T: ChainClient>(
        &self,
        client: &T,
        network: &NetworkDescriptor,
        authorization: &Authorization,
        extra: Option<&PaymentExtra>,
    ) -> Result<Eip712Domain, ExactEvmError> {
        let token = authorization.token;
        let (name, version) = match extra.and_then(PaymentExtra::eip712_domain) {
            Some((name, version)) => (name.to_owned(), version.to_owned()),
            None => {
                let read = bounded(self.timeouts.rpc, client.token_domain(token));
                let domain = traced!(
                    read,
                    tracing::info_span!(
                        "fetch_eip712_domain",
                        token = %token,
                        otel.kind = "client"
                    )
                )
                .map_err(ExactEvmError::TokenRead)?;
                (domain.name, domain.version)
            }
        };
        Ok(signature::token_domain(name, version, network.chain_id, token))
    }

    /// `validAfter <= now < validBefore`.
    fn assert_time(&self, authorization: &Authorization) -> Result<(), ExactEvmError> {
        let now = self.clock.now();
        if now >= authorization.valid_before {
            return Err(ExactEvmError::Expired {
                valid_before: authorization.valid_before,
                now,
            });
        }
        if now < authorization.valid_after {
            return Err(ExactEvmError::NotYetValid {
                valid_after: authorization.valid_after,
                now,
            });
        }
        Ok(())
    }

    async fn assert_unused_nonce<T: ChainClient>(
        &self,
        client: &T,
        authorization: &Authorization,
    ) -> Result<(), ExactEvmError> {
        let read = bounded(
            self.timeouts.rpc,
            client.authorization_state(
                authorization.token,
                authorization.from,
                authorization.nonce,
            ),
        );
        let used = traced!(
            read,
            tracing::info_span!(
                "fetch_authorization_state",
                token = %authorization.token,
                authorizer = %authorization.from,
                otel.kind = "client"
            )
        )
        .map_err(ExactEvmError::NonceRead)?;
        if used {
            Err(ExactEvmError::NonceUsed(authorization.nonce))
        } else {
            Ok(())
        }
    }
}

fn mismatch(
    field: &'static str,
    required: impl ToString,
    authorized: impl ToString,
) -> ExactEvmError {
    ExactEvmError::RequirementMismatch {
        field,
        required: required.to_string(),
        authorized: authorized.to_string(),
    }
}

fn check_address(
    field: &'static str,
    required: Option<Address>,
    authorized: Address,
) -> Result<(), ExactEvmError> {
    match required {
        Some(required) if required != authorized => Err(mismatch(field, required, authorized)),
        _ => Ok(()),
    }
}

/// Requires the authorization to match any amount, token, or payee in `extra`.
///
/// # Errors
///
/// Returns [`ExactEvmError::RequirementMismatch`] naming the first differing field.
pub fn assert_requirements(
    authorization: &Authorization,
    extra: Option<&PaymentExtra>,
) -> Result<(), ExactEvmError> {
    let Some(extra) = extra else {
        return Ok(());
    };
    match extra.amount {
        Some(amount) if amount != TokenAmount(authorization.value) => {
            return Err(mismatch("amount", amount, authorization.value));
        }
        _ => {}
    }
    check_address("token", extra.token, authorization.token)?;
    check_address("payTo", extra.pay_to, authorization.to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::AuthorizationSignature;
    use alloy_primitives::{B256, U256, address};
    use hub402::proto::ErrorReason;
    use hub402::timestamp::UnixTimestamp;

    fn authorization(value: u64) -> Authorization {
        Authorization {
            token: address!("0x1111111111111111111111111111111111111111"),
            from: address!("0x2222222222222222222222222222222222222222"),
            to: address!("0x3333333333333333333333333333333333333333"),
            value: U256::from(value),
            valid_after: UnixTimestamp::from_secs(0),
            valid_before: UnixTimestamp::from_secs(10),
            nonce: B256::ZERO,
            signature: AuthorizationSignature {
                v: 27,
                r: B256::ZERO,
                s: B256::ZERO,
            },
        }
    }

    #[test]
    fn no_extra_means_no_constraints() {
        assert!(assert_requirements(&authorization(10), None).is_ok());
        assert!(assert_requirements(&authorization(10), Some(&PaymentExtra::default())).is_ok());
    }

    #[test]
    fn amount_must_match_exactly() {
        let extra = PaymentExtra {
            amount: Some(TokenAmount::from(5)),
            ..PaymentExtra::default()
        };
        let err = assert_requirements(&authorization(10), Some(&extra)).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RequirementMismatch);
        assert!(assert_requirements(&authorization(5), Some(&extra)).is_ok());
    }

    #[test]
    fn token_and_payee_must_match() {
        let auth = authorization(10);
        let wrong_token = PaymentExtra {
            token: Some(address!("0x4444444444444444444444444444444444444444")),
            ..PaymentExtra::default()
        };
        assert!(matches!(
            assert_requirements(&auth, Some(&wrong_token)),
            Err(ExactEvmError::RequirementMismatch { field: "token", .. })
        ));

        let wrong_payee = PaymentExtra {
            token: Some(auth.token),
            pay_to: Some(address!("0x4444444444444444444444444444444444444444")),
            ..PaymentExtra::default()
        };
        assert!(matches!(
            assert_requirements(&auth, Some(&wrong_payee)),
            Err(ExactEvmError::RequirementMismatch { field: "payTo", .. })
        ));
    }
}
