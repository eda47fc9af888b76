//! On-chain settlement for the EVM exact scheme.
//!
//! Settlement always re-runs verification, then submits one
//! `transferWithAuthorization` transaction and waits for its receipt. Nothing
//! is retried: a second broadcast of the same authorization could double-submit.

use alloy_primitives::{Bytes, TxHash, U256};
use alloy_sol_types::SolCall;
use hub402::proto::{PaymentRequirements, SettlementOutcome};
use tokio::time::Instant;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::contract::IEIP3009;
use super::error::ExactEvmError;
use super::verify::{VerifiedPayment, Verifier};
use crate::chain::{ChainClient, ChainConnector, ContractCall, bounded};
use crate::exact::Authorization;

/// Gas limit used when estimation fails.
pub const FALLBACK_GAS_LIMIT: u64 = 500_000;

/// How the settlement transaction's gas limit is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasPolicy {
    /// Used as-is when set; estimation is skipped entirely.
    pub fixed_limit: Option<u64>,
    /// Applied to the node's estimate when greater than `1.0`.
    pub multiplier: f64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            fixed_limit: None,
            multiplier: 1.0,
        }
    }
}

impl GasPolicy {
    /// Scales an estimate by the multiplier, flooring the result.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scale(&self, estimate: u64) -> u64 {
        if self.multiplier > 1.0 {
            (estimate as f64 * self.multiplier).floor() as u64
        } else {
            estimate
        }
    }
}

/// Builds the `(v, r, s)` overload of `transferWithAuthorization` for `authorization`.
///
/// `v` is normalized to `27`/`28`.
#[must_use]
pub fn transfer_call(authorization: &Authorization) -> ContractCall {
    let sig = &authorization.signature;
    let v = if sig.v < 27 { sig.v + 27 } else { sig.v };
    let call = IEIP3009::transferWithAuthorizationCall {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value,
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
        v,
        r: sig.r,
        s: sig.s,
    };
    ContractCall {
        to: authorization.token,
        calldata: Bytes::from(call.abi_encode()),
        gas_limit: None,
    }
}

/// Submits verified authorizations on-chain.
pub struct Settler<'a, C: ChainConnector> {
    pub(super) verifier: Verifier<'a, C>,
    pub(super) gas: GasPolicy,
}

impl<C: ChainConnector> std::fmt::Debug for Settler<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settler")
            .field("verifier", &self.verifier)
            .field("gas", &self.gas)
            .finish()
    }
}

impl<C: ChainConnector> Settler<'_, C> {
    /// Re-verifies `payload` and, if it passes, settles it.
    pub async fn settle(
        &self,
        payload: &str,
        requirements: &PaymentRequirements,
    ) -> SettlementOutcome {
        let payment = match self.verifier.check(payload, requirements).await {
            Ok(payment) => payment,
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::debug!(reason = %e.reason(), error = %e, "Settlement refused");
                return SettlementOutcome::failed(e.reason());
            }
        };
        match self.execute(payment).await {
            Ok(outcome) => outcome,
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(reason = %e.reason(), error = %e, "Settlement failed");
                SettlementOutcome::failed(e.reason())
            }
        }
    }

    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        network = %payment.network.name,
        token = %payment.authorization.token,
        from = %payment.authorization.from,
    )))]
    async fn execute(
        &self,
        payment: VerifiedPayment<C::Client>,
    ) -> Result<SettlementOutcome, ExactEvmError> {
        let client = &*payment.client;
        let mut call = transfer_call(&payment.authorization);
        call.gas_limit = Some(self.gas_limit(client, &call).await);

        let hash = {
            let _slot = self.verifier.signer.submission().await;
            bounded(self.verifier.timeouts.rpc, client.send_transaction(call))
                .await
                .map_err(ExactEvmError::Broadcast)?
        };
        #[cfg(feature = "telemetry")]
        tracing::info!(
            tx = %hash,
            network = %payment.network.name,
            "Broadcast transferWithAuthorization"
        );

        Ok(self.await_confirmation(client, hash).await)
    }

    /// Chooses the gas limit according to [`GasPolicy`].
    async fn gas_limit<T: ChainClient>(&self, client: &T, call: &ContractCall) -> u64 {
        if let Some(fixed) = self.gas.fixed_limit {
            return fixed;
        }
        match bounded(self.verifier.timeouts.rpc, client.estimate_gas(call)).await {
            Ok(estimate) => self.gas.scale(estimate),
            Err(e) => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(
                    error = %e,
                    fallback = FALLBACK_GAS_LIMIT,
                    "Gas estimation failed, using fallback limit"
                );
                let _ = e;
                FALLBACK_GAS_LIMIT
            }
        }
    }

    /// Polls for the receipt until the confirmation timeout.
    ///
    /// Lookup errors are not fatal; the transaction is already out and only
    /// the deadline decides when to stop asking.
    async fn await_confirmation<T: ChainClient>(
        &self,
        client: &T,
        hash: TxHash,
    ) -> SettlementOutcome {
        let timeouts = self.verifier.timeouts;
        let deadline = Instant::now() + timeouts.confirmation;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let lookup = bounded(
                timeouts.rpc.min(deadline - now),
                client.transaction_receipt(hash),
            );
            match lookup.await {
                Ok(Some(true)) => return SettlementOutcome::settled(hash),
                Ok(Some(false)) => {
                    #[cfg(feature = "telemetry")]
                    tracing::warn!(tx = %hash, "Settlement reverted");
                    return SettlementOutcome::reverted(hash);
                }
                Ok(None) => {}
                Err(e) => {
                    #[cfg(feature = "telemetry")]
                    tracing::debug!(tx = %hash, error = %e, "Receipt lookup failed");
                    let _ = e;
                }
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(timeouts.poll_interval.min(deadline - now)).await;
        }
        #[cfg(feature = "telemetry")]
        tracing::warn!(tx = %hash, "Settlement confirmation pending");
        SettlementOutcome::pending(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::AuthorizationSignature;
    use alloy_primitives::{B256, address};
    use hub402::timestamp::UnixTimestamp;

    fn authorization(v: u8) -> Authorization {
        Authorization {
            token: address!("0x1111111111111111111111111111111111111111"),
            from: address!("0x2222222222222222222222222222222222222222"),
            to: address!("0x3333333333333333333333333333333333333333"),
            value: U256::from(10u64),
            valid_after: UnixTimestamp::from_secs(1),
            valid_before: UnixTimestamp::from_secs(2),
            nonce: B256::repeat_byte(9),
            signature: AuthorizationSignature {
                v,
                r: B256::ZERO,
                s: B256::ZERO,
            },
        }
    }

    #[test]
    fn multiplier_applies_only_above_one() {
        let policy = GasPolicy {
            fixed_limit: None,
            multiplier: 1.25,
        };
        assert_eq!(policy.scale(100_001), 125_001);
        let flat = GasPolicy {
            fixed_limit: None,
            multiplier: 0.5,
        };
        assert_eq!(flat.scale(100_000), 100_000);
        assert_eq!(GasPolicy::default().scale(21_000), 21_000);
    }

    #[test]
    fn call_targets_token_with_normalized_v() {
        let call = transfer_call(&authorization(1));
        assert_eq!(call.to, authorization(1).token);
        assert!(call.gas_limit.is_none());

        let decoded = IEIP3009::transferWithAuthorizationCall::abi_decode(&call.calldata).unwrap();
        assert_eq!(decoded.v, 28);
        assert_eq!(decoded.value, U256::from(10u64));
        assert_eq!(decoded.validBefore, U256::from(2u64));

        let already = transfer_call(&authorization(27));
        let decoded =
            IEIP3009::transferWithAuthorizationCall::abi_decode(&already.calldata).unwrap();
        assert_eq!(decoded.v, 27);
    }
}
