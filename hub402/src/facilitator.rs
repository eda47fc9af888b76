//! Core trait for payment verification and settlement.
//!
//! A [`Facilitator`] is the service-level entry point: it receives a raw
//! payload together with the caller's requirements and answers with an
//! outcome value. Failures are part of the outcome, never a `Result`, so the
//! HTTP layer can forward them without further interpretation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto::{
    PaymentRequest, PaymentRequirements, SettlementOutcome, SupportedKind, VerificationOutcome,
};

/// A boxed, sendable future borrowed from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Verifies and settles x402 payments.
///
/// Object safe, so a server can hold an `Arc<dyn Facilitator>`.
pub trait Facilitator: Send + Sync {
    /// Checks that `payload` authorizes a payment satisfying `requirements`.
    ///
    /// Never touches chain state beyond reads.
    fn verify(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, VerificationOutcome>;

    /// Re-verifies `payload` and, if valid, submits the transfer on-chain.
    fn settle(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, SettlementOutcome>;

    /// Lists every `(version, scheme, network)` combination this facilitator accepts.
    fn supported(&self) -> Vec<SupportedKind>;

    /// Verifies an inbound `{payload, details}` request.
    fn verify_request(&self, request: PaymentRequest) -> BoxFuture<'_, VerificationOutcome> {
        match request.into_parts() {
            Ok((payload, requirements)) => self.verify(payload, requirements),
            Err(reason) => Box::pin(async move { VerificationOutcome::invalid(reason) }),
        }
    }

    /// Settles an inbound `{payload, details}` request.
    fn settle_request(&self, request: PaymentRequest) -> BoxFuture<'_, SettlementOutcome> {
        match request.into_parts() {
            Ok((payload, requirements)) => self.settle(payload, requirements),
            Err(reason) => Box::pin(async move { SettlementOutcome::failed(reason) }),
        }
    }
}

impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    fn verify(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, VerificationOutcome> {
        (**self).verify(payload, requirements)
    }

    fn settle(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, SettlementOutcome> {
        (**self).settle(payload, requirements)
    }

    fn supported(&self) -> Vec<SupportedKind> {
        (**self).supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{ErrorReason, PaymentExtra};

    struct Unreachable;

    impl Facilitator for Unreachable {
        fn verify(
            &self,
            _payload: String,
            _requirements: PaymentRequirements,
        ) -> BoxFuture<'_, VerificationOutcome> {
            Box::pin(async { VerificationOutcome::invalid(ErrorReason::InternalError) })
        }

        fn settle(
            &self,
            _payload: String,
            _requirements: PaymentRequirements,
        ) -> BoxFuture<'_, SettlementOutcome> {
            Box::pin(async { SettlementOutcome::failed(ErrorReason::InternalError) })
        }

        fn supported(&self) -> Vec<SupportedKind> {
            vec![SupportedKind::exact("test", PaymentExtra::default())]
        }
    }

    #[tokio::test]
    async fn missing_parts_short_circuit() {
        let facilitator: Arc<dyn Facilitator> = Arc::new(Unreachable);

        let outcome = facilitator.verify_request(PaymentRequest::default()).await;
        assert_eq!(outcome.reason, Some(ErrorReason::MissingPayload));

        let outcome = facilitator
            .settle_request(PaymentRequest {
                payload: Some("0x".into()),
                details: None,
            })
            .await;
        assert_eq!(outcome.reason, Some(ErrorReason::MissingRequirements));
        assert!(outcome.transaction_hash.is_none());
    }

    #[tokio::test]
    async fn complete_request_is_forwarded() {
        let facilitator = Arc::new(Unreachable);
        let outcome = facilitator
            .verify_request(PaymentRequest {
                payload: Some("0x00".into()),
                details: Some(PaymentRequirements::exact("test")),
            })
            .await;
        assert_eq!(outcome.reason, Some(ErrorReason::InternalError));
        assert_eq!(facilitator.supported().len(), 1);
    }
}
