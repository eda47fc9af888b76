//! Axum route handlers for the facilitator service.
//!
//! Verify and settle share one request shape, `{payload, details}`, and
//! always answer with an outcome body; the status code summarizes it.

use std::sync::Arc;

use alloy_primitives::Address;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use hub402::facilitator::Facilitator;
use hub402::proto::{
    ErrorReason, PaymentRequest, SettlementOutcome, SupportedKind, VerificationOutcome,
};
use serde_json::{Value, json};

use crate::error::FacilitatorError;

/// Shared state of the facilitator routes.
#[derive(Clone)]
pub struct AppState {
    /// The payment facilitator.
    pub facilitator: Arc<dyn Facilitator>,
    /// Account that pays for settlements, reported by `/health`.
    pub address: Address,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// `200` for a valid payment, `400` otherwise.
#[must_use]
pub const fn verify_status(outcome: &VerificationOutcome) -> StatusCode {
    if outcome.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Maps a settlement outcome to its HTTP status.
///
/// Pending confirmations answer `202`: the transfer is out and may still land.
#[must_use]
pub fn settle_status(outcome: &SettlementOutcome) -> StatusCode {
    if outcome.success {
        return StatusCode::OK;
    }
    if outcome.pending {
        return StatusCode::ACCEPTED;
    }
    match outcome.reason {
        Some(reason) if reason.is_client_error() => StatusCode::BAD_REQUEST,
        Some(ErrorReason::NetworkUnavailable | ErrorReason::InsufficientFunds) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /verify` - Checks a payment without touching chain state.
///
/// # Errors
///
/// Returns [`FacilitatorError::InvalidBody`] if the body is not valid JSON.
pub async fn post_verify(
    State(state): State<AppState>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VerificationOutcome>), FacilitatorError> {
    let Json(request) = body?;
    let outcome = state.facilitator.verify_request(request).await;
    Ok((verify_status(&outcome), Json(outcome)))
}

/// `POST /settle` - Verifies and submits a payment on-chain.
///
/// # Errors
///
/// Returns [`FacilitatorError::InvalidBody`] if the body is not valid JSON.
pub async fn post_settle(
    State(state): State<AppState>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SettlementOutcome>), FacilitatorError> {
    let Json(request) = body?;
    let outcome = state.facilitator.settle_request(request).await;
    Ok((settle_status(&outcome), Json(outcome)))
}

/// `GET /supported` - Payment kinds this facilitator accepts.
pub async fn get_supported(State(state): State<AppState>) -> Json<Vec<SupportedKind>> {
    Json(state.facilitator.supported())
}

/// `GET /health` - Liveness plus the settlement account.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "facilitator": state.address,
    }))
}

fn request_format() -> Value {
    json!({
        "payload": "string (0x-prefixed hex payment payload)",
        "details": {
            "x402Version": "number (must be 1)",
            "scheme": "string (e.g., \"exact\")",
            "network": "string (e.g., \"polkadot-hub-testnet\")",
            "extra": "object (optional: amount, token, payTo, name, version)",
        },
    })
}

/// `GET /verify` - Describes the verify endpoint.
pub async fn describe_verify() -> Json<Value> {
    Json(json!({
        "endpoint": "/verify",
        "description": "Verifies x402 payment authorizations without broadcasting",
        "methods": ["GET", "POST"],
        "requestFormat": request_format(),
        "responseFormat": {
            "valid": "boolean",
            "error": "string (optional, reason code when invalid)",
            "details": "object (optional: amount, token, from, to when valid)",
        },
    }))
}

/// `GET /settle` - Describes the settle endpoint.
pub async fn describe_settle() -> Json<Value> {
    Json(json!({
        "endpoint": "/settle",
        "description": "Settles x402 payments by signing and broadcasting transactions",
        "methods": ["GET", "POST"],
        "requestFormat": request_format(),
        "responseFormat": {
            "success": "boolean",
            "transactionHash": "string (optional, once broadcast)",
            "error": "string (optional, reason code when unsuccessful)",
            "pending": "boolean (optional, broadcast but unconfirmed)",
        },
        "warning": "This endpoint requires a valid EVM_PRIVATE_KEY and sufficient funds for gas fees",
    }))
}

/// Creates an Axum [`Router`] with all facilitator endpoints.
///
/// Endpoints:
/// - `GET|POST /verify`
/// - `GET|POST /settle`
/// - `GET /supported`
/// - `GET /health`
pub fn facilitator_router(state: AppState) -> Router {
    Router::new()
        .route("/verify", get(describe_verify).post(post_verify))
        .route("/settle", get(describe_settle).post(post_settle))
        .route("/supported", get(get_supported))
        .route("/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, address};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use hub402::facilitator::BoxFuture;
    use hub402::proto::{AuthorizationSummary, PaymentRequirements, TokenAmount};
    use tower::ServiceExt;

    const SIGNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    struct Canned {
        verify: VerificationOutcome,
        settle: SettlementOutcome,
    }

    impl Facilitator for Canned {
        fn verify(&self, _: String, _: PaymentRequirements) -> BoxFuture<'_, VerificationOutcome> {
            Box::pin(async move { self.verify.clone() })
        }

        fn settle(&self, _: String, _: PaymentRequirements) -> BoxFuture<'_, SettlementOutcome> {
            Box::pin(async move { self.settle.clone() })
        }

        fn supported(&self) -> Vec<SupportedKind> {
            vec![SupportedKind::exact("polkadot-hub-testnet", Default::default())]
        }
    }

    fn summary() -> AuthorizationSummary {
        AuthorizationSummary {
            amount: TokenAmount::from(10),
            token: address!("0x1111111111111111111111111111111111111111"),
            from: address!("0x2222222222222222222222222222222222222222"),
            to: address!("0x3333333333333333333333333333333333333333"),
        }
    }

    fn router(verify: VerificationOutcome, settle: SettlementOutcome) -> Router {
        facilitator_router(AppState {
            facilitator: Arc::new(Canned { verify, settle }),
            address: SIGNER,
        })
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn payment() -> Value {
        json!({
            "payload": "0x00",
            "details": { "x402Version": 1, "scheme": "exact", "network": "polkadot-hub-testnet" },
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn verify_status_follows_validity() {
        let settle = SettlementOutcome::failed(ErrorReason::InternalError);
        let app = router(VerificationOutcome::valid(summary()), settle.clone());
        let (status, body) = send(app, post("/verify", &payment())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["details"]["amount"], "10");

        let app = router(VerificationOutcome::invalid(ErrorReason::InvalidSignature), settle);
        let (status, body) = send(app, post("/verify", &payment())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["valid"], false);
        assert_eq!(body["error"], "invalid_signature");
    }

    #[tokio::test]
    async fn missing_fields_are_reported_before_the_facilitator() {
        let app = router(
            VerificationOutcome::valid(summary()),
            SettlementOutcome::settled(B256::ZERO),
        );
        let (status, body) = send(app.clone(), post("/verify", &json!({ "details": {} }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing_payload");

        let (status, body) = send(app, post("/settle", &json!({ "payload": "0x00" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_requirements");
    }

    #[tokio::test]
    async fn wrongly_typed_fields_get_reason_codes() {
        let app = router(
            VerificationOutcome::valid(summary()),
            SettlementOutcome::settled(B256::ZERO),
        );

        let body = json!({ "payload": 123, "details": { "x402Version": 1 } });
        let (status, body) = send(app.clone(), post("/verify", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["valid"], false);
        assert_eq!(body["error"], "missing_payload");

        let body = json!({ "payload": "0x00", "details": "x" });
        let (status, body) = send(app.clone(), post("/verify", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["valid"], false);
        assert_eq!(body["error"], "missing_requirements");

        let body = json!({ "payload": "0x00", "details": null });
        let (status, body) = send(app.clone(), post("/settle", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_requirements");

        let body = json!({
            "payload": "0x00",
            "details": { "x402Version": 1, "scheme": null, "network": "polkadot-hub-testnet" },
        });
        let (status, body) = send(app, post("/verify", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
    }

    #[tokio::test]
    async fn unreadable_body_is_bad_request() {
        let app = router(
            VerificationOutcome::valid(summary()),
            SettlementOutcome::settled(B256::ZERO),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/settle")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn settle_statuses() {
        let hash = B256::repeat_byte(0xee);
        let cases = [
            (SettlementOutcome::settled(hash), StatusCode::OK),
            (SettlementOutcome::pending(hash), StatusCode::ACCEPTED),
            (
                SettlementOutcome::failed(ErrorReason::NonceAlreadyUsed),
                StatusCode::BAD_REQUEST,
            ),
            (
                SettlementOutcome::failed(ErrorReason::InsufficientFunds),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SettlementOutcome::failed(ErrorReason::NetworkUnavailable),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SettlementOutcome::reverted(hash), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (outcome, expected) in cases {
            let app = router(VerificationOutcome::valid(summary()), outcome.clone());
            let (status, body) = send(app, post("/settle", &payment())).await;
            assert_eq!(status, expected, "{outcome:?}");
            assert_eq!(body["success"], outcome.success);
        }
    }

    #[tokio::test]
    async fn supported_health_and_descriptions() {
        let app = router(
            VerificationOutcome::valid(summary()),
            SettlementOutcome::settled(B256::ZERO),
        );

        let (status, body) = send(app.clone(), get_request("/supported")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["x402Version"], 1);
        assert_eq!(body[0]["scheme"], "exact");
        assert_eq!(body[0]["network"], "polkadot-hub-testnet");
        assert_eq!(body[0]["extra"], json!({}));

        let (status, body) = send(app.clone(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let reported: Address = body["facilitator"].as_str().unwrap().parse().unwrap();
        assert_eq!(reported, SIGNER);

        let (_, body) = send(app.clone(), get_request("/verify")).await;
        assert_eq!(body["endpoint"], "/verify");
        let (_, body) = send(app, get_request("/settle")).await;
        assert!(body["warning"].as_str().unwrap().contains("EVM_PRIVATE_KEY"));
    }
}
