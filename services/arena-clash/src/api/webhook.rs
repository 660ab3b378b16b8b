//! ZapUPI webhook receiver
//!
//! The gateway posts order updates here. The raw body must carry a valid
//! HMAC-SHA256 signature before anything is parsed.

use arena_store::verify_signature;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{checked_id, AppState};
use crate::error::{ArenaError, Result};
use crate::gateway::{parse_amount, GatewayStatus};
use crate::instructions::{settle_deposit, DepositOutcome};

pub const SIGNATURE_HEADER: &str = "x-zapupi-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    #[serde(alias = "order_id")]
    order_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    utr: Option<String>,
}

impl WebhookPayload {
    fn outcome(&self) -> Result<DepositOutcome> {
        let raw = self
            .status
            .as_deref()
            .ok_or_else(|| ArenaError::invalid("Missing status"))?;
        let status = GatewayStatus::parse(raw)
            .ok_or_else(|| ArenaError::invalid(format!("Unknown status `{raw}`")))?;
        Ok(match status {
            GatewayStatus::Success => DepositOutcome::Paid {
                amount: self.amount.as_ref().map(parse_amount).transpose()?,
                utr: self.utr.clone().filter(|utr| !utr.is_empty()),
            },
            GatewayStatus::Pending => DepositOutcome::Pending,
            GatewayStatus::Failed => DepositOutcome::Failed {
                reason: Some(raw.to_string()),
            },
        })
    }
}

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(state.webhook_secret.as_bytes(), &body, signature) {
        tracing::warn!(len = body.len(), "webhook signature rejected");
        return Err(ArenaError::InvalidSignature);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ArenaError::invalid(format!("Malformed webhook payload: {e}")))?;
    let order_id = checked_id(payload.order_id.trim())?;
    let outcome = payload.outcome()?;

    let settlement = settle_deposit(state.store(), order_id, &outcome)?;
    tracing::info!(order_id, ?settlement, "webhook processed");
    Ok(Json(json!({ "received": true, "settlement": settlement })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{rupees, send, TestApp, WEBHOOK_SECRET};
    use crate::instructions::open_deposit;
    use crate::instructions::test_support::seed_user;
    use crate::state::{transaction_path, user_path, Transaction, TransactionStatus, User};
    use arena_store::sign_payload;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};

    fn hook(body: &Value, signature: Option<String>) -> Request<Body> {
        let raw = body.to_string();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(raw)).unwrap()
    }

    fn signed(body: &Value) -> Request<Body> {
        hook(body, Some(sign_payload(WEBHOOK_SECRET.as_bytes(), body.to_string().as_bytes())))
    }

    fn setup() -> TestApp {
        let app = TestApp::new();
        seed_user(app.store(), "u1", rupees(0));
        open_deposit(app.store(), "u1", rupees(100), "AC1").unwrap();
        app
    }

    fn balance(app: &TestApp) -> arena_store::Money {
        app.store().get::<User>(&user_path("u1")).unwrap().unwrap().wallet_balance
    }

    #[tokio::test]
    async fn test_signed_success_credits_once() {
        let app = setup();
        let body = json!({"orderId": "AC1", "status": "SUCCESS", "amount": "100.00", "utr": "U1"});

        let (status, reply) = send(app.webhook(), signed(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["settlement"]["result"], "credited");
        assert_eq!(balance(&app), rupees(100));

        // gateway retries the same delivery
        let (status, reply) = send(app.webhook(), signed(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["settlement"]["result"], "alreadyProcessed");
        assert_eq!(balance(&app), rupees(100));
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected_untouched() {
        let app = setup();
        let body = json!({"orderId": "AC1", "status": "success"});

        let (status, _) = send(app.webhook(), hook(&body, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = sign_payload(b"wrong-secret", body.to_string().as_bytes());
        let (status, reply) = send(app.webhook(), hook(&body, Some(forged))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply["error"], "Invalid webhook signature");

        let record: Transaction = app.store().get(&transaction_path("AC1")).unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(balance(&app), rupees(0));
    }

    #[tokio::test]
    async fn test_missing_or_unknown_status_is_bad_request() {
        let app = setup();
        let (status, _) = send(app.webhook(), signed(&json!({"orderId": "AC1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, reply) =
            send(app.webhook(), signed(&json!({"order_id": "AC1", "status": "refunded"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["error"], "Unknown status `refunded`");
    }

    #[tokio::test]
    async fn test_failed_status_marks_record() {
        let app = setup();
        let (status, reply) =
            send(app.webhook(), signed(&json!({"orderId": "AC1", "status": "failed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["settlement"]["result"], "markedFailed");
        let record: Transaction = app.store().get(&transaction_path("AC1")).unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_amount_mismatch_is_refused() {
        let app = setup();
        let (status, _) = send(
            app.webhook(),
            signed(&json!({"orderId": "AC1", "status": "success", "amount": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(balance(&app), rupees(0));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let app = setup();
        let (status, _) =
            send(app.webhook(), signed(&json!({"orderId": "NOPE", "status": "success"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
