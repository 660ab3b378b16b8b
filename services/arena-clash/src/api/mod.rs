//! HTTP routes
//!
//! Two routers: the player/admin API and the gateway webhook receiver, each
//! served on its own listener.

mod admin;
mod auth;
mod payment;
mod player;
mod webhook;

use std::sync::Arc;

use arena_store::{Backend, Store};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{require, ArenaError, Result};
use crate::gateway::PaymentGateway;

pub use auth::{Admin, Caller, USER_HEADER};
pub use webhook::SIGNATURE_HEADER;

/// Store over whichever backend the binary picked
pub type DocStore = Store<Box<dyn Backend>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        store: DocStore,
        gateway: Arc<dyn PaymentGateway>,
        webhook_secret: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            gateway,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn store(&self) -> &DocStore {
        &self.store
    }
}

/// Reject ids that would escape their collection
pub(crate) fn checked_id(id: &str) -> Result<&str> {
    require!(
        !id.is_empty() && id.len() <= 128 && !id.contains('/'),
        ArenaError::invalid("Invalid id")
    );
    Ok(id)
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Wallet top-up
        .route("/api/create-payment", post(payment::create_payment))
        .route("/api/check-payment-status", post(payment::check_payment_status))
        // Player
        .route("/api/profile", post(player::save_profile))
        .route("/api/wallet", get(player::wallet))
        .route("/api/wallet/withdraw", post(player::withdraw))
        .route("/api/tournaments", get(player::list_tournaments))
        .route("/api/tournaments/{id}", get(player::get_tournament))
        .route("/api/tournaments/{id}/participants", get(player::participants))
        .route("/api/tournaments/{id}/join", post(player::join))
        .route("/api/notifications", get(player::notifications))
        .route("/api/notifications/{id}/read", post(player::mark_read))
        // Admin console
        .route("/api/admin/games", post(admin::create_game))
        .route("/api/admin/games/{id}", put(admin::update_game))
        .route("/api/admin/tournaments", post(admin::create_tournament))
        .route("/api/admin/tournaments/{id}", put(admin::update_tournament))
        .route("/api/admin/tournaments/{id}/prizes", post(admin::award_prize))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{uid}/role", put(admin::set_role))
        .route("/api/admin/withdrawals/{id}", post(admin::resolve_withdrawal))
        .with_state(state)
}

pub fn webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook::receive))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use arena_store::{Backend, MemoryBackend, Money, Store};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{AppState, DocStore, USER_HEADER};
    use crate::gateway::{CreateOrder, GatewayError, GatewayOrder, PaymentGateway};
    use crate::instructions::wallet::DepositOutcome;

    pub const WEBHOOK_SECRET: &str = "whsec-test";

    /// Scripted gateway that counts calls
    pub struct FakeGateway {
        pub fail_create: bool,
        pub status: Mutex<DepositOutcome>,
        pub status_calls: AtomicUsize,
        pub orders: Mutex<Vec<CreateOrder>>,
    }

    impl Default for FakeGateway {
        fn default() -> Self {
            Self {
                fail_create: false,
                status: Mutex::new(DepositOutcome::Pending),
                status_calls: AtomicUsize::new(0),
                orders: Mutex::new(Vec::new()),
            }
        }
    }

    impl FakeGateway {
        pub fn set_status(&self, outcome: DepositOutcome) {
            *self.status.lock().unwrap() = outcome;
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, order: &CreateOrder) -> Result<GatewayOrder, GatewayError> {
            if self.fail_create {
                return Err(GatewayError::Rejected("Invalid token".to_string()));
            }
            self.orders.lock().unwrap().push(order.clone());
            Ok(GatewayOrder {
                order_id: order.order_id.clone(),
                payment_url: format!("https://pay.example/{}", order.order_id),
            })
        }

        async fn order_status(&self, _order_id: &str) -> Result<DepositOutcome, GatewayError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status.lock().unwrap().clone())
        }
    }

    pub struct TestApp {
        pub state: AppState,
        pub gateway: Arc<FakeGateway>,
    }

    impl TestApp {
        pub fn new() -> Self {
            Self::with_gateway(FakeGateway::default())
        }

        pub fn with_gateway(gateway: FakeGateway) -> Self {
            let gateway = Arc::new(gateway);
            let store: DocStore = Store::new(Box::new(MemoryBackend::new()) as Box<dyn Backend>);
            let state = AppState::new(store, gateway.clone(), WEBHOOK_SECRET);
            Self { state, gateway }
        }

        pub fn store(&self) -> &DocStore {
            self.state.store()
        }

        pub fn api(&self) -> Router {
            super::api_router(self.state.clone())
        }

        pub fn webhook(&self) -> Router {
            super::webhook_router(self.state.clone())
        }
    }

    pub fn request(
        method: Method,
        uri: &str,
        uid: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(uid) = uid {
            builder = builder.header(USER_HEADER, uid);
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub fn rupees(n: u64) -> Money {
        Money::from_rupees(n)
    }
}
