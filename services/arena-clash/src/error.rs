//! Error codes surfaced to players and admins
//!
//! The display string of each variant is the message shown to the user.

use arena_store::{Money, MoneyParseError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Tournament not found")]
    TournamentNotFound,

    #[error("User profile not found")]
    UserNotFound,

    #[error("Game not found")]
    GameNotFound,

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Registration is closed for this tournament")]
    RegistrationClosed,

    #[error("Tournament is full")]
    TournamentFull,

    #[error("You have already joined this tournament")]
    AlreadyJoined,

    #[error("Insufficient balance: {needed} needed, {available} available")]
    InsufficientBalance { needed: Money, available: Money },

    #[error("Entry fee is now {current}, please review and try again")]
    FeeChanged { current: Money },

    #[error("Transaction already processed")]
    AlreadyProcessed,

    #[error("Gateway reported {reported} for an order of {expected}")]
    AmountMismatch { expected: Money, reported: Money },

    #[error("Amount must be between {min} and {max}")]
    AmountOutOfRange { min: Money, max: Money },

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyParseError),

    #[error("Game is not active")]
    GameInactive,

    #[error("User is not a participant of this tournament")]
    NotParticipant,

    #[error("Sign in required")]
    Unauthenticated,

    #[error("Not authorized to perform this action")]
    Unauthorized,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Return early with `$err` unless `$cond` holds
macro_rules! require {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
pub(crate) use require;

pub type Result<T, E = ArenaError> = std::result::Result<T, E>;

impl ArenaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ArenaError::InvalidRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        use ArenaError::*;
        match self {
            TournamentNotFound | UserNotFound | GameNotFound | TransactionNotFound
            | NotificationNotFound => StatusCode::NOT_FOUND,
            RegistrationClosed | TournamentFull | AlreadyJoined | FeeChanged { .. }
            | AlreadyProcessed => StatusCode::CONFLICT,
            InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            AmountMismatch { .. } | AmountOutOfRange { .. } | InvalidAmount(_) | GameInactive
            | NotParticipant | InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Unauthenticated | InvalidSignature => StatusCode::UNAUTHORIZED,
            Unauthorized => StatusCode::FORBIDDEN,
            Gateway(_) => StatusCode::BAD_GATEWAY,
            Store(StoreError::Contention(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Overflow | Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ArenaError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Something went wrong, please try again".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
