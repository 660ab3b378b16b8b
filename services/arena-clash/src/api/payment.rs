//! Wallet top-up routes

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AppState, Caller};
use crate::error::{require, ArenaError, Result};
use crate::gateway::{parse_amount, CreateOrder};
use crate::instructions::{new_order_id, open_deposit, settle_deposit, DepositOutcome, Settlement};
use crate::state::{transaction_path, Transaction, TransactionKind, TransactionStatus};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Rupees, as `"100.00"` or `100`
    pub amount: Value,
    pub customer_mobile: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub order_id: String,
    pub payment_url: String,
}

fn validate_mobile(raw: &str) -> Result<String> {
    let digits = raw.trim().trim_start_matches("+91");
    require!(
        digits.len() == 10 && digits.bytes().all(|b| b.is_ascii_digit()),
        ArenaError::invalid("Enter a 10 digit mobile number")
    );
    Ok(digits.to_string())
}

/// Open a pending deposit, then ask the gateway for a payment page
pub async fn create_payment(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    let amount = parse_amount(&req.amount)?;
    let customer_mobile = validate_mobile(&req.customer_mobile)?;
    let order_id = req.order_id.unwrap_or_else(new_order_id);

    let record = open_deposit(state.store(), &uid, amount, &order_id)?;

    let order = CreateOrder {
        order_id: record.id.clone(),
        amount,
        customer_mobile,
        remark: format!("Arena Clash wallet top-up {}", record.id),
    };
    match state.gateway.create_order(&order).await {
        Ok(created) => Ok(Json(CreatePaymentResponse {
            order_id: record.id,
            payment_url: created.payment_url,
        })),
        Err(err) => {
            let outcome = DepositOutcome::Failed {
                reason: Some(err.to_string()),
            };
            settle_deposit(state.store(), &record.id, &outcome)?;
            Err(err.into())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusResponse {
    pub order_id: String,
    pub status: TransactionStatus,
    pub settlement: Settlement,
}

/// Poll the gateway for a deposit the caller opened and settle it
///
/// Orders that already left `pending` are answered from the store without
/// another gateway call.
pub async fn check_payment_status(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Json(req): Json<CheckStatusRequest>,
) -> Result<Json<CheckStatusResponse>> {
    let order_id = super::checked_id(req.order_id.trim())?.to_string();
    let t_path = transaction_path(&order_id);
    let record: Transaction = state
        .store()
        .get(&t_path)?
        .filter(|t: &Transaction| t.user_id == uid && t.kind == TransactionKind::Deposit)
        .ok_or(ArenaError::TransactionNotFound)?;

    let settlement = if record.status == TransactionStatus::Pending {
        let outcome = state.gateway.order_status(&order_id).await?;
        settle_deposit(state.store(), &order_id, &outcome)?
    } else {
        Settlement::AlreadyProcessed {
            status: record.status,
        }
    };

    let status = match &settlement {
        Settlement::Credited { .. } => TransactionStatus::Success,
        Settlement::MarkedFailed => TransactionStatus::Failed,
        Settlement::StillPending => TransactionStatus::Pending,
        Settlement::AlreadyProcessed { status } => *status,
    };
    Ok(Json(CheckStatusResponse {
        order_id,
        status,
        settlement,
    }))
}
