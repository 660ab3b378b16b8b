//! Player routes

use arena_store::Money;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{checked_id, AppState, Caller};
use crate::error::Result;
use crate::gateway::parse_amount;
use crate::instructions::{self, JoinParams, OnboardParams, TournamentFilter, TournamentView};
use crate::state::{Notification, Participant, Tournament, Transaction, User};

pub async fn save_profile(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Json(params): Json<OnboardParams>,
) -> Result<Json<User>> {
    let user = instructions::onboard(state.store(), &uid, &params)?;
    Ok(Json(user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance: Money,
    pub transactions: Vec<Transaction>,
}

pub async fn wallet(
    State(state): State<AppState>,
    Caller(uid): Caller,
) -> Result<Json<WalletResponse>> {
    let (balance, transactions) = instructions::wallet_view(state.store(), &uid)?;
    Ok(Json(WalletResponse {
        balance,
        transactions,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    /// Rupees, as `"150.00"` or `150`
    pub amount: Value,
    pub upi_id: String,
}

pub async fn withdraw(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Json(req): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<Transaction>)> {
    let amount = parse_amount(&req.amount)?;
    let record = instructions::request_withdrawal(state.store(), &uid, amount, &req.upi_id)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_tournaments(
    State(state): State<AppState>,
    _caller: Caller,
    Query(filter): Query<TournamentFilter>,
) -> Result<Json<Vec<Tournament>>> {
    Ok(Json(instructions::list_tournaments(state.store(), &filter)?))
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Path(id): Path<String>,
) -> Result<Json<TournamentView>> {
    let view = instructions::tournament_view(state.store(), &uid, checked_id(&id)?)?;
    Ok(Json(view))
}

pub async fn participants(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<Participant>>> {
    Ok(Json(instructions::list_participants(state.store(), checked_id(&id)?)?))
}

pub async fn join(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Path(id): Path<String>,
    Json(params): Json<JoinParams>,
) -> Result<Json<Participant>> {
    let participant =
        instructions::join_tournament(state.store(), &uid, checked_id(&id)?, &params)?;
    Ok(Json(participant))
}

pub async fn notifications(
    State(state): State<AppState>,
    Caller(uid): Caller,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(instructions::list_notifications(state.store(), &uid)?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Caller(uid): Caller,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    let note = instructions::mark_notification_read(state.store(), &uid, checked_id(&id)?)?;
    Ok(Json(note))
}
