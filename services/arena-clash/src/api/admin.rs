//! Admin console routes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{checked_id, Admin, AppState};
use crate::error::Result;
use crate::instructions::{
    self, AwardPrizeParams, CreateGameParams, CreateTournamentParams, ResolveWithdrawalParams,
    UpdateGameParams, UpdateTournamentParams,
};
use crate::state::{Game, Role, Tournament, Transaction, User};

pub async fn create_game(
    State(state): State<AppState>,
    _admin: Admin,
    Json(params): Json<CreateGameParams>,
) -> Result<(StatusCode, Json<Game>)> {
    let game = instructions::create_game(state.store(), params)?;
    Ok((StatusCode::CREATED, Json(game)))
}

pub async fn update_game(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    Json(params): Json<UpdateGameParams>,
) -> Result<Json<Game>> {
    Ok(Json(instructions::update_game(state.store(), checked_id(&id)?, params)?))
}

pub async fn create_tournament(
    State(state): State<AppState>,
    _admin: Admin,
    Json(params): Json<CreateTournamentParams>,
) -> Result<(StatusCode, Json<Tournament>)> {
    let tournament = instructions::create_tournament(state.store(), params)?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentUpdated {
    pub tournament: Tournament,
    pub notified: usize,
}

pub async fn update_tournament(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    Json(params): Json<UpdateTournamentParams>,
) -> Result<Json<TournamentUpdated>> {
    let (tournament, notified) =
        instructions::update_tournament(state.store(), checked_id(&id)?, params)?;
    Ok(Json(TournamentUpdated {
        tournament,
        notified,
    }))
}

pub async fn award_prize(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(id): Path<String>,
    Json(params): Json<AwardPrizeParams>,
) -> Result<(StatusCode, Json<Transaction>)> {
    checked_id(&params.user_id)?;
    let record = instructions::award_prize(state.store(), checked_id(&id)?, &params)?;
    tracing::info!(by = %admin.uid, id = %record.id, "prize recorded");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_users(State(state): State<AppState>, _admin: Admin) -> Result<Json<Vec<User>>> {
    Ok(Json(instructions::list_users(state.store())?))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

pub async fn set_role(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(uid): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>> {
    let user = instructions::set_role(state.store(), &admin.uid, checked_id(&uid)?, req.role)?;
    Ok(Json(user))
}

pub async fn resolve_withdrawal(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<String>,
    Json(params): Json<ResolveWithdrawalParams>,
) -> Result<Json<Transaction>> {
    Ok(Json(instructions::resolve_withdrawal(state.store(), checked_id(&id)?, &params)?))
}
