//! Caller identity
//!
//! Sign-in happens upstream; the auth proxy forwards the verified uid in
//! [`USER_HEADER`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::{checked_id, AppState};
use crate::error::ArenaError;
use crate::instructions::admin::ensure_admin;
use crate::state::User;

pub const USER_HEADER: &str = "x-user-id";

/// Uid of the signed-in caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ArenaError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ArenaError::Unauthenticated)?;
        let uid = checked_id(uid).map_err(|_| ArenaError::Unauthenticated)?;
        Ok(Caller(uid.to_string()))
    }
}

/// Signed-in caller holding the admin role
#[derive(Clone, Debug)]
pub struct Admin(pub User);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ArenaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Caller(uid) = Caller::from_request_parts(parts, state).await?;
        let user = ensure_admin(state.store(), &uid)?;
        Ok(Admin(user))
    }
}
