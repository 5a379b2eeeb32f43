use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use civicdesk_common::{CivicDeskError, Role, User};

use crate::auth::AuthedCaller;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateUserBody {
    pub name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

#[derive(Serialize)]
pub struct RoleResponse {
    pub email: String,
    pub role: Role,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
) -> Result<Json<Vec<User>>, ApiError> {
    if !caller.is_admin() {
        return Err(CivicDeskError::Forbidden.into());
    }
    Ok(Json(state.users.list().await?))
}

pub async fn user_role(
    State(state): State<Arc<AppState>>,
    AuthedCaller(_caller): AuthedCaller,
    Path(email): Path<String>,
) -> Result<Json<RoleResponse>, ApiError> {
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| CivicDeskError::NotFound("user".to_string()))?;
    Ok(Json(RoleResponse {
        email: user.email,
        role: user.role,
    }))
}

/// Create the caller's profile on first sign-in. Identity comes from the
/// verified token, never from the body.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Json(body): Json<CreateUserBody>,
) -> Result<Json<Value>, ApiError> {
    let user = User::signed_up(&caller.email, body.name, body.photo_url);
    let created = state.users.insert_if_absent(user).await?;
    Ok(Json(json!({ "created": created })))
}

pub async fn staff_by_role(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Path(role): Path<String>,
) -> Result<Json<Vec<User>>, ApiError> {
    if !caller.is_admin() {
        return Err(CivicDeskError::Forbidden.into());
    }
    let role: Role = role.parse()?;
    Ok(Json(state.users.list_by_role(role).await?))
}
