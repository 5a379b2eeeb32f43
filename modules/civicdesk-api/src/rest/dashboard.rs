use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};

use civicdesk_engine::{AdminStats, CitizenStats, StaffStats};

use crate::auth::AuthedCaller;
use crate::error::ApiError;
use crate::AppState;

pub async fn admin_stats(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
) -> Result<Json<AdminStats>, ApiError> {
    Ok(Json(state.stats.admin_stats(&caller).await?))
}

pub async fn staff_stats(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Path(email): Path<String>,
) -> Result<Json<StaffStats>, ApiError> {
    Ok(Json(state.stats.staff_stats(&caller, &email).await?))
}

pub async fn citizen_stats(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Path(email): Path<String>,
) -> Result<Json<CitizenStats>, ApiError> {
    Ok(Json(state.stats.citizen_stats(&caller, &email).await?))
}
