use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;

use civicdesk_common::{CivicDeskError, Issue, IssueDraft, IssueId};
use civicdesk_engine::UpvoteReceipt;
use civicdesk_store::IssueFilter;

use crate::auth::AuthedCaller;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIssueBody {
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub location: Option<String>,
}

pub async fn list_issues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    Ok(Json(state.issues.list(&IssueFilter::default()).await?))
}

pub async fn issue_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Issue>, ApiError> {
    let id = IssueId::parse(&id)?;
    let issue = state
        .issues
        .find_by_id(&id)
        .await?
        .ok_or_else(|| CivicDeskError::NotFound("issue".to_string()))?;
    Ok(Json(issue))
}

pub async fn create_issue(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Json(body): Json<SubmitIssueBody>,
) -> Result<Json<Issue>, ApiError> {
    let draft = IssueDraft::submitted(
        body.title,
        body.description,
        body.category,
        body.location,
        &caller.email,
    );
    Ok(Json(state.issues.insert(draft).await?))
}

pub async fn my_issues(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
) -> Result<Json<Vec<Issue>>, ApiError> {
    let filter = IssueFilter {
        created_by: Some(caller.email.clone()),
        ..Default::default()
    };
    Ok(Json(state.issues.list(&filter).await?))
}

pub async fn toggle_upvote(
    State(state): State<Arc<AppState>>,
    AuthedCaller(caller): AuthedCaller,
    Path(id): Path<String>,
) -> Result<Json<UpvoteReceipt>, ApiError> {
    Ok(Json(state.engagement.toggle(&id, &caller.email).await?))
}
