use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

use civicdesk_common::CivicDeskError;

/// Maps the domain error taxonomy onto distinct response statuses. Store
/// failures surface as 500 and are never rewritten into success values.
pub struct ApiError(pub CivicDeskError);

impl From<CivicDeskError> for ApiError {
    fn from(e: CivicDeskError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CivicDeskError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CivicDeskError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "unauthorized access".to_string())
            }
            CivicDeskError::Forbidden => (StatusCode::FORBIDDEN, "forbidden access".to_string()),
            CivicDeskError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            CivicDeskError::Database(_) | CivicDeskError::Anyhow(_) => {
                warn!(error = %self.0, "request failed on a dependency");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
