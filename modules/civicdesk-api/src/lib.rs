use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};

use civicdesk_engine::{EngagementToggle, StatsAggregator};
use civicdesk_store::{IssueStore, UserStore};

pub mod auth;
pub mod error;
pub mod rest;

use auth::TokenVerifier;

pub struct AppState {
    pub issues: Arc<dyn IssueStore>,
    pub users: Arc<dyn UserStore>,
    pub engagement: EngagementToggle,
    pub stats: StatsAggregator,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(
        issues: Arc<dyn IssueStore>,
        users: Arc<dyn UserStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            engagement: EngagementToggle::new(issues.clone()),
            stats: StatsAggregator::new(issues.clone(), users.clone()),
            issues,
            users,
            verifier,
        }
    }
}

/// Build the application router over the given state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "server is live" }))
        // Users
        .route(
            "/users",
            get(rest::users::list_users).post(rest::users::create_user),
        )
        .route("/users/{email}/role", get(rest::users::user_role))
        .route("/staffs/{role}", get(rest::users::staff_by_role))
        // Issues
        .route(
            "/issues",
            get(rest::issues::list_issues).post(rest::issues::create_issue),
        )
        .route("/issues/details/{id}", get(rest::issues::issue_details))
        .route("/issues/{id}/upvote", patch(rest::issues::toggle_upvote))
        .route("/my-issues", get(rest::issues::my_issues))
        // Dashboards
        .route("/dashboard/admin/stats", get(rest::dashboard::admin_stats))
        .route(
            "/dashboard/staff/{email}/stats",
            get(rest::dashboard::staff_stats),
        )
        .route(
            "/dashboard/citizen/{email}/stats",
            get(rest::dashboard::citizen_stats),
        )
        .with_state(state)
}
