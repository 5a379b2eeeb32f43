use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civicdesk_api::auth::JwtAuth;
use civicdesk_api::{app, AppState};
use civicdesk_common::Config;
use civicdesk_store::{MongoIssueStore, MongoUserStore, StoreClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("civicdesk_api=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    let client = StoreClient::connect(&config.mongodb_uri, &config.mongodb_db).await?;
    info!("Connected to MongoDB");

    let state = Arc::new(AppState::new(
        Arc::new(MongoIssueStore::new(&client)),
        Arc::new(MongoUserStore::new(&client)),
        Arc::new(JwtAuth::new(&config.auth_secret)),
    ));

    let router = app(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Logging layer: method + path + status + latency only (no bodies)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("CivicDesk API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
