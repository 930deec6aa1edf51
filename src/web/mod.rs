//! Web server module

mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::alerts::AlertService;
use crate::broker::LogPublisher;
use crate::config::Config;

pub struct AppState {
    pub publisher: Arc<dyn LogPublisher>,
    pub alerts: AlertService,
    /// Limit applied when an alert query names none
    pub default_limit: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/logs", post(routes::ingest_log))
        .route("/alerts", get(routes::list_alerts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
