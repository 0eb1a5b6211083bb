pub mod config;
pub mod error;
pub mod filter;
pub mod github;
pub mod middleware;
pub mod pipeline;
pub mod render;
pub mod sort;
pub mod summary;

use anyhow::Context;
use axum::{
    extract::State,
    http::HeaderMap,
    response::Html,
    routing::get,
    Json, Router,
};
use config::{AppConfig, DashboardConfig};
use error::DashboardError;
use github::{GitHubClient, PullRequestSource};
use middleware::{BasicAuth, HttpsRedirect};
use pipeline::RequestContext;
use render::Renderer;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
    /// Dashboard description, shared read-only with every request.
    pub dashboard: Arc<DashboardConfig>,
    /// Where pull requests come from. Shared by all concurrent fetchers.
    pub source: Arc<dyn PullRequestSource>,
    pub renderer: Arc<Renderer>,
}

impl AppState {
    /// Initializes the application state with a GitHub-backed source.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let source = GitHubClient::new(&config)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Initializes the application state around an existing source.
    pub fn with_source(
        config: AppConfig,
        source: Arc<dyn PullRequestSource>,
    ) -> anyhow::Result<Self> {
        let renderer = Renderer::new().context("failed to load dashboard template")?;
        Ok(Self {
            dashboard: Arc::new(config.dashboard.clone()),
            config,
            source,
            renderer: Arc::new(renderer),
        })
    }
}

/// Builds the router. The dashboard sits behind the optional HTTPS redirect
/// and basic auth, then the timestamp middleware; the health check is open.
pub fn create_app(state: Arc<AppState>) -> anyhow::Result<Router> {
    let mut dashboard_routes = Router::new()
        .route("/", get(dashboard))
        .layer(axum::middleware::from_fn(middleware::timestamp));

    if let Some((user, password)) = state.config.dashboard_credentials() {
        let auth = BasicAuth::new(user, password).context("invalid dashboard credentials")?;
        dashboard_routes = dashboard_routes.layer(axum::middleware::from_fn_with_state(
            auth,
            middleware::require_basic_auth,
        ));
    }

    if let Some(ssl_host) = state.config.ssl_host() {
        let redirect = HttpsRedirect::new(ssl_host).context("invalid SSL_HOST")?;
        dashboard_routes = dashboard_routes.layer(axum::middleware::from_fn_with_state(
            redirect,
            middleware::require_https,
        ));
    }

    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(dashboard_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "prmonitor",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Renders the dashboard for the reference time attached to the request.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, DashboardError> {
    let now = middleware::reference_time(&headers)?;

    let ctx = RequestContext {
        config: state.dashboard.clone(),
        source: state.source.clone(),
        renderer: state.renderer.clone(),
        now,
    };

    let page = pipeline::run(ctx).await?;
    tracing::debug!(reference_time = %now, "Returning dashboard");
    Ok(Html(page))
}
