use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;
use common_security::Authorizer;

use crate::config::ServiceConfig;
use crate::handlers::{
    authorize, health, introspect, issue_token, issue_token_for_kid, jwks, render_metrics,
};
use crate::metrics::AuthMetrics;

#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<Authorizer>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<AuthMetrics>,
}

impl AppState {
    /// Wires `metrics` in as the authorizer's authentication observer.
    pub fn new(authorizer: Authorizer, config: ServiceConfig, metrics: AuthMetrics) -> Self {
        let metrics = Arc::new(metrics);
        Self {
            authorizer: Arc::new(authorizer.with_observer(metrics.clone())),
            config: Arc::new(config),
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<Authorizer> {
    fn from_ref(state: &AppState) -> Self {
        state.authorizer.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<AuthMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/token", get(issue_token))
        .route("/token/:kid", get(issue_token_for_kid))
        .route("/introspect", get(introspect))
        .route("/authorize/:rule", get(authorize))
        .route("/.well-known/jwks.json", get(jwks))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}
