use std::sync::Arc;

use anyhow::{bail, Context};
use auth_service::config::load_service_config;
use auth_service::directory::PgUserDirectory;
use auth_service::keys::load_keys_from_dir;
use auth_service::metrics::AuthMetrics;
use auth_service::{build_router, AppState};
use common_auth::{CredentialVerifier, TokenCodec};
use common_security::Authorizer;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;

    let keys = load_keys_from_dir(&config.keys_folder)?;
    if !keys.contains(&config.active_kid) {
        bail!(
            "AUTH_ACTIVE_KID '{}' not found in {}",
            config.active_kid,
            config.keys_folder.display()
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let codec = TokenCodec::new(config.jwt_config(), Arc::new(keys));
    let credentials = CredentialVerifier::new(
        config.credential_config(),
        Arc::new(PgUserDirectory::new(pool)),
    );
    let authorizer = Authorizer::new(codec).with_credentials(credentials);

    let addr = config.socket_addr();
    let state = AppState::new(authorizer, config, AuthMetrics::new()?);
    let app = build_router(state).layer(TraceLayer::new_for_http());

    info!(%addr, "starting auth-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
