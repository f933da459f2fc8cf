//! auth-server: serves the auth-service REST API

use std::sync::Arc;

use anyhow::Context;
use auth_service::{api, AuthConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auth_service=info,tower_http=info")),
        )
        .init();

    let config = AuthConfig::from_env().context("loading configuration")?;
    let bind_address = config.api_bind_address.clone();

    let auth_service = Arc::new(
        auth_service::init(config)
            .await
            .context("initializing auth service")?,
    );
    let app = api::create_router(auth_service);

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("auth-server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
