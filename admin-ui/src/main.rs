use std::env;
use std::sync::Arc;

use admin_ui::{create_app, AppState};
use anyhow::{Context, Result};
use backend::BackendClient;
use config_loader::ConfigManager;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wards::{config as policy_config, AccessPolicy};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admin_ui=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a valid number")?;
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());

    let manager = ConfigManager::new();
    let backend_config = manager
        .load_backend()
        .with_context(|| format!("Failed to load backend config ({:?})", manager.config_path()))?;
    let jwt_secret = backend_config
        .jwt_secret
        .clone()
        .context("jwtSecret (or COPYDESK_JWT_SECRET) is required to verify admin tokens")?;
    let policy_cfg = policy_config::load_from_env().context("Invalid access policy settings")?;

    let backend = Arc::new(BackendClient::new(&backend_config).context("Invalid backend config")?);
    let policy = Arc::new(AccessPolicy::new(backend.clone(), backend.clone(), policy_cfg));
    let app = create_app(AppState::new(backend, policy, jwt_secret));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", bind_addr, port))?;

    info!(
        "Admin API starting on http://{}:{} (backend {})",
        bind_addr, port, backend_config.url
    );

    axum::serve(listener, app)
        .await
        .context("Server failed to start")?;

    Ok(())
}
