//! Central Upload Server
//!
//! Main entry point for the file upload service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use central_api::{AppState, create_router};
use central_core::storage::{ObjectStore, StoreConfig};
use central_core::upload::{UploadPolicy, UploadService};
use central_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "central=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect object store; missing credentials stop startup here
    let store = ObjectStore::from_config(StoreConfig::from(&config.storage))?;
    info!(
        provider = store.provider_name(),
        bucket = store.bucket(),
        "Object store configured"
    );

    // Upload pipeline
    let policy = UploadPolicy::from_settings(&config.upload, &config.image)?;
    info!(
        max_upload_bytes = policy.max_upload_bytes,
        max_width = config.image.max_width,
        format = %config.image.desired_format,
        "Upload policy loaded"
    );
    let uploads = UploadService::new(Arc::new(store), policy);

    // Create application state
    let state = AppState {
        uploads: Arc::new(uploads),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
