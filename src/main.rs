use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aws_clients;
mod config;
mod domain;
mod errors;
mod gallery;
mod handlers;
mod intake;
mod models;
mod moderation;
mod pages;
mod routes;
mod startup;
mod storage;

use crate::config::Config;
use crate::domain::FileStorage;
use crate::errors::AppError;
use crate::gallery::CachePolicy;
use crate::pages::Templates;
use crate::storage::{MemoryFileStorage, S3FileStorage};

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub file_storage: Arc<dyn FileStorage>,
    pub cache: CachePolicy,
    pub templates: Templates,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cycle_colors=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(?config, "starting server...");

    // --- Storage ---
    let file_storage: Arc<dyn FileStorage> = if config.memory_store {
        tracing::warn!("Using in-memory storage; submissions are lost on restart");
        Arc::new(MemoryFileStorage::new())
    } else {
        tracing::info!("Initializing AWS S3 client...");
        let sdk_config = aws_clients::create_sdk_config(&config).await;
        let s3_client = aws_clients::create_s3_client(&sdk_config, &config);
        startup::check_bucket(&s3_client, &config.photo_bucket_name).await;
        Arc::new(S3FileStorage::new(s3_client, config.photo_bucket_name.clone()))
    };

    if config.enable_admin {
        tracing::warn!("Admin routes enabled under /_admin/ without authentication");
    }

    // --- Application State ---
    let state = Arc::new(AppState {
        file_storage,
        cache: CachePolicy { dev_mode: config.dev_mode },
        templates: Templates { dev_mode: config.dev_mode },
    });

    let app = routes::create_router(state, &config);

    // --- Server Startup ---
    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
