use crate::{
    config::Config,
    handlers, // Import handlers module
    intake::MAX_UPLOAD_BYTES,
    AppState, // Use the AppState defined in main.rs
};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::get,
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

/// Deadline for a whole request, storage calls included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/images/{name}", get(handlers::image))
        .route("/robots.txt", get(handlers::robots_txt))
        .route("/upload", get(handlers::upload_form).post(handlers::upload_photo));

    router = if config.dev_mode {
        router.nest_service("/static", ServeDir::new("static"))
    } else {
        router.route("/static/{*path}", get(handlers::static_asset))
    };

    // No authentication: restrict /_admin/ at the network layer.
    if config.enable_admin {
        router = router
            .route("/_admin/", get(handlers::admin).post(handlers::moderate))
            .route("/_admin/images/{name}", get(handlers::pending_image));
    }

    // Middleware Layers
    router = router
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT));
    if config.log_requests {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state) // Pass the application state
}
