use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{
    cancel_upload, health_check, pause_upload, resume_upload, start_upload, upload_status,
};
use crate::state::AppState;
use crate::utils::shutdown_signal;

/// build the upload router
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!(
        "Building router with max upload size: {} bytes, chunk size: {} bytes",
        config.max_upload_size,
        config.chunk_size
    );

    // configure cors
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_origin(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/upload", post(start_upload))
        .route("/upload/:id/pause", post(pause_upload))
        .route("/upload/:id/resume", post(resume_upload))
        .route("/upload/:id/cancel", post(cancel_upload))
        .route("/upload/:id/status", get(upload_status))
        .route("/health", get(health_check))
        // axum's implicit 2MB body cap would otherwise override the
        // configured limit for the multipart extractor
        .layer(axum::extract::DefaultBodyLimit::max(config.max_upload_size))
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// start the server with graceful shutdown
pub async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("Starting server...");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    tracing::debug!("Listener bound to {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Server running and ready to accept connections");
    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Chunkdrop starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 UPLOAD SERVER: http://{}:{}", config.host, config.port);
    tracing::info!("📁 Uploads directory: {:?}", config.uploads_dir.canonicalize().unwrap_or(config.uploads_dir.clone()));
    tracing::info!("🧩 Chunk size: {} bytes", config.chunk_size);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
