//! API routes.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    add_downloads, cancel_all, cancel_download, clear_all, clear_completed, delete_all_files,
    delete_file, download_file, get_download, get_stats, health, list_downloads, list_files,
    retry_download,
};
use crate::state::AppState;
use crate::ws::ws_endpoint;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let download_routes = Router::new()
        .route("/downloads", get(list_downloads).post(add_downloads))
        .route(
            "/downloads/:id",
            get(get_download).delete(cancel_download),
        )
        .route("/downloads/:id/retry", post(retry_download));

    let queue_routes = Router::new()
        .route("/queue/stats", get(get_stats))
        .route("/queue/clear", post(clear_completed))
        .route("/queue/cancel-all", post(cancel_all))
        .route("/queue/clear-all", post(clear_all));

    let file_routes = Router::new()
        .route("/files", get(list_files).delete(delete_all_files))
        .route("/files/:filename", get(download_file).delete(delete_file));

    let health_routes = Router::new().route("/health", get(health));

    let api_routes = download_routes
        .merge(queue_routes)
        .merge(file_routes)
        .merge(health_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
