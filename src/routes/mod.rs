//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the websocket endpoint plus two plain HTTP
//! liveness routes. CORS follows the configured origin allow-list so browser
//! clients served from a separate dev server can reach the status route.

pub mod status;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/", get(status::status))
        .route("/healthz", get(status::healthz))
        .route("/ws", get(ws::handle_ws))
        .route("/socket", get(ws::handle_ws))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST];

    if config.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "cors: ignoring unparsable origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_credentials(true)
}
