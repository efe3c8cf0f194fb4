//! italiclas-server: REST API and command-line entry points.
//!
//! The server answers two routes under the configured base endpoint
//! (`/api/v1` by default):
//!
//! - `GET  {base}/ping` → `{"message": "<version>"}`
//! - `POST {base}/predict` `{"text": "..."}` → `{"is_italian": true}`
//!
//! While no model artifact exists, `predict` answers 503 and a single
//! background job rebuilds it (see [`coordinator`]).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use italiclas_server::{AppState, ArtifactPipeline, Settings, app};
//! use std::sync::Arc;
//!
//! let settings = Settings::from_env()?;
//! let retrainer = Arc::new(ArtifactPipeline::from_settings(&settings));
//! let state = AppState::new(settings, retrainer);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app(state)).await?;
//! ```

mod bootstrap;
mod config;
pub mod coordinator;
mod error;
pub mod routes;
mod state;

// Re-export public API
//
// Configuration
pub use config::{Settings, SettingsError};
// Errors
pub use error::{ApiError, ServeError, UNAVAILABLE_DETAIL};
// Serving
pub use bootstrap::ArtifactPipeline;
pub use coordinator::{PredictOutcome, RetrainStatus, RetrainTicket, Retrainer, ServingCoordinator};
pub use state::AppState;

use axum::Router;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the application router with tracing and CORS middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = if settings.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = settings
            .allowed_hosts
            .iter()
            .filter_map(|host| match host.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("[API] Ignoring invalid allowed host '{}'", host);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
