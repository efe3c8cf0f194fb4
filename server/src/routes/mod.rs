//! HTTP routes, mounted under the configured base endpoint.

mod ping;
mod predict;

pub use ping::PingResponse;
pub use predict::{PredictPayload, PredictResponse};

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};

pub fn router(state: AppState) -> Router {
    let base = state.settings.api_base_endpoint();
    let api = Router::new()
        .route("/ping", get(ping::ping))
        .route("/predict", post(predict::predict));

    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&base, api)
    };
    router.with_state(state)
}
