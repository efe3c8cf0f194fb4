use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Liveness check; answers with the server version.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: env!("CARGO_PKG_VERSION").to_string(),
    })
}
