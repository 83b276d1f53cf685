//! Health check handler.

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe. Requires no authentication and touches no storage.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
