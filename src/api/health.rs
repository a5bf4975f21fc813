use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cached_sessions": state.session.cache().len().await,
        "pending_authorizations": state.session.handoff().pending_count().await,
    }))
}
