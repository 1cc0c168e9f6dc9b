use crate::api::AppState;
use crate::datasource::Collection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once every collection has delivered its first snapshot.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut waiting = Vec::new();
    for collection in Collection::ALL {
        if state.marketplace.version(collection).await == 0 {
            waiting.push(collection.as_str());
        }
    }
    if waiting.is_empty() {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "syncing", "waiting": waiting})),
        )
    }
}
