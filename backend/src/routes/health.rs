use axum::{extract::State, http::StatusCode, response::Json};
use diesel::{sql_query, RunQueryDsl};
use serde_json::json;

use crate::state::AppState;

/// Reports `ok` when a pooled connection answers a trivial query.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = match state.db() {
        Ok(mut conn) => sql_query("SELECT 1").execute(&mut conn).is_ok(),
        Err(_) => false,
    };

    if database_ok {
        (StatusCode::OK, Json(json!({ "status": "ok", "database": "up" })))
    } else {
        tracing::warn!("health check could not reach the database");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": "down" })),
        )
    }
}
