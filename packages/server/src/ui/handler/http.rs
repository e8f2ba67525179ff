//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::UserId,
    infrastructure::dto::http::{HealthDto, PresenceDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
        connections: state.registry.connected_count().await,
    })
}

/// Presence of a single user
pub async fn presence(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PresenceDto>, StatusCode> {
    let user_id = match UserId::parse("user_id", &user_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Presence lookup rejected: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let connection = state.registry.is_connected(&user_id).await;
    Ok(Json(PresenceDto {
        user_id: user_id.to_string(),
        online: connection.is_some(),
        connected_at: connection.map(|c| c.connected_at().to_rfc3339()),
    }))
}
