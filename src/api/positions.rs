//! API de posiciones en vivo
//!
//! Endpoints de ingesta y consulta del LiveLocationStore. Los updates
//! entran por el canal mpsc, nunca tocan el store desde el handler: el
//! handler valida, encola y responde.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::models::position::PositionUpdateRequest;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_positions_router() -> Router<AppState> {
    Router::new()
        .route("/update", post(update_position))
        .route("/batch", post(update_positions_batch))
        .route("/:tenant_id", get(tenant_positions))
        .route("/:tenant_id/:vehicle_id/history", get(vehicle_history))
}

/// POST /api/positions/update
async fn update_position(
    State(state): State<AppState>,
    Json(request): Json<PositionUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    request.validate()?;

    state
        .position_tx
        .send(request.into_position())
        .await
        .map_err(|_| AppError::ServiceUnavailable("position channel closed".to_string()))?;

    Ok(Json(json!({ "status": "accepted" })))
}

/// POST /api/positions/batch
async fn update_positions_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<PositionUpdateRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let total = requests.len();
    for request in &requests {
        request.validate()?;
    }

    for request in requests {
        state
            .position_tx
            .send(request.into_position())
            .await
            .map_err(|_| AppError::ServiceUnavailable("position channel closed".to_string()))?;
    }

    Ok(Json(json!({ "status": "accepted", "count": total })))
}

/// GET /api/positions/:tenant_id
async fn tenant_positions(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = state.live_locations.snapshot(tenant_id).await;

    let mut drivers: Vec<_> = snapshot.into_values().collect();
    drivers.sort_by_key(|p| p.vehicle_id);

    Ok(Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "vehicles": drivers,
    })))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

/// GET /api/positions/:tenant_id/:vehicle_id/history
async fn vehicle_history(
    State(state): State<AppState>,
    Path((tenant_id, vehicle_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = params.limit.unwrap_or(20).min(100);
    let history = state.live_locations.history(tenant_id, vehicle_id, limit).await;

    Ok(Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "history": history,
    })))
}
