//! API de pedidos
//!
//! Intake mínimo de pedidos para alimentar al scheduler.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateOrderRequest, OrderResponse};
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation;

pub fn create_orders_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/:tenant_id", get(list_orders))
        .route("/:order_id/complete", post(complete_order))
}

/// POST /api/orders
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    request.validate()?;
    validation::validate_time_window(&request.time_window_start, &request.time_window_end)
        .map_err(|_| AppError::BadRequest("inverted time window".to_string()))?;

    let order = request.into_order();
    state.repository.insert_order(&order).await?;

    log::info!("📦 Pedido {} creado para tenant {}", order.id, order.tenant_id);
    Ok(Json(order.into()))
}

/// GET /api/orders/:tenant_id
async fn list_orders(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.repository.orders_by_tenant(tenant_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// POST /api/orders/:order_id/complete
async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.lifecycle.complete_order(order_id).await?;
    Ok(Json(json!({ "success": true, "order_id": order_id })))
}
