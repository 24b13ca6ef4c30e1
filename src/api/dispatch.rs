//! API de despacho
//!
//! Endpoints del core: "optimize now" síncrono y la query de solo
//! lectura del estado de despacho por tenant. La optimización siempre
//! devuelve un objeto resultado (posiblemente con cero rutas y todos los
//! pedidos sin asignar con razón), nunca una excepción HTTP, salvo
//! errores fatales de configuración o validación.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Depot, Order, OrderStatus, Route, RouteResponse, Vehicle, VehicleStatus};
use crate::services::optimization_service::OptimizeCommand;
use crate::services::solver::{SolveMethod, UnassignedOrder};
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation;

pub fn create_dispatch_router() -> Router<AppState> {
    Router::new()
        .route("/optimize", post(optimize_now))
        .route("/status/:tenant_id", get(dispatch_status))
        .route("/routes/:tenant_id", get(list_routes))
        .route("/routes/:route_id/activate", post(activate_route))
        .route("/routes/:route_id/complete", post(complete_route))
}

/// Pedido inline para un solve síncrono
#[derive(Debug, Deserialize, Validate)]
pub struct OptimizeOrderSpec {
    pub id: Option<Uuid>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[validate(range(min = 0.001, max = 100000.0))]
    pub demand: f64,

    pub time_window_start: Option<DateTime<Utc>>,
    pub time_window_end: Option<DateTime<Utc>>,
}

/// Vehículo inline para un solve síncrono
#[derive(Debug, Deserialize, Validate)]
pub struct OptimizeVehicleSpec {
    pub id: Option<Uuid>,

    #[validate(range(min = 0.001, max = 100000.0))]
    pub capacity: f64,

    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OptimizeDepotSpec {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

/// Request de "optimize now"
#[derive(Debug, Deserialize, Validate)]
pub struct OptimizeRequest {
    pub tenant_id: Uuid,

    #[validate]
    pub orders: Vec<OptimizeOrderSpec>,

    #[validate]
    pub vehicles: Vec<OptimizeVehicleSpec>,

    #[validate]
    pub depot: Option<OptimizeDepotSpec>,

    /// precise | fast (default: precise)
    pub method: Option<SolveMethod>,
    pub enrich_with_ml: Option<bool>,
    pub use_road_network: Option<bool>,

    #[validate(range(min = 1.0, max = 150.0))]
    pub avg_speed_kmph: Option<f64>,

    #[validate(range(min = 1, max = 300))]
    pub time_budget_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub routes: Vec<RouteResponse>,
    pub unassigned: Vec<UnassignedOrder>,
    pub degraded: bool,
    pub enriched: bool,
    pub method: SolveMethod,
    pub solve_time_ms: u64,
}

/// POST /api/dispatch/optimize
async fn optimize_now(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    request.validate()?;

    let tenant_id = request.tenant_id;
    let now = Utc::now();

    let mut orders = Vec::with_capacity(request.orders.len());
    for spec in request.orders {
        validation::validate_time_window(&spec.time_window_start, &spec.time_window_end)
            .map_err(|_| AppError::BadRequest("inverted time window".to_string()))?;
        orders.push(Order {
            id: spec.id.unwrap_or_else(Uuid::new_v4),
            tenant_id,
            depot_id: None,
            lat: spec.lat,
            lng: spec.lng,
            demand: spec.demand,
            time_window_start: spec.time_window_start,
            time_window_end: spec.time_window_end,
            status: OrderStatus::Pending,
            route_id: None,
            created_at: now,
        });
    }

    let vehicles = request
        .vehicles
        .into_iter()
        .map(|spec| Vehicle {
            id: spec.id.unwrap_or_else(Uuid::new_v4),
            tenant_id,
            capacity: spec.capacity,
            status: VehicleStatus::Available,
            current_lat: spec.lat,
            current_lng: spec.lng,
            position_at: spec.lat.map(|_| now),
            depot_id: None,
            created_at: now,
        })
        .collect();

    let depot = request.depot.map(|spec| Depot {
        id: Uuid::new_v4(),
        tenant_id,
        lat: spec.lat,
        lng: spec.lng,
        service_radius_km: 50.0,
        daily_capacity: 1000,
        created_at: now,
    });

    let outcome = state
        .optimization
        .optimize(OptimizeCommand {
            tenant_id,
            orders,
            vehicles,
            depot,
            method: request.method.unwrap_or(SolveMethod::Precise),
            enrich_with_ml: request.enrich_with_ml.unwrap_or(true),
            use_road_network: request.use_road_network.unwrap_or(true),
            avg_speed_kmph: request.avg_speed_kmph,
            time_budget: request.time_budget_seconds.map(Duration::from_secs),
        })
        .await?;

    Ok(Json(OptimizeResponse {
        routes: outcome.routes.into_iter().map(RouteResponse::from).collect(),
        unassigned: outcome.unassigned,
        degraded: outcome.degraded,
        enriched: outcome.enriched,
        method: outcome.method,
        solve_time_ms: outcome.solve_time_ms,
    }))
}

/// GET /api/dispatch/status/:tenant_id
async fn dispatch_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = state.lifecycle.status(tenant_id).await?;
    Ok(Json(serde_json::to_value(status).map_err(|e| AppError::Internal(e.to_string()))?))
}

/// GET /api/dispatch/routes/:tenant_id
async fn list_routes(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    let routes: Vec<Route> = state.repository.routes_by_tenant(tenant_id).await?;
    Ok(Json(routes.into_iter().map(RouteResponse::from).collect()))
}

/// POST /api/dispatch/routes/:route_id/activate
async fn activate_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<Json<RouteResponse>, AppError> {
    let route = state.lifecycle.activate(route_id).await?;
    Ok(Json(route.into()))
}

/// POST /api/dispatch/routes/:route_id/complete
async fn complete_route(
    State(state): State<AppState>,
    Path(route_id): Path<Uuid>,
) -> Result<Json<RouteResponse>, AppError> {
    let route = state.lifecycle.complete(route_id).await?;
    Ok(Json(route.into()))
}
