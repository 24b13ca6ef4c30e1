//! API de flota
//!
//! Registro de vehículos y depósitos de cada tenant.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateDepotRequest, CreateVehicleRequest, DepotResponse, VehicleResponse};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_fleet_router() -> Router<AppState> {
    Router::new()
        .route("/vehicles", post(create_vehicle))
        .route("/vehicles/:tenant_id", get(list_vehicles))
        .route("/depots", post(create_depot))
        .route("/depots/:tenant_id", get(list_depots))
}

/// POST /api/fleet/vehicles
async fn create_vehicle(
    State(state): State<AppState>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<Json<VehicleResponse>, AppError> {
    request.validate()?;

    let vehicle = request.into_vehicle();
    state.repository.insert_vehicle(&vehicle).await?;

    log::info!("🚗 Vehículo {} creado para tenant {}", vehicle.id, vehicle.tenant_id);
    Ok(Json(vehicle.into()))
}

/// GET /api/fleet/vehicles/:tenant_id
async fn list_vehicles(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<VehicleResponse>>, AppError> {
    let vehicles = state.repository.dispatchable_vehicles(tenant_id).await?;
    Ok(Json(vehicles.into_iter().map(VehicleResponse::from).collect()))
}

/// POST /api/fleet/depots
async fn create_depot(
    State(state): State<AppState>,
    Json(request): Json<CreateDepotRequest>,
) -> Result<Json<DepotResponse>, AppError> {
    request.validate()?;

    let depot = request.into_depot();
    state.repository.insert_depot(&depot).await?;

    log::info!("🏭 Depósito {} creado para tenant {}", depot.id, depot.tenant_id);
    Ok(Json(depot.into()))
}

/// GET /api/fleet/depots/:tenant_id
async fn list_depots(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<DepotResponse>>, AppError> {
    let depots = state.repository.depots_by_tenant(tenant_id).await?;
    Ok(Json(depots.into_iter().map(DepotResponse::from).collect()))
}
