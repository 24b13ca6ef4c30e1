//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle y sus variantes para CRUD
//! operations. Mapea exactamente al schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::models::position::GeoPoint;

/// Estado del vehículo - mapea al ENUM vehicle_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "vehicle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Available,
    Busy,
    Offline,
}

/// Vehicle principal - mapea exactamente a la tabla vehicles
///
/// La posición la escribe únicamente el LiveLocationStore (vía el
/// scheduler); capacidad y afinidad de depósito son configuración estática.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub capacity: f64,
    pub status: VehicleStatus,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub position_at: Option<DateTime<Utc>>,
    pub depot_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn current_position(&self) -> Option<GeoPoint> {
        match (self.current_lat, self.current_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    /// Los vehículos offline se excluyen de los snapshots del scheduler
    /// aunque tengan posición conocida
    pub fn is_dispatchable(&self) -> bool {
        !matches!(self.status, VehicleStatus::Offline)
    }
}

/// Request para crear un nuevo vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    pub tenant_id: Uuid,

    #[validate(range(min = 0.001, max = 100000.0))]
    pub capacity: f64,

    pub depot_id: Option<Uuid>,
}

impl CreateVehicleRequest {
    pub fn into_vehicle(self) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            capacity: self.capacity,
            status: VehicleStatus::Available,
            current_lat: None,
            current_lng: None,
            position_at: None,
            depot_id: self.depot_id,
            created_at: Utc::now(),
        }
    }
}

/// Response de vehículo para la API
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub id: String,
    pub tenant_id: String,
    pub capacity: f64,
    pub status: VehicleStatus,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub position_at: Option<String>,
    pub depot_id: Option<String>,
    pub created_at: String,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id.to_string(),
            tenant_id: vehicle.tenant_id.to_string(),
            capacity: vehicle.capacity,
            status: vehicle.status,
            current_lat: vehicle.current_lat,
            current_lng: vehicle.current_lng,
            position_at: vehicle.position_at.map(|t| t.to_rfc3339()),
            depot_id: vehicle.depot_id.map(|d| d.to_string()),
            created_at: vehicle.created_at.to_rfc3339(),
        }
    }
}
