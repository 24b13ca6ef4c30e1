//! Modelo de Depot
//!
//! Punto fijo de origen/retorno de las rutas de un tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::position::GeoPoint;

/// Depot principal - mapea exactamente a la tabla depots
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Depot {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub service_radius_km: f64,
    pub daily_capacity: i32,
    pub created_at: DateTime<Utc>,
}

impl Depot {
    pub fn position(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lng: self.lng }
    }
}

/// Request para crear un nuevo depósito
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDepotRequest {
    pub tenant_id: Uuid,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[validate(range(min = 0.1, max = 1000.0))]
    pub service_radius_km: f64,

    #[validate(range(min = 1, max = 100000))]
    pub daily_capacity: i32,
}

impl CreateDepotRequest {
    pub fn into_depot(self) -> Depot {
        Depot {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            lat: self.lat,
            lng: self.lng,
            service_radius_km: self.service_radius_km,
            daily_capacity: self.daily_capacity,
            created_at: Utc::now(),
        }
    }
}

/// Response de depósito para la API
#[derive(Debug, Serialize)]
pub struct DepotResponse {
    pub id: String,
    pub tenant_id: String,
    pub lat: f64,
    pub lng: f64,
    pub service_radius_km: f64,
    pub daily_capacity: i32,
    pub created_at: String,
}

impl From<Depot> for DepotResponse {
    fn from(depot: Depot) -> Self {
        Self {
            id: depot.id.to_string(),
            tenant_id: depot.tenant_id.to_string(),
            lat: depot.lat,
            lng: depot.lng,
            service_radius_km: depot.service_radius_km,
            daily_capacity: depot.daily_capacity,
            created_at: depot.created_at.to_rfc3339(),
        }
    }
}
