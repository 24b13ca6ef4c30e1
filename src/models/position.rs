//! Modelos de posición
//!
//! Tipos compartidos para coordenadas y para el stream de posiciones
//! en vivo que alimenta el LiveLocationStore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Punto geográfico (lat/lng en grados decimales)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Última posición conocida de un vehículo - la tupla que entrega el
/// canal de ingesta de posiciones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub tenant_id: Uuid,
    pub vehicle_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmph: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl VehiclePosition {
    pub fn point(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lng: self.lng }
    }
}

/// Request para publicar una actualización de posición
#[derive(Debug, Deserialize, Validate)]
pub struct PositionUpdateRequest {
    pub tenant_id: Uuid,
    pub vehicle_id: Uuid,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[validate(range(min = 0.0, max = 250.0))]
    pub speed_kmph: Option<f64>,

    /// Timestamp del GPS; si falta se usa la hora de recepción
    pub recorded_at: Option<DateTime<Utc>>,
}

impl PositionUpdateRequest {
    pub fn into_position(self) -> VehiclePosition {
        VehiclePosition {
            tenant_id: self.tenant_id,
            vehicle_id: self.vehicle_id,
            lat: self.lat,
            lng: self.lng,
            speed_kmph: self.speed_kmph,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
        }
    }
}
