//! Modelo de Route
//!
//! La unidad de salida del solver. Una ruta es inmutable una vez creada:
//! cualquier cambio se expresa creando una ruta nueva y marcando la
//! anterior como superseded, nunca mutando la lista de paradas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use crate::models::position::GeoPoint;

/// Estado de la ruta - mapea al ENUM route_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "route_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    Planned,
    Active,
    Completed,
    Superseded,
}

impl RouteStatus {
    /// Máquina de estados: planned -> active -> completed, con la
    /// transición alternativa planned|active -> superseded.
    pub fn can_transition(self, next: RouteStatus) -> bool {
        matches!(
            (self, next),
            (RouteStatus::Planned, RouteStatus::Active)
                | (RouteStatus::Active, RouteStatus::Completed)
                | (RouteStatus::Planned, RouteStatus::Superseded)
                | (RouteStatus::Active, RouteStatus::Superseded)
        )
    }

    /// Una ruta viva es la que puede ser reemplazada por un solve más nuevo
    pub fn is_live(self) -> bool {
        matches!(self, RouteStatus::Planned | RouteStatus::Active)
    }
}

/// Route principal
///
/// Invariante: la suma de demandas de los pedidos asignados respeta la
/// capacidad del vehículo, y la secuencia respeta las ventanas de tiempo
/// presentes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub vehicle_id: Uuid,
    /// Secuencia ordenada de pedidos (el orden de visita)
    pub stops: Vec<Uuid>,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    /// Camino ordenado de coordenadas: arranque, paradas y retorno
    pub geometry: Vec<GeoPoint>,
    pub status: RouteStatus,
    /// true si la matriz de costos vino del fallback haversine
    pub degraded: bool,
    /// false si el enriquecimiento ML no estuvo disponible
    pub enriched: bool,
    pub created_at: DateTime<Utc>,
}

/// Response de ruta para la API
#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub id: String,
    pub tenant_id: String,
    pub vehicle_id: String,
    pub stops: Vec<String>,
    pub total_distance_km: f64,
    pub total_duration_min: f64,
    pub geometry: Vec<GeoPoint>,
    pub status: RouteStatus,
    pub degraded: bool,
    pub enriched: bool,
    pub created_at: String,
}

impl From<Route> for RouteResponse {
    fn from(route: Route) -> Self {
        Self {
            id: route.id.to_string(),
            tenant_id: route.tenant_id.to_string(),
            vehicle_id: route.vehicle_id.to_string(),
            stops: route.stops.iter().map(|s| s.to_string()).collect(),
            total_distance_km: route.total_distance_km,
            total_duration_min: route.total_duration_min,
            geometry: route.geometry,
            status: route.status,
            degraded: route.degraded,
            enriched: route.enriched,
            created_at: route.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_status_transitions() {
        assert!(RouteStatus::Planned.can_transition(RouteStatus::Active));
        assert!(RouteStatus::Active.can_transition(RouteStatus::Completed));
        assert!(RouteStatus::Planned.can_transition(RouteStatus::Superseded));
        assert!(RouteStatus::Active.can_transition(RouteStatus::Superseded));

        assert!(!RouteStatus::Completed.can_transition(RouteStatus::Superseded));
        assert!(!RouteStatus::Superseded.can_transition(RouteStatus::Active));
        assert!(!RouteStatus::Planned.can_transition(RouteStatus::Completed));
    }

    #[test]
    fn test_route_status_is_live() {
        assert!(RouteStatus::Planned.is_live());
        assert!(RouteStatus::Active.is_live());
        assert!(!RouteStatus::Completed.is_live());
        assert!(!RouteStatus::Superseded.is_live());
    }
}
