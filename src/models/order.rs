//! Modelo de Order
//!
//! Este módulo contiene el struct Order y sus variantes para CRUD
//! operations. Mapea exactamente al schema PostgreSQL con primary key 'id'.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// Estado del pedido - mapea al ENUM order_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Assigned,
    Completed,
    Cancelled,
}

/// Order principal - mapea exactamente a la tabla orders
///
/// Invariante: un pedido está `assigned` si y solo si aparece en la lista
/// de paradas de exactamente una ruta no superseded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub depot_id: Option<Uuid>,
    pub lat: f64,
    pub lng: f64,
    pub demand: f64,
    pub time_window_start: Option<DateTime<Utc>>,
    pub time_window_end: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub route_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Un pedido abierto participa en el próximo solve
    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Assigned)
    }
}

/// Request para crear un nuevo pedido
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub tenant_id: Uuid,
    pub depot_id: Option<Uuid>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[validate(range(min = 0.001, max = 100000.0))]
    pub demand: f64,

    pub time_window_start: Option<DateTime<Utc>>,
    pub time_window_end: Option<DateTime<Utc>>,
}

impl CreateOrderRequest {
    pub fn into_order(self) -> Order {
        Order {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            depot_id: self.depot_id,
            lat: self.lat,
            lng: self.lng,
            demand: self.demand,
            time_window_start: self.time_window_start,
            time_window_end: self.time_window_end,
            status: OrderStatus::Pending,
            route_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Response de pedido para la API
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub tenant_id: String,
    pub depot_id: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub demand: f64,
    pub time_window_start: Option<String>,
    pub time_window_end: Option<String>,
    pub status: OrderStatus,
    pub route_id: Option<String>,
    pub created_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            tenant_id: order.tenant_id.to_string(),
            depot_id: order.depot_id.map(|d| d.to_string()),
            lat: order.lat,
            lng: order.lng,
            demand: order.demand,
            time_window_start: order.time_window_start.map(|t| t.to_rfc3339()),
            time_window_end: order.time_window_end.map(|t| t.to_rfc3339()),
            status: order.status,
            route_id: order.route_id.map(|r| r.to_string()),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}
