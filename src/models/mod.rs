//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL con las convenciones estándar.

pub mod depot;
pub mod order;
pub mod position;
pub mod route;
pub mod vehicle;

pub use depot::{CreateDepotRequest, Depot, DepotResponse};
pub use order::{CreateOrderRequest, Order, OrderResponse, OrderStatus};
pub use position::{GeoPoint, PositionUpdateRequest, VehiclePosition};
pub use route::{Route, RouteResponse, RouteStatus};
pub use vehicle::{CreateVehicleRequest, Vehicle, VehicleResponse, VehicleStatus};
