//! API endpoints
//!
//! Este módulo contiene los endpoints de la API.

pub mod dispatch;
pub mod fleet;
pub mod orders;
pub mod positions;

use axum::Router;

use crate::state::AppState;

/// Crear el router principal de la API
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/dispatch", dispatch::create_dispatch_router())
        .nest("/api/positions", positions::create_positions_router())
        .nest("/api/orders", orders::create_orders_router())
        .nest("/api/fleet", fleet::create_fleet_router())
}
