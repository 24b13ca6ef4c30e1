//! Repositorios
//!
//! El core necesita del layer de persistencia solo operaciones de
//! create/read/update-status y un update multi-fila atómico para la
//! supersesión. Ese contrato vive en el trait `DispatchRepository`, con
//! una implementación PostgreSQL para producción y una en memoria para
//! tests y simulación local.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Depot, Order, Route, Vehicle};
use crate::utils::errors::AppResult;

pub use memory::InMemoryDispatchRepository;
pub use pg::PgDispatchRepository;

/// Resumen de una reconciliación de rutas
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileSummary {
    pub superseded_routes: usize,
    pub created_routes: usize,
    pub assigned_orders: usize,
    pub reverted_orders: usize,
}

/// Estado de despacho de un tenant para la query de solo lectura
#[derive(Debug, Clone, Serialize)]
pub struct DispatchStatus {
    pub tenant_id: Uuid,
    pub planned_routes: i64,
    pub active_routes: i64,
    pub completed_routes: i64,
    pub superseded_routes: i64,
    pub pending_orders: i64,
    pub last_reconciliation_at: Option<DateTime<Utc>>,
}

/// Contrato de persistencia del engine
#[async_trait]
pub trait DispatchRepository: Send + Sync {
    // Intake
    async fn insert_order(&self, order: &Order) -> AppResult<()>;
    async fn insert_vehicle(&self, vehicle: &Vehicle) -> AppResult<()>;
    async fn insert_depot(&self, depot: &Depot) -> AppResult<()>;

    // Lecturas para el scheduler y la API
    async fn tenants_with_open_orders(&self) -> AppResult<Vec<Uuid>>;
    async fn open_orders(&self, tenant_id: Uuid) -> AppResult<Vec<Order>>;
    async fn orders_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Order>>;
    async fn dispatchable_vehicles(&self, tenant_id: Uuid) -> AppResult<Vec<Vehicle>>;
    async fn depots_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Depot>>;
    async fn live_routes(&self, tenant_id: Uuid) -> AppResult<Vec<Route>>;
    async fn routes_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Route>>;

    /// Sincronizar la posición del vehículo desde el LiveLocationStore
    async fn sync_vehicle_position(
        &self,
        tenant_id: Uuid,
        vehicle_id: Uuid,
        lat: f64,
        lng: f64,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Reconciliación atómica: marca superseded toda ruta viva del
    /// tenant, revierte a pending sus pedidos no completados, inserta las
    /// rutas nuevas y asigna sus paradas. Un lector concurrente ve el
    /// conjunto viejo completo o el nuevo completo, nunca una mezcla.
    async fn reconcile_routes(
        &self,
        tenant_id: Uuid,
        new_routes: Vec<Route>,
    ) -> AppResult<ReconcileSummary>;

    // Transiciones de estado
    async fn activate_route(&self, route_id: Uuid) -> AppResult<Route>;
    async fn complete_route(&self, route_id: Uuid) -> AppResult<Route>;
    async fn complete_order(&self, order_id: Uuid) -> AppResult<Order>;

    /// Query de solo lectura del estado de despacho por tenant
    async fn dispatch_status(&self, tenant_id: Uuid) -> AppResult<DispatchStatus>;
}
