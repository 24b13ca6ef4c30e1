//! Repositorio en memoria
//!
//! Implementación del contrato de persistencia sobre un RwLock único.
//! La reconciliación corre entera bajo el write-lock, así los lectores
//! ven el conjunto de rutas viejo o el nuevo, nunca una mezcla. Se usa
//! en tests y en corridas locales sin PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Depot, Order, OrderStatus, Route, RouteStatus, Vehicle, VehicleStatus};
use crate::repositories::{DispatchRepository, DispatchStatus, ReconcileSummary};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    vehicles: HashMap<Uuid, Vehicle>,
    depots: HashMap<Uuid, Depot>,
    routes: HashMap<Uuid, Route>,
    last_reconciliation: HashMap<Uuid, DateTime<Utc>>,
}

/// Repositorio en memoria para tests y simulación
#[derive(Default)]
pub struct InMemoryDispatchRepository {
    inner: RwLock<Inner>,
}

impl InMemoryDispatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T: Clone>(items: Vec<(&T, DateTime<Utc>, Uuid)>) -> Vec<T> {
    let mut items: Vec<_> = items;
    items.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));
    items.into_iter().map(|(item, _, _)| item.clone()).collect()
}

#[async_trait]
impl DispatchRepository for InMemoryDispatchRepository {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(&order.id) {
            return Err(AppError::Conflict(format!("order '{}' already exists", order.id)));
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.vehicles.contains_key(&vehicle.id) {
            return Err(AppError::Conflict(format!("vehicle '{}' already exists", vehicle.id)));
        }
        inner.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn insert_depot(&self, depot: &Depot) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.depots.contains_key(&depot.id) {
            return Err(AppError::Conflict(format!("depot '{}' already exists", depot.id)));
        }
        inner.depots.insert(depot.id, depot.clone());
        Ok(())
    }

    async fn tenants_with_open_orders(&self) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        let mut tenants: Vec<Uuid> = inner
            .orders
            .values()
            .filter(|o| o.is_open())
            .map(|o| o.tenant_id)
            .collect();
        tenants.sort_unstable();
        tenants.dedup();
        Ok(tenants)
    }

    async fn open_orders(&self, tenant_id: Uuid) -> AppResult<Vec<Order>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .orders
                .values()
                .filter(|o| o.tenant_id == tenant_id && o.is_open())
                .map(|o| (o, o.created_at, o.id))
                .collect(),
        ))
    }

    async fn orders_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Order>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .orders
                .values()
                .filter(|o| o.tenant_id == tenant_id)
                .map(|o| (o, o.created_at, o.id))
                .collect(),
        ))
    }

    async fn dispatchable_vehicles(&self, tenant_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .vehicles
                .values()
                .filter(|v| v.tenant_id == tenant_id && v.status != VehicleStatus::Offline)
                .map(|v| (v, v.created_at, v.id))
                .collect(),
        ))
    }

    async fn depots_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Depot>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .depots
                .values()
                .filter(|d| d.tenant_id == tenant_id)
                .map(|d| (d, d.created_at, d.id))
                .collect(),
        ))
    }

    async fn live_routes(&self, tenant_id: Uuid) -> AppResult<Vec<Route>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .routes
                .values()
                .filter(|r| r.tenant_id == tenant_id && r.status.is_live())
                .map(|r| (r, r.created_at, r.id))
                .collect(),
        ))
    }

    async fn routes_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Route>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_creation(
            inner
                .routes
                .values()
                .filter(|r| r.tenant_id == tenant_id)
                .map(|r| (r, r.created_at, r.id))
                .collect(),
        ))
    }

    async fn sync_vehicle_position(
        &self,
        tenant_id: Uuid,
        vehicle_id: Uuid,
        lat: f64,
        lng: f64,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(vehicle) = inner.vehicles.get_mut(&vehicle_id) {
            if vehicle.tenant_id == tenant_id {
                vehicle.current_lat = Some(lat);
                vehicle.current_lng = Some(lng);
                vehicle.position_at = Some(recorded_at);
            }
        }
        Ok(())
    }

    async fn reconcile_routes(
        &self,
        tenant_id: Uuid,
        new_routes: Vec<Route>,
    ) -> AppResult<ReconcileSummary> {
        let mut inner = self.inner.write().await;
        let mut summary = ReconcileSummary::default();

        // Supersesión de toda ruta viva del tenant
        let live_route_ids: Vec<Uuid> = inner
            .routes
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.status.is_live())
            .map(|r| r.id)
            .collect();

        for route_id in &live_route_ids {
            if let Some(route) = inner.routes.get_mut(route_id) {
                route.status = RouteStatus::Superseded;
                summary.superseded_routes += 1;
            }
        }

        // Pedidos asignados de las rutas viejas vuelven a pending;
        // los completados no se tocan jamás
        let reverted: Vec<Uuid> = inner
            .orders
            .values()
            .filter(|o| {
                o.tenant_id == tenant_id
                    && o.status == OrderStatus::Assigned
                    && o.route_id.map(|r| live_route_ids.contains(&r)).unwrap_or(false)
            })
            .map(|o| o.id)
            .collect();
        for order_id in reverted {
            if let Some(order) = inner.orders.get_mut(&order_id) {
                order.status = OrderStatus::Pending;
                order.route_id = None;
                summary.reverted_orders += 1;
            }
        }

        // Insertar rutas nuevas y asignar sus paradas
        for route in new_routes {
            for stop in &route.stops {
                if let Some(order) = inner.orders.get_mut(stop) {
                    if order.status != OrderStatus::Completed {
                        order.status = OrderStatus::Assigned;
                        order.route_id = Some(route.id);
                        summary.assigned_orders += 1;
                    }
                }
            }
            inner.routes.insert(route.id, route);
            summary.created_routes += 1;
        }

        inner.last_reconciliation.insert(tenant_id, Utc::now());
        Ok(summary)
    }

    async fn activate_route(&self, route_id: Uuid) -> AppResult<Route> {
        let mut inner = self.inner.write().await;
        let route = inner
            .routes
            .get_mut(&route_id)
            .ok_or_else(|| AppError::NotFound(format!("route '{}' not found", route_id)))?;

        if !route.status.can_transition(RouteStatus::Active) {
            return Err(AppError::Conflict(format!(
                "route '{}' cannot transition to active",
                route_id
            )));
        }
        route.status = RouteStatus::Active;
        Ok(route.clone())
    }

    async fn complete_route(&self, route_id: Uuid) -> AppResult<Route> {
        let mut inner = self.inner.write().await;
        let route = inner
            .routes
            .get_mut(&route_id)
            .ok_or_else(|| AppError::NotFound(format!("route '{}' not found", route_id)))?;

        if !route.status.can_transition(RouteStatus::Completed) {
            return Err(AppError::Conflict(format!(
                "route '{}' cannot transition to completed",
                route_id
            )));
        }
        route.status = RouteStatus::Completed;
        let completed = route.clone();

        for stop in &completed.stops {
            if let Some(order) = inner.orders.get_mut(stop) {
                if order.status == OrderStatus::Assigned {
                    order.status = OrderStatus::Completed;
                }
            }
        }

        Ok(completed)
    }

    async fn complete_order(&self, order_id: Uuid) -> AppResult<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order '{}' not found", order_id)))?;

        if order.status == OrderStatus::Cancelled {
            return Err(AppError::Conflict(format!(
                "order '{}' is cancelled and cannot be completed",
                order_id
            )));
        }
        order.status = OrderStatus::Completed;
        Ok(order.clone())
    }

    async fn dispatch_status(&self, tenant_id: Uuid) -> AppResult<DispatchStatus> {
        let inner = self.inner.read().await;

        let mut status = DispatchStatus {
            tenant_id,
            planned_routes: 0,
            active_routes: 0,
            completed_routes: 0,
            superseded_routes: 0,
            pending_orders: 0,
            last_reconciliation_at: inner.last_reconciliation.get(&tenant_id).copied(),
        };

        for route in inner.routes.values().filter(|r| r.tenant_id == tenant_id) {
            match route.status {
                RouteStatus::Planned => status.planned_routes += 1,
                RouteStatus::Active => status.active_routes += 1,
                RouteStatus::Completed => status.completed_routes += 1,
                RouteStatus::Superseded => status.superseded_routes += 1,
            }
        }
        status.pending_orders = inner
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id && o.status == OrderStatus::Pending)
            .count() as i64;

        Ok(status)
    }
}
