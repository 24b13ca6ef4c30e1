//! Repositorio PostgreSQL
//!
//! Implementación de producción del contrato de persistencia. La
//! reconciliación corre en una transacción única: supersesión, reversión
//! de pedidos, inserción de rutas nuevas y asignación de paradas se
//! confirman juntas o no se confirman.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::position::GeoPoint;
use crate::models::{Depot, Order, OrderStatus, Route, RouteStatus, Vehicle};
use crate::repositories::{DispatchRepository, DispatchStatus, ReconcileSummary};
use crate::utils::errors::{AppError, AppResult};

/// Fila de la tabla routes (stops y geometry como JSONB)
#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    tenant_id: Uuid,
    vehicle_id: Uuid,
    stops: Json<Vec<Uuid>>,
    total_distance_km: f64,
    total_duration_min: f64,
    geometry: Json<Vec<GeoPoint>>,
    status: RouteStatus,
    degraded: bool,
    enriched: bool,
    created_at: DateTime<Utc>,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            tenant_id: row.tenant_id,
            vehicle_id: row.vehicle_id,
            stops: row.stops.0,
            total_distance_km: row.total_distance_km,
            total_duration_min: row.total_duration_min,
            geometry: row.geometry.0,
            status: row.status,
            degraded: row.degraded,
            enriched: row.enriched,
            created_at: row.created_at,
        }
    }
}

/// Repositorio PostgreSQL del engine
pub struct PgDispatchRepository {
    pool: PgPool,
}

impl PgDispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_route(&self, route_id: Uuid) -> AppResult<Route> {
        let row = sqlx::query_as::<_, RouteRow>("SELECT * FROM routes WHERE id = $1")
            .bind(route_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("route '{}' not found", route_id)))?;
        Ok(row.into())
    }
}

#[async_trait]
impl DispatchRepository for PgDispatchRepository {
    async fn insert_order(&self, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, tenant_id, depot_id, lat, lng, demand,
                 time_window_start, time_window_end, status, route_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id)
        .bind(order.tenant_id)
        .bind(order.depot_id)
        .bind(order.lat)
        .bind(order.lng)
        .bind(order.demand)
        .bind(order.time_window_start)
        .bind(order.time_window_end)
        .bind(order.status)
        .bind(order.route_id)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_vehicle(&self, vehicle: &Vehicle) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles
                (id, tenant_id, capacity, status, current_lat, current_lng,
                 position_at, depot_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.tenant_id)
        .bind(vehicle.capacity)
        .bind(vehicle.status)
        .bind(vehicle.current_lat)
        .bind(vehicle.current_lng)
        .bind(vehicle.position_at)
        .bind(vehicle.depot_id)
        .bind(vehicle.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_depot(&self, depot: &Depot) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO depots
                (id, tenant_id, lat, lng, service_radius_km, daily_capacity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(depot.id)
        .bind(depot.tenant_id)
        .bind(depot.lat)
        .bind(depot.lng)
        .bind(depot.service_radius_km)
        .bind(depot.daily_capacity)
        .bind(depot.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn tenants_with_open_orders(&self) -> AppResult<Vec<Uuid>> {
        let tenants = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT tenant_id FROM orders WHERE status IN ('pending', 'assigned') ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    async fn open_orders(&self, tenant_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE tenant_id = $1 AND status IN ('pending', 'assigned')
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn orders_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE tenant_id = $1 ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn dispatchable_vehicles(&self, tenant_id: Uuid) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT * FROM vehicles
            WHERE tenant_id = $1 AND status != 'offline'
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(vehicles)
    }

    async fn depots_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Depot>> {
        let depots = sqlx::query_as::<_, Depot>(
            "SELECT * FROM depots WHERE tenant_id = $1 ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(depots)
    }

    async fn live_routes(&self, tenant_id: Uuid) -> AppResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT * FROM routes
            WHERE tenant_id = $1 AND status IN ('planned', 'active')
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Route::from).collect())
    }

    async fn routes_by_tenant(&self, tenant_id: Uuid) -> AppResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT * FROM routes WHERE tenant_id = $1 ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Route::from).collect())
    }

    async fn sync_vehicle_position(
        &self,
        tenant_id: Uuid,
        vehicle_id: Uuid,
        lat: f64,
        lng: f64,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET current_lat = $3, current_lng = $4, position_at = $5
            WHERE id = $2 AND tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(vehicle_id)
        .bind(lat)
        .bind(lng)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reconcile_routes(
        &self,
        tenant_id: Uuid,
        new_routes: Vec<Route>,
    ) -> AppResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        let mut tx = self.pool.begin().await?;

        // Rutas vivas del tenant, bloqueadas hasta el commit
        let live_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM routes
            WHERE tenant_id = $1 AND status IN ('planned', 'active')
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await?;

        if !live_ids.is_empty() {
            let reverted = sqlx::query(
                r#"
                UPDATE orders SET status = 'pending', route_id = NULL
                WHERE tenant_id = $1 AND status = 'assigned' AND route_id = ANY($2)
                "#,
            )
            .bind(tenant_id)
            .bind(&live_ids)
            .execute(&mut *tx)
            .await?;
            summary.reverted_orders = reverted.rows_affected() as usize;

            let superseded = sqlx::query("UPDATE routes SET status = 'superseded' WHERE id = ANY($1)")
                .bind(&live_ids)
                .execute(&mut *tx)
                .await?;
            summary.superseded_routes = superseded.rows_affected() as usize;
        }

        for route in &new_routes {
            sqlx::query(
                r#"
                INSERT INTO routes
                    (id, tenant_id, vehicle_id, stops, total_distance_km,
                     total_duration_min, geometry, status, degraded, enriched, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(route.id)
            .bind(route.tenant_id)
            .bind(route.vehicle_id)
            .bind(Json(&route.stops))
            .bind(route.total_distance_km)
            .bind(route.total_duration_min)
            .bind(Json(&route.geometry))
            .bind(route.status)
            .bind(route.degraded)
            .bind(route.enriched)
            .bind(route.created_at)
            .execute(&mut *tx)
            .await?;
            summary.created_routes += 1;

            let assigned = sqlx::query(
                r#"
                UPDATE orders SET status = 'assigned', route_id = $2
                WHERE id = ANY($1) AND status != 'completed'
                "#,
            )
            .bind(&route.stops)
            .bind(route.id)
            .execute(&mut *tx)
            .await?;
            summary.assigned_orders += assigned.rows_affected() as usize;
        }

        sqlx::query(
            r#"
            INSERT INTO dispatch_state (tenant_id, last_reconciliation_at)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id) DO UPDATE SET last_reconciliation_at = $2
            "#,
        )
        .bind(tenant_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(summary)
    }

    async fn activate_route(&self, route_id: Uuid) -> AppResult<Route> {
        let route = self.fetch_route(route_id).await?;
        if !route.status.can_transition(RouteStatus::Active) {
            return Err(AppError::Conflict(format!(
                "route '{}' cannot transition to active",
                route_id
            )));
        }

        sqlx::query("UPDATE routes SET status = 'active' WHERE id = $1")
            .bind(route_id)
            .execute(&self.pool)
            .await?;
        self.fetch_route(route_id).await
    }

    async fn complete_route(&self, route_id: Uuid) -> AppResult<Route> {
        let route = self.fetch_route(route_id).await?;
        if !route.status.can_transition(RouteStatus::Completed) {
            return Err(AppError::Conflict(format!(
                "route '{}' cannot transition to completed",
                route_id
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE routes SET status = 'completed' WHERE id = $1")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE orders SET status = 'completed' WHERE route_id = $1 AND status = 'assigned'",
        )
        .bind(route_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.fetch_route(route_id).await
    }

    async fn complete_order(&self, order_id: Uuid) -> AppResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order '{}' not found", order_id)))?;

        if order.status == OrderStatus::Cancelled {
            return Err(AppError::Conflict(format!(
                "order '{}' is cancelled and cannot be completed",
                order_id
            )));
        }

        let updated = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = 'completed' WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn dispatch_status(&self, tenant_id: Uuid) -> AppResult<DispatchStatus> {
        let mut status = DispatchStatus {
            tenant_id,
            planned_routes: 0,
            active_routes: 0,
            completed_routes: 0,
            superseded_routes: 0,
            pending_orders: 0,
            last_reconciliation_at: None,
        };

        let counts = sqlx::query_as::<_, (RouteStatus, i64)>(
            "SELECT status, COUNT(*) FROM routes WHERE tenant_id = $1 GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        for (route_status, count) in counts {
            match route_status {
                RouteStatus::Planned => status.planned_routes = count,
                RouteStatus::Active => status.active_routes = count,
                RouteStatus::Completed => status.completed_routes = count,
                RouteStatus::Superseded => status.superseded_routes = count,
            }
        }

        status.pending_orders = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE tenant_id = $1 AND status = 'pending'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        status.last_reconciliation_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT last_reconciliation_at FROM dispatch_state WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        Ok(status)
    }
}
