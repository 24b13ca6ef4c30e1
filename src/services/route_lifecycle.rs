//! Ciclo de vida de rutas
//!
//! Aplica la máquina de estados de una ruta y las reglas de supersesión:
//! crear rutas nuevas para un vehículo con rutas vivas marca las
//! anteriores como superseded en la misma transacción, y sus paradas no
//! visitadas vuelven a ser elegibles para reasignación. Un pedido de una
//! ruta completada no se vuelve a visitar jamás.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::Route;
use crate::repositories::{DispatchRepository, DispatchStatus, ReconcileSummary};
use crate::utils::errors::AppResult;

/// Manager del ciclo de vida de rutas sobre el repositorio
pub struct RouteLifecycleManager {
    repository: Arc<dyn DispatchRepository>,
}

impl RouteLifecycleManager {
    pub fn new(repository: Arc<dyn DispatchRepository>) -> Self {
        Self { repository }
    }

    /// Aplicar el resultado de un solve: supersede las rutas vivas del
    /// tenant y activa las nuevas, atómicamente.
    pub async fn reconcile(
        &self,
        tenant_id: Uuid,
        new_routes: Vec<Route>,
    ) -> AppResult<ReconcileSummary> {
        let summary = self.repository.reconcile_routes(tenant_id, new_routes).await?;

        log::info!(
            "🔄 Reconciliación tenant {}: {} rutas nuevas, {} superseded, {} pedidos asignados, {} revertidos",
            tenant_id,
            summary.created_routes,
            summary.superseded_routes,
            summary.assigned_orders,
            summary.reverted_orders
        );

        Ok(summary)
    }

    /// planned -> active (el vehículo salió)
    pub async fn activate(&self, route_id: Uuid) -> AppResult<Route> {
        self.repository.activate_route(route_id).await
    }

    /// active -> completed; los pedidos de la ruta quedan completed
    pub async fn complete(&self, route_id: Uuid) -> AppResult<Route> {
        self.repository.complete_route(route_id).await
    }

    /// Entrega individual confirmada
    pub async fn complete_order(&self, order_id: Uuid) -> AppResult<()> {
        self.repository.complete_order(order_id).await?;
        Ok(())
    }

    /// Query de solo lectura del estado de despacho
    pub async fn status(&self, tenant_id: Uuid) -> AppResult<DispatchStatus> {
        self.repository.dispatch_status(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Order, OrderStatus, Route, RouteStatus, Vehicle, VehicleStatus};
    use crate::repositories::InMemoryDispatchRepository;
    use chrono::Utc;

    fn order(tenant: Uuid, id: u128) -> Order {
        Order {
            id: Uuid::from_u128(id),
            tenant_id: tenant,
            depot_id: None,
            lat: 48.85,
            lng: 2.35,
            demand: 1.0,
            time_window_start: None,
            time_window_end: None,
            status: OrderStatus::Pending,
            route_id: None,
            created_at: Utc::now(),
        }
    }

    fn vehicle(tenant: Uuid, id: u128) -> Vehicle {
        Vehicle {
            id: Uuid::from_u128(id),
            tenant_id: tenant,
            capacity: 10.0,
            status: VehicleStatus::Available,
            current_lat: Some(48.85),
            current_lng: Some(2.35),
            position_at: Some(Utc::now()),
            depot_id: None,
            created_at: Utc::now(),
        }
    }

    fn route(tenant: Uuid, vehicle_id: Uuid, stops: Vec<Uuid>) -> Route {
        Route {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            vehicle_id,
            stops,
            total_distance_km: 12.0,
            total_duration_min: 40.0,
            geometry: Vec::new(),
            status: RouteStatus::Planned,
            degraded: false,
            enriched: false,
            created_at: Utc::now(),
        }
    }

    async fn seed() -> (Arc<InMemoryDispatchRepository>, RouteLifecycleManager, Uuid) {
        let repository = Arc::new(InMemoryDispatchRepository::new());
        let manager = RouteLifecycleManager::new(repository.clone());
        let tenant = Uuid::from_u128(77);

        repository.insert_vehicle(&vehicle(tenant, 500)).await.unwrap();
        for i in 1..=3u128 {
            repository.insert_order(&order(tenant, i)).await.unwrap();
        }
        (repository, manager, tenant)
    }

    #[tokio::test]
    async fn test_reconcile_assigns_orders() {
        let (repository, manager, tenant) = seed().await;
        let vehicle_id = Uuid::from_u128(500);

        let r1 = route(tenant, vehicle_id, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        let summary = manager.reconcile(tenant, vec![r1]).await.unwrap();

        assert_eq!(summary.created_routes, 1);
        assert_eq!(summary.assigned_orders, 2);

        let orders = repository.orders_by_tenant(tenant).await.unwrap();
        let assigned = orders.iter().filter(|o| o.status == OrderStatus::Assigned).count();
        assert_eq!(assigned, 2);
    }

    #[tokio::test]
    async fn test_supersession_scenario() {
        // Tick 1: R1 (planned) con [A, B]. A se entrega. Llega C.
        // Tick 2: R2 cubre [B, C]; R1 queda superseded y la consulta de
        // rutas vivas devuelve solo R2.
        let (repository, manager, tenant) = seed().await;
        let vehicle_id = Uuid::from_u128(500);
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));

        let r1 = route(tenant, vehicle_id, vec![a, b]);
        let r1_id = r1.id;
        manager.reconcile(tenant, vec![r1]).await.unwrap();
        manager.activate(r1_id).await.unwrap();

        // A entregado antes del siguiente tick
        manager.complete_order(a).await.unwrap();

        let r2 = route(tenant, vehicle_id, vec![b, c]);
        let r2_id = r2.id;
        manager.reconcile(tenant, vec![r2]).await.unwrap();

        let live = repository.live_routes(tenant).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, r2_id);

        // A sigue completado bajo su ruta histórica: nunca se reasigna
        let orders = repository.orders_by_tenant(tenant).await.unwrap();
        let order_a = orders.iter().find(|o| o.id == a).unwrap();
        assert_eq!(order_a.status, OrderStatus::Completed);
        assert_eq!(order_a.route_id, Some(r1_id));

        let order_b = orders.iter().find(|o| o.id == b).unwrap();
        assert_eq!(order_b.status, OrderStatus::Assigned);
        assert_eq!(order_b.route_id, Some(r2_id));
    }

    #[tokio::test]
    async fn test_reverted_orders_on_supersession() {
        let (repository, manager, tenant) = seed().await;
        let vehicle_id = Uuid::from_u128(500);

        let r1 = route(tenant, vehicle_id, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        manager.reconcile(tenant, vec![r1]).await.unwrap();

        // La ruta nueva solo cubre el pedido 2: el 1 vuelve a pending
        let r2 = route(tenant, vehicle_id, vec![Uuid::from_u128(2)]);
        let summary = manager.reconcile(tenant, vec![r2]).await.unwrap();

        assert_eq!(summary.superseded_routes, 1);
        assert_eq!(summary.reverted_orders, 2);
        assert_eq!(summary.assigned_orders, 1);

        let orders = repository.orders_by_tenant(tenant).await.unwrap();
        let order_1 = orders.iter().find(|o| o.id == Uuid::from_u128(1)).unwrap();
        assert_eq!(order_1.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let (_, manager, tenant) = seed().await;
        let vehicle_id = Uuid::from_u128(500);

        let r1 = route(tenant, vehicle_id, vec![Uuid::from_u128(1)]);
        let r1_id = r1.id;
        manager.reconcile(tenant, vec![r1]).await.unwrap();

        // planned -> completed es ilegal sin pasar por active
        assert!(manager.complete(r1_id).await.is_err());

        manager.activate(r1_id).await.unwrap();
        manager.complete(r1_id).await.unwrap();

        // completed -> active también
        assert!(manager.activate(r1_id).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_route_survives_reconciliation() {
        let (repository, manager, tenant) = seed().await;
        let vehicle_id = Uuid::from_u128(500);

        let r1 = route(tenant, vehicle_id, vec![Uuid::from_u128(1)]);
        let r1_id = r1.id;
        manager.reconcile(tenant, vec![r1]).await.unwrap();
        manager.activate(r1_id).await.unwrap();
        manager.complete(r1_id).await.unwrap();

        let r2 = route(tenant, vehicle_id, vec![Uuid::from_u128(2)]);
        manager.reconcile(tenant, vec![r2]).await.unwrap();

        let routes = repository.routes_by_tenant(tenant).await.unwrap();
        let completed = routes.iter().find(|r| r.id == r1_id).unwrap();
        // Una ruta completada nunca pasa a superseded
        assert_eq!(completed.status, RouteStatus::Completed);
    }
}
