//! Tests de integración del engine sobre el repositorio en memoria:
//! ciclo completo de despacho, invariantes del solver y atomicidad de
//! la supersesión ante lectores concurrentes.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use fleet_dispatch::config::EnvironmentConfig;
use fleet_dispatch::models::position::VehiclePosition;
use fleet_dispatch::models::{
    Depot, Order, OrderStatus, Route, RouteStatus, Vehicle, VehicleStatus,
};
use fleet_dispatch::repositories::{DispatchRepository, InMemoryDispatchRepository};
use fleet_dispatch::services::dispatch_scheduler::DispatchScheduler;
use fleet_dispatch::services::eta_service::EtaService;
use fleet_dispatch::services::live_location::LiveLocationStore;
use fleet_dispatch::services::matrix_service::MatrixService;
use fleet_dispatch::services::optimization_service::{OptimizationService, OptimizeCommand};
use fleet_dispatch::services::route_lifecycle::RouteLifecycleManager;
use fleet_dispatch::services::solver::SolveMethod;

fn offline_config() -> EnvironmentConfig {
    let mut config = EnvironmentConfig::default();
    config.osrm_base_url = "http://127.0.0.1:1".to_string();
    config.osrm_timeout_sec = 1;
    config.eta_service_url = None;
    config
}

fn optimization_service() -> Arc<OptimizationService> {
    let config = offline_config();
    let matrix = MatrixService::new(&config, None);
    let eta = Arc::new(EtaService::new(&config));
    Arc::new(OptimizationService::new(matrix, eta))
}

fn depot(tenant: Uuid) -> Depot {
    Depot {
        id: Uuid::from_u128(9000),
        tenant_id: tenant,
        lat: 0.0,
        lng: 0.0,
        service_radius_km: 100.0,
        daily_capacity: 1000,
        created_at: Utc::now(),
    }
}

fn order(tenant: Uuid, id: u128, lat: f64, lng: f64, demand: f64) -> Order {
    Order {
        id: Uuid::from_u128(id),
        tenant_id: tenant,
        depot_id: None,
        lat,
        lng,
        demand,
        time_window_start: None,
        time_window_end: None,
        status: OrderStatus::Pending,
        route_id: None,
        created_at: Utc::now(),
    }
}

fn vehicle(tenant: Uuid, id: u128, capacity: f64) -> Vehicle {
    Vehicle {
        id: Uuid::from_u128(id),
        tenant_id: tenant,
        capacity,
        status: VehicleStatus::Available,
        current_lat: None,
        current_lng: None,
        position_at: None,
        depot_id: None,
        created_at: Utc::now(),
    }
}

fn command(
    tenant: Uuid,
    orders: Vec<Order>,
    vehicles: Vec<Vehicle>,
    method: SolveMethod,
) -> OptimizeCommand {
    OptimizeCommand {
        tenant_id: tenant,
        orders,
        vehicles,
        depot: Some(depot(tenant)),
        method,
        enrich_with_ml: false,
        use_road_network: false,
        avg_speed_kmph: None,
        time_budget: Some(Duration::from_secs(2)),
    }
}

/// Invariante de capacidad y de partición para ambas estrategias
#[tokio::test]
async fn test_solver_invariants_both_strategies() {
    let tenant = Uuid::from_u128(1);
    let service = optimization_service();

    let orders = vec![
        order(tenant, 1, 0.010, 0.002, 2.0),
        order(tenant, 2, 0.020, -0.004, 1.0),
        order(tenant, 3, -0.015, 0.010, 3.0),
        order(tenant, 4, 0.005, 0.015, 1.5),
        order(tenant, 5, -0.008, -0.012, 2.5),
        order(tenant, 6, 0.030, 0.001, 1.0),
    ];
    let vehicles = vec![vehicle(tenant, 10, 4.0), vehicle(tenant, 11, 5.0)];

    for method in [SolveMethod::Fast, SolveMethod::Precise] {
        let outcome = service
            .optimize(command(tenant, orders.clone(), vehicles.clone(), method))
            .await
            .unwrap();

        let demand_of: HashMap<Uuid, f64> = orders.iter().map(|o| (o.id, o.demand)).collect();
        let capacity_of: HashMap<Uuid, f64> =
            vehicles.iter().map(|v| (v.id, v.capacity)).collect();

        // Capacidad: suma de demandas de cada ruta <= capacidad del vehículo
        for route in &outcome.routes {
            let total: f64 = route.stops.iter().map(|s| demand_of[s]).sum();
            assert!(
                total <= capacity_of[&route.vehicle_id] + 1e-9,
                "ruta {} viola capacidad ({:?})",
                route.id,
                method
            );
        }

        // Partición: cada pedido aparece exactamente una vez
        let mut seen: Vec<Uuid> = outcome
            .routes
            .iter()
            .flat_map(|r| r.stops.iter().copied())
            .chain(outcome.unassigned.iter().map(|u| u.order_id))
            .collect();
        seen.sort();
        let mut expected: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        expected.sort();
        assert_eq!(seen, expected, "pedido perdido o duplicado ({:?})", method);
    }
}

/// Re-correr el solver sobre el mismo input da la misma distancia total
#[tokio::test]
async fn test_idempotent_resolve() {
    let tenant = Uuid::from_u128(2);
    let service = optimization_service();

    let orders = vec![
        order(tenant, 1, 0.01, 0.0, 1.0),
        order(tenant, 2, 0.01, 0.01, 1.0),
        order(tenant, 3, -0.01, 0.0, 1.0),
        order(tenant, 4, 0.0, -0.01, 1.0),
    ];
    let vehicles = vec![vehicle(tenant, 10, 3.0), vehicle(tenant, 11, 3.0)];

    let first = service
        .optimize(command(tenant, orders.clone(), vehicles.clone(), SolveMethod::Fast))
        .await
        .unwrap();
    let second = service
        .optimize(command(tenant, orders, vehicles, SolveMethod::Fast))
        .await
        .unwrap();

    let total = |routes: &[Route]| -> f64 { routes.iter().map(|r| r.total_distance_km).sum() };
    assert!((total(&first.routes) - total(&second.routes)).abs() < 1e-9);
}

/// Ciclo completo: tick, activación, entrega parcial, pedido nuevo,
/// segundo tick con supersesión. La consulta de rutas vivas devuelve
/// solo la ruta nueva.
#[tokio::test]
async fn test_full_dispatch_cycle_with_supersession() {
    let repository = Arc::new(InMemoryDispatchRepository::new());
    let tenant = Uuid::from_u128(3);

    repository.insert_depot(&depot(tenant)).await.unwrap();
    repository.insert_vehicle(&vehicle(tenant, 10, 10.0)).await.unwrap();
    repository.insert_order(&order(tenant, 1, 0.01, 0.0, 1.0)).await.unwrap();
    repository.insert_order(&order(tenant, 2, 0.02, 0.0, 1.0)).await.unwrap();

    let config = offline_config();
    let optimization = optimization_service();
    let lifecycle = Arc::new(RouteLifecycleManager::new(repository.clone()));
    let live_locations = Arc::new(LiveLocationStore::new());
    let scheduler = DispatchScheduler::new(
        repository.clone(),
        optimization,
        lifecycle.clone(),
        live_locations.clone(),
        Duration::from_secs(config.reroute_interval_sec),
        Duration::from_millis(500),
        2,
    );

    // Tick 1: R1 planificada con [1, 2]
    scheduler.tick().await;
    let r1 = {
        let live = repository.live_routes(tenant).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].stops.len(), 2);
        live[0].clone()
    };

    // El vehículo sale y entrega el pedido 1
    lifecycle.activate(r1.id).await.unwrap();
    lifecycle.complete_order(Uuid::from_u128(1)).await.unwrap();

    // Pedido nuevo cerca de la posición en vivo del vehículo
    live_locations
        .update(VehiclePosition {
            tenant_id: tenant,
            vehicle_id: Uuid::from_u128(10),
            lat: 0.015,
            lng: 0.0,
            speed_kmph: Some(30.0),
            recorded_at: Utc::now(),
        })
        .await;
    repository.insert_order(&order(tenant, 3, 0.016, 0.0, 1.0)).await.unwrap();

    // Tick 2: R2 cubre [2, 3], R1 queda superseded
    scheduler.tick().await;

    let live = repository.live_routes(tenant).await.unwrap();
    assert_eq!(live.len(), 1, "solo la ruta nueva queda viva");
    assert_ne!(live[0].id, r1.id);

    let mut stops = live[0].stops.clone();
    stops.sort();
    assert_eq!(stops, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);

    // El pedido entregado jamás reaparece
    let orders = repository.orders_by_tenant(tenant).await.unwrap();
    let delivered = orders.iter().find(|o| o.id == Uuid::from_u128(1)).unwrap();
    assert_eq!(delivered.status, OrderStatus::Completed);

    let status = repository.dispatch_status(tenant).await.unwrap();
    assert_eq!(status.superseded_routes, 1);
    assert_eq!(status.planned_routes, 1);
}

/// Un lector que consulta en medio de reconciliaciones nunca observa dos
/// rutas vivas para el mismo vehículo
#[tokio::test]
async fn test_supersession_atomicity_under_concurrent_reads() {
    let repository = Arc::new(InMemoryDispatchRepository::new());
    let tenant = Uuid::from_u128(4);
    let vehicle_id = Uuid::from_u128(10);

    repository.insert_vehicle(&vehicle(tenant, 10, 10.0)).await.unwrap();
    for i in 1..=4u128 {
        repository.insert_order(&order(tenant, i, 0.01 * i as f64, 0.0, 1.0)).await.unwrap();
    }

    let lifecycle = Arc::new(RouteLifecycleManager::new(repository.clone()));
    let stop = Arc::new(AtomicBool::new(false));

    // Escritor: reconcilia en loop alternando pares de paradas
    let writer = {
        let lifecycle = lifecycle.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut flip = false;
            while !stop.load(Ordering::Relaxed) {
                let stops = if flip {
                    vec![Uuid::from_u128(1), Uuid::from_u128(2)]
                } else {
                    vec![Uuid::from_u128(3), Uuid::from_u128(4)]
                };
                flip = !flip;
                let route = Route {
                    id: Uuid::new_v4(),
                    tenant_id: tenant,
                    vehicle_id,
                    stops,
                    total_distance_km: 1.0,
                    total_duration_min: 10.0,
                    geometry: Vec::new(),
                    status: RouteStatus::Planned,
                    degraded: false,
                    enriched: false,
                    created_at: Utc::now(),
                };
                lifecycle.reconcile(tenant, vec![route]).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    // Lector: nunca debe ver dos rutas vivas del mismo vehículo
    for _ in 0..500 {
        let live = repository.live_routes(tenant).await.unwrap();
        let for_vehicle = live.iter().filter(|r| r.vehicle_id == vehicle_id).count();
        assert!(for_vehicle <= 1, "lector observó {} rutas vivas", for_vehicle);
        tokio::task::yield_now().await;
    }

    stop.store(true, Ordering::Relaxed);
    writer.await.unwrap();
}

/// El fallback haversine mantiene al solver produciendo soluciones
/// válidas con el backend vial caído en todas las llamadas
#[tokio::test]
async fn test_degraded_mode_end_to_end() {
    let tenant = Uuid::from_u128(5);
    let service = optimization_service();

    let orders = vec![
        order(tenant, 1, 0.01, 0.0, 1.0),
        order(tenant, 2, 0.02, 0.0, 1.0),
        order(tenant, 3, 0.03, 0.0, 1.0),
    ];
    let mut cmd = command(tenant, orders, vec![vehicle(tenant, 10, 5.0)], SolveMethod::Precise);
    cmd.use_road_network = true; // OSRM va a fallar en cada llamada

    let outcome = service.optimize(cmd).await.unwrap();

    assert!(outcome.degraded);
    assert_eq!(outcome.routes.len(), 1);
    assert!(outcome.unassigned.is_empty());
    assert!(outcome.routes[0].total_distance_km > 0.0);
}
