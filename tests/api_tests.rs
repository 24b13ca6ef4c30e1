//! Tests de la API sobre el router real con el repositorio en memoria.
//! Los backends externos (OSRM, predictor ML) apuntan a puertos cerrados:
//! todo corre por los caminos de fallback.

use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use fleet_dispatch::api::create_api_router;
use fleet_dispatch::config::EnvironmentConfig;
use fleet_dispatch::repositories::InMemoryDispatchRepository;
use fleet_dispatch::services::eta_service::EtaService;
use fleet_dispatch::services::live_location::{spawn_position_ingest, LiveLocationStore};
use fleet_dispatch::services::matrix_service::MatrixService;
use fleet_dispatch::services::optimization_service::OptimizationService;
use fleet_dispatch::services::route_lifecycle::RouteLifecycleManager;
use fleet_dispatch::state::AppState;

fn create_test_app() -> Router {
    let mut config = EnvironmentConfig::default();
    config.osrm_base_url = "http://127.0.0.1:1".to_string();
    config.osrm_timeout_sec = 1;
    config.eta_service_url = None;

    let repository = Arc::new(InMemoryDispatchRepository::new());
    let matrix = MatrixService::new(&config, None);
    let eta = Arc::new(EtaService::new(&config));
    let optimization = Arc::new(OptimizationService::new(matrix, eta));
    let lifecycle = Arc::new(RouteLifecycleManager::new(repository.clone()));
    let live_locations = Arc::new(LiveLocationStore::new());

    let (position_tx, position_rx) = mpsc::channel(64);
    spawn_position_ingest(live_locations.clone(), position_rx);

    let state = AppState::new(
        config,
        repository,
        optimization,
        lifecycle,
        live_locations,
        position_tx,
    );

    create_api_router().with_state(state)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_optimize_basic_assignment() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(1);

    let (status, body) = post_json(
        &app,
        "/api/dispatch/optimize",
        json!({
            "tenant_id": tenant,
            "orders": [
                { "lat": 0.01, "lng": 0.0, "demand": 1.0 },
                { "lat": 0.02, "lng": 0.0, "demand": 1.0 },
                { "lat": 0.03, "lng": 0.0, "demand": 1.0 }
            ],
            "vehicles": [ { "capacity": 5.0 } ],
            "depot": { "lat": 0.0, "lng": 0.0 },
            "method": "fast",
            "use_road_network": false,
            "enrich_with_ml": false
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"].as_array().unwrap().len(), 1);
    assert_eq!(body["routes"][0]["stops"].as_array().unwrap().len(), 3);
    assert_eq!(body["unassigned"].as_array().unwrap().len(), 0);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn test_optimize_capacity_overflow_reports_reasons() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(2);

    let (status, body) = post_json(
        &app,
        "/api/dispatch/optimize",
        json!({
            "tenant_id": tenant,
            "orders": [
                { "lat": 0.01, "lng": 0.0, "demand": 1.0 },
                { "lat": 0.02, "lng": 0.0, "demand": 1.0 },
                { "lat": 0.03, "lng": 0.0, "demand": 1.0 }
            ],
            "vehicles": [ { "capacity": 2.0 } ],
            "depot": { "lat": 0.0, "lng": 0.0 },
            "method": "fast",
            "use_road_network": false
        }),
    )
    .await;

    // Siempre 200 con objeto resultado, la infeasibilidad no es excepción
    assert_eq!(status, StatusCode::OK);
    let unassigned = body["unassigned"].as_array().unwrap();
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0]["reason"], "no_capacity");
}

#[tokio::test]
async fn test_optimize_degraded_mode_flag() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(3);

    let (status, body) = post_json(
        &app,
        "/api/dispatch/optimize",
        json!({
            "tenant_id": tenant,
            "orders": [ { "lat": 0.01, "lng": 0.0, "demand": 1.0 } ],
            "vehicles": [ { "capacity": 5.0 } ],
            "depot": { "lat": 0.0, "lng": 0.0 },
            "method": "fast",
            "use_road_network": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], true);
    assert_eq!(body["routes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_optimize_rejects_invalid_coordinates() {
    let app = create_test_app();

    let (status, _) = post_json(
        &app,
        "/api/dispatch/optimize",
        json!({
            "tenant_id": Uuid::from_u128(4),
            "orders": [ { "lat": 123.0, "lng": 0.0, "demand": 1.0 } ],
            "vehicles": [ { "capacity": 5.0 } ],
            "depot": { "lat": 0.0, "lng": 0.0 }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_optimize_without_depot_is_fatal_config_error() {
    let app = create_test_app();

    let (status, body) = post_json(
        &app,
        "/api/dispatch/optimize",
        json!({
            "tenant_id": Uuid::from_u128(5),
            "orders": [ { "lat": 0.01, "lng": 0.0, "demand": 1.0 } ],
            "vehicles": [ { "capacity": 5.0 } ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "DEPOT_NOT_CONFIGURED");
}

#[tokio::test]
async fn test_order_intake_and_listing() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(6);

    let (status, created) = post_json(
        &app,
        "/api/orders",
        json!({ "tenant_id": tenant, "lat": 48.85, "lng": 2.35, "demand": 2.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], "pending");

    let (status, listed) = get_json(&app, &format!("/api/orders/{}", tenant)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_intake_rejects_bad_demand() {
    let app = create_test_app();

    let (status, _) = post_json(
        &app,
        "/api/orders",
        json!({ "tenant_id": Uuid::from_u128(7), "lat": 48.85, "lng": 2.35, "demand": -1.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_position_ingestion_roundtrip() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(8);
    let vehicle = Uuid::from_u128(80);

    let (status, body) = post_json(
        &app,
        "/api/positions/update",
        json!({
            "tenant_id": tenant,
            "vehicle_id": vehicle,
            "lat": 48.85,
            "lng": 2.35,
            "speed_kmph": 28.5
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    // La ingesta es asíncrona vía canal: darle un momento al consumidor
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let (status, snapshot) = get_json(&app, &format!("/api/positions/{}", tenant)).await;
    assert_eq!(status, StatusCode::OK);
    let vehicles = snapshot["vehicles"].as_array().unwrap();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0]["vehicle_id"], vehicle.to_string());
}

#[tokio::test]
async fn test_dispatch_status_empty_tenant() {
    let app = create_test_app();

    let (status, body) =
        get_json(&app, &format!("/api/dispatch/status/{}", Uuid::from_u128(9))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending_orders"], 0);
    assert_eq!(body["planned_routes"], 0);
    assert!(body["last_reconciliation_at"].is_null());
}

#[tokio::test]
async fn test_fleet_registration() {
    let app = create_test_app();
    let tenant = Uuid::from_u128(10);

    let (status, vehicle) = post_json(
        &app,
        "/api/fleet/vehicles",
        json!({ "tenant_id": tenant, "capacity": 12.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicle["status"], "available");

    let (status, depot) = post_json(
        &app,
        "/api/fleet/depots",
        json!({
            "tenant_id": tenant,
            "lat": 48.85,
            "lng": 2.35,
            "service_radius_km": 30.0,
            "daily_capacity": 500
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(depot["id"].is_string());

    let (status, vehicles) = get_json(&app, &format!("/api/fleet/vehicles/{}", tenant)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vehicles.as_array().unwrap().len(), 1);
}
