use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use dotenvy::dotenv;

use fleet_dispatch::api;
use fleet_dispatch::cache::{CacheConfig, MatrixCache, RedisClient};
use fleet_dispatch::config::environment::EnvironmentConfig;
use fleet_dispatch::config::database;
use fleet_dispatch::repositories::{DispatchRepository, PgDispatchRepository};
use fleet_dispatch::services::dispatch_scheduler::DispatchScheduler;
use fleet_dispatch::services::eta_service::EtaService;
use fleet_dispatch::services::live_location::{spawn_position_ingest, LiveLocationStore};
use fleet_dispatch::services::matrix_service::MatrixService;
use fleet_dispatch::services::optimization_service::OptimizationService;
use fleet_dispatch::services::route_lifecycle::RouteLifecycleManager;
use fleet_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚚 Fleet Dispatch - Engine de optimización y despacho dinámico");
    info!("==============================================================");

    let config = EnvironmentConfig::default();

    // Inicializar base de datos
    let pool = match database::create_pool(None).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };

    // Inicializar Redis para el caché de matrices
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let redis_config = CacheConfig { redis_url, default_ttl: 300, max_connections: 10 };

    let redis_client = match RedisClient::new(redis_config).await {
        Ok(client) => client,
        Err(e) => {
            error!("❌ Error conectando a Redis: {}", e);
            return Err(anyhow::anyhow!("Error de Redis: {}", e));
        }
    };
    let matrix_cache = MatrixCache::new(redis_client.clone(), redis_client.default_ttl());

    // Armar los servicios del engine
    let repository: Arc<dyn DispatchRepository> = Arc::new(PgDispatchRepository::new(pool));
    let matrix_service = MatrixService::new(&config, Some(matrix_cache));
    let eta_service = Arc::new(EtaService::new(&config));
    let optimization = Arc::new(OptimizationService::new(matrix_service, eta_service));
    let lifecycle = Arc::new(RouteLifecycleManager::new(repository.clone()));
    let live_locations = Arc::new(LiveLocationStore::new());

    // Canal de ingesta de posiciones
    let (position_tx, position_rx) = mpsc::channel(4096);
    let ingest_handle = spawn_position_ingest(live_locations.clone(), position_rx);

    // Scheduler de reruteo dinámico con señal de apagado limpia
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.reroute_enabled {
        let scheduler = DispatchScheduler::new(
            repository.clone(),
            optimization.clone(),
            lifecycle.clone(),
            live_locations.clone(),
            Duration::from_secs(config.reroute_interval_sec),
            Duration::from_secs(config.reroute_time_budget_sec),
            config.reroute_max_concurrent_tenants,
        );
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        info!("⏸️ Reruteo dinámico deshabilitado por configuración");
        None
    };

    // Crear router de la API
    let app_state = AppState::new(
        config.clone(),
        repository,
        optimization,
        lifecycle,
        live_locations,
        position_tx,
    );

    let app = Router::new()
        .route("/health", get(health_endpoint))
        .merge(api::create_api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🚚 Endpoints de despacho:");
    info!("   POST /api/dispatch/optimize - Optimización síncrona");
    info!("   GET  /api/dispatch/status/:tenant_id - Estado de despacho");
    info!("   GET  /api/dispatch/routes/:tenant_id - Rutas del tenant");
    info!("   POST /api/dispatch/routes/:route_id/activate - Activar ruta");
    info!("   POST /api/dispatch/routes/:route_id/complete - Completar ruta");
    info!("📍 Endpoints de posiciones:");
    info!("   POST /api/positions/update - Update de posición");
    info!("   POST /api/positions/batch - Updates en lote");
    info!("   GET  /api/positions/:tenant_id - Snapshot por tenant");
    info!("   GET  /api/positions/:tenant_id/:vehicle_id/history - Historial");
    info!("📦 Endpoints de intake:");
    info!("   POST /api/orders - Crear pedido");
    info!("   GET  /api/orders/:tenant_id - Listar pedidos");
    info!("   POST /api/orders/:order_id/complete - Completar pedido");
    info!("   POST /api/fleet/vehicles - Crear vehículo");
    info!("   GET  /api/fleet/vehicles/:tenant_id - Listar vehículos");
    info!("   POST /api/fleet/depots - Crear depósito");
    info!("   GET  /api/fleet/depots/:tenant_id - Listar depósitos");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    // Apagar el scheduler y el ingestor antes de salir
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    ingest_handle.abort();

    info!("👋 Servidor terminado");
    Ok(())
}

/// Health check del servicio
async fn health_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "service": "fleet-dispatch",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
