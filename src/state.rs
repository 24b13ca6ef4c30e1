//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum: repositorio, servicios del engine y el
//! canal de ingesta de posiciones.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::environment::EnvironmentConfig;
use crate::models::position::VehiclePosition;
use crate::repositories::DispatchRepository;
use crate::services::live_location::LiveLocationStore;
use crate::services::optimization_service::OptimizationService;
use crate::services::route_lifecycle::RouteLifecycleManager;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub repository: Arc<dyn DispatchRepository>,
    pub optimization: Arc<OptimizationService>,
    pub lifecycle: Arc<RouteLifecycleManager>,
    pub live_locations: Arc<LiveLocationStore>,
    /// Canal de ingesta hacia el LiveLocationStore
    pub position_tx: mpsc::Sender<VehiclePosition>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        repository: Arc<dyn DispatchRepository>,
        optimization: Arc<OptimizationService>,
        lifecycle: Arc<RouteLifecycleManager>,
        live_locations: Arc<LiveLocationStore>,
        position_tx: mpsc::Sender<VehiclePosition>,
    ) -> Self {
        Self { config, repository, optimization, lifecycle, live_locations, position_tx }
    }
}
