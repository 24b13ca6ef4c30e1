//! Services module
//!
//! Este módulo contiene la lógica de negocio del engine: matrices de
//! costos, enriquecimiento ML, solver, posiciones en vivo, scheduler de
//! despacho y ciclo de vida de rutas.

pub mod dispatch_scheduler;
pub mod eta_service;
pub mod live_location;
pub mod matrix_service;
pub mod optimization_service;
pub mod route_lifecycle;
pub mod solver;

pub use dispatch_scheduler::DispatchScheduler;
pub use eta_service::EtaService;
pub use live_location::LiveLocationStore;
pub use matrix_service::{CostMatrix, MatrixService, MatrixSource};
pub use optimization_service::{OptimizationOutcome, OptimizationService, OptimizeCommand};
pub use route_lifecycle::RouteLifecycleManager;
