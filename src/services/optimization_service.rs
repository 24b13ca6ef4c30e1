//! Servicio de optimización
//!
//! Orquesta un solve completo: valida el contrato de entrada, arma la
//! lista de puntos (depósito primero, luego arranques de vehículos,
//! luego pedidos), pide la matriz de costos, corre el solver y
//! materializa las rutas con su geometría y duraciones, opcionalmente
//! enriquecidas por el predictor ML.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::position::GeoPoint;
use crate::models::{Depot, Order, Route, RouteStatus, Vehicle};
use crate::services::eta_service::{EtaService, LegContext};
use crate::services::matrix_service::{CostMatrix, MatrixService};
use crate::services::solver::{
    RouteSolver, SolveInput, SolveMethod, SolveOptions, SolveOrder, SolveVehicle, SolvedRoute,
    UnassignedOrder,
};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation;

/// Comando de optimización con el contrato tipado del core
#[derive(Debug, Clone)]
pub struct OptimizeCommand {
    pub tenant_id: Uuid,
    pub orders: Vec<Order>,
    pub vehicles: Vec<Vehicle>,
    pub depot: Option<Depot>,
    pub method: SolveMethod,
    pub enrich_with_ml: bool,
    pub use_road_network: bool,
    pub avg_speed_kmph: Option<f64>,
    pub time_budget: Option<Duration>,
}

/// Resultado de un solve: siempre un objeto, nunca una excepción salvo
/// errores fatales de configuración
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub routes: Vec<Route>,
    pub unassigned: Vec<UnassignedOrder>,
    pub degraded: bool,
    pub enriched: bool,
    pub method: SolveMethod,
    pub solve_time_ms: u64,
}

/// Orquestador del solve
pub struct OptimizationService {
    matrix: MatrixService,
    eta: Arc<EtaService>,
}

impl OptimizationService {
    pub fn new(matrix: MatrixService, eta: Arc<EtaService>) -> Self {
        Self { matrix, eta }
    }

    /// Correr una optimización completa para un conjunto de pedidos y
    /// vehículos. Los pedidos no asignables se reportan con razón, nunca
    /// se descartan en silencio.
    pub async fn optimize(&self, cmd: OptimizeCommand) -> AppResult<OptimizationOutcome> {
        let started = Instant::now();

        validate_inputs(&cmd)?;

        if cmd.orders.is_empty() {
            return Ok(OptimizationOutcome {
                routes: Vec::new(),
                unassigned: Vec::new(),
                degraded: false,
                enriched: false,
                method: cmd.method,
                solve_time_ms: 0,
            });
        }

        log::info!(
            "🚚 Optimizando {} pedidos con {} vehículos para tenant {} ({:?})",
            cmd.orders.len(),
            cmd.vehicles.len(),
            cmd.tenant_id,
            cmd.method
        );

        // Depósito primero, arranques de vehículos después, pedidos al final
        let mut points: Vec<GeoPoint> = Vec::new();
        let depot_index = cmd.depot.as_ref().map(|depot| {
            points.push(depot.position());
            0usize
        });

        let mut solve_vehicles = Vec::with_capacity(cmd.vehicles.len());
        for vehicle in &cmd.vehicles {
            let start_index = match vehicle.current_position() {
                Some(position) => {
                    points.push(position);
                    points.len() - 1
                }
                None => match depot_index {
                    Some(index) => index,
                    // Sin posición en vivo ni depósito no hay desde dónde
                    // arrancar: el vehículo queda fuera de este solve
                    None => continue,
                },
            };
            solve_vehicles.push(SolveVehicle {
                id: vehicle.id,
                capacity: vehicle.capacity,
                start_index,
            });
        }

        // Error fatal de configuración, distinto de la infeasibilidad
        if solve_vehicles.is_empty() && depot_index.is_none() {
            return Err(AppError::DepotNotConfigured(format!(
                "tenant '{}' has orders but no depot and no positioned vehicles",
                cmd.tenant_id
            )));
        }

        let mut solve_orders = Vec::with_capacity(cmd.orders.len());
        for order in &cmd.orders {
            points.push(GeoPoint { lat: order.lat, lng: order.lng });
            solve_orders.push(SolveOrder {
                id: order.id,
                demand: order.demand,
                time_window_start: order.time_window_start,
                time_window_end: order.time_window_end,
                matrix_index: points.len() - 1,
            });
        }

        let matrix = self
            .matrix
            .compute_matrix(&points, cmd.use_road_network, cmd.avg_speed_kmph)
            .await;
        let degraded = matrix.degraded;

        let mut options = SolveOptions { departure_at: Utc::now(), ..SolveOptions::default() };
        if let Some(budget) = cmd.time_budget {
            options.time_budget = budget;
        }

        // El solver consume la matriz; los puntos quedan para la geometría
        let input = SolveInput {
            orders: solve_orders,
            vehicles: solve_vehicles.clone(),
            depot_index,
            distances_km: matrix.distances_km.clone(),
            durations_sec: matrix.durations_sec.clone(),
            options: options.clone(),
        };

        let output = RouteSolver::solve(input, cmd.method).await;

        let mut routes = Vec::with_capacity(output.routes.len());
        let mut enriched_all = cmd.enrich_with_ml && !output.routes.is_empty();

        for solved in &output.routes {
            let start_index = solve_vehicles
                .iter()
                .find(|v| v.id == solved.vehicle_id)
                .map(|v| v.start_index)
                .unwrap_or(0);

            let route = self
                .materialize_route(&cmd, solved, start_index, &points, &matrix, &options, depot_index, degraded)
                .await;
            if !route.enriched {
                enriched_all = false;
            }
            routes.push(route);
        }

        let solve_time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "✅ Solve terminado en {} ms: {} rutas, {} sin asignar{}",
            solve_time_ms,
            routes.len(),
            output.unassigned.len(),
            if degraded { " (modo degradado)" } else { "" }
        );

        Ok(OptimizationOutcome {
            routes,
            unassigned: output.unassigned,
            degraded,
            enriched: enriched_all,
            method: cmd.method,
            solve_time_ms,
        })
    }

    /// Convertir una ruta del solver en el modelo persistible, con
    /// geometría completa y duración por tramos
    #[allow(clippy::too_many_arguments)]
    async fn materialize_route(
        &self,
        cmd: &OptimizeCommand,
        solved: &SolvedRoute,
        start_index: usize,
        points: &[GeoPoint],
        matrix: &CostMatrix,
        options: &SolveOptions,
        depot_index: Option<usize>,
        degraded: bool,
    ) -> Route {
        // Camino completo en índices de matriz: arranque, paradas, retorno
        let mut path: Vec<usize> = Vec::with_capacity(solved.stops.len() + 2);
        path.push(start_index);
        for &stop in &solved.stops {
            // Los pedidos ocupan el final de la lista de puntos en orden
            let matrix_index = points.len() - cmd.orders.len() + stop;
            path.push(matrix_index);
        }
        if !options.open_routes {
            if let Some(depot) = depot_index {
                path.push(depot);
            }
        }

        let geometry: Vec<GeoPoint> = path.iter().map(|&i| points[i]).collect();

        // Duración por tramos, base o enriquecida por el predictor
        let legs: Vec<(f64, LegContext)> = path
            .windows(2)
            .map(|pair| {
                let base_min = matrix.durations_sec[pair[0]][pair[1]] / 60.0;
                (
                    base_min,
                    LegContext {
                        distance_km: matrix.distances_km[pair[0]][pair[1]],
                        departure_at: options.departure_at,
                        traffic: None,
                        weather: None,
                        cargo_class: None,
                    },
                )
            })
            .collect();

        let (total_duration_min, enriched) = if cmd.enrich_with_ml {
            let adjustments = self.eta.adjust_legs(&legs).await;
            let all_enriched = adjustments.iter().all(|a| a.enriched);
            let service_min = options.service_time_sec / 60.0 * solved.stops.len() as f64;
            let travel_min: f64 = adjustments.iter().map(|a| a.duration_min).sum();
            (travel_min + service_min, all_enriched)
        } else {
            (solved.total_duration_sec / 60.0, false)
        };

        Route {
            id: Uuid::new_v4(),
            tenant_id: cmd.tenant_id,
            vehicle_id: solved.vehicle_id,
            stops: solved.stops.iter().map(|&stop| cmd.orders[stop].id).collect(),
            total_distance_km: solved.total_distance_km,
            total_duration_min,
            geometry,
            status: RouteStatus::Planned,
            degraded,
            enriched,
            created_at: Utc::now(),
        }
    }
}

/// Rechazar entradas malformadas antes de que lleguen al solver
fn validate_inputs(cmd: &OptimizeCommand) -> AppResult<()> {
    for order in &cmd.orders {
        validation::validate_latitude(order.lat)
            .and_then(|_| validation::validate_longitude(order.lng))
            .and_then(|_| validation::validate_capacity(order.demand))
            .map_err(|_| {
                AppError::BadRequest(format!(
                    "order '{}' has invalid coordinates or demand",
                    order.id
                ))
            })?;
        validation::validate_time_window(&order.time_window_start, &order.time_window_end)
            .map_err(|_| {
                AppError::BadRequest(format!("order '{}' has an inverted time window", order.id))
            })?;
    }
    for vehicle in &cmd.vehicles {
        validation::validate_capacity(vehicle.capacity).map_err(|_| {
            AppError::BadRequest(format!("vehicle '{}' has invalid capacity", vehicle.id))
        })?;
        if let (Some(lat), Some(lng)) = (vehicle.current_lat, vehicle.current_lng) {
            validation::validate_latitude(lat)
                .and_then(|_| validation::validate_longitude(lng))
                .map_err(|_| {
                    AppError::BadRequest(format!(
                        "vehicle '{}' has an invalid position",
                        vehicle.id
                    ))
                })?;
        }
    }
    if let Some(depot) = &cmd.depot {
        validation::validate_latitude(depot.lat)
            .and_then(|_| validation::validate_longitude(depot.lng))
            .map_err(|_| AppError::BadRequest("depot has invalid coordinates".to_string()))?;
    }
    Ok(())
}
