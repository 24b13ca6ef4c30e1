//! Solver de rutas
//!
//! Dos estrategias intercambiables sobre el mismo contrato:
//!
//! - `search` (precise): construcción golosa + búsqueda local bajo un
//!   presupuesto de tiempo, comportamiento anytime.
//! - `greedy` (fast): inserción nearest-neighbor con chequeo de capacidad
//!   y ventanas de tiempo, sin presupuesto.
//!
//! El solver trabaja sobre índices de la matriz de costos precalculada;
//! no conoce OSRM ni la base de datos. Todo pedido de entrada termina o
//! en la lista de paradas de una ruta o en la lista de no asignados con
//! una razón legible por máquina, nunca se descarta en silencio.

pub mod greedy;
pub mod search;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tolerancia al comparar distancias para el desempate determinista
pub(crate) const DIST_EPS: f64 = 1e-9;
/// Tolerancia de capacidad para evitar falsos rechazos por redondeo
pub(crate) const CAP_EPS: f64 = 1e-9;

/// Método de resolución expuesto en la API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveMethod {
    Precise,
    Fast,
}

/// Razón por la que un pedido quedó sin asignar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    NoCapacity,
    Unreachable,
    TimeWindowInfeasible,
}

/// Pedido no asignado con su razón
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassignedOrder {
    pub order_id: Uuid,
    pub reason: UnassignedReason,
}

/// Pedido en formato solver, con su índice en la matriz de costos
#[derive(Debug, Clone)]
pub struct SolveOrder {
    pub id: Uuid,
    pub demand: f64,
    pub time_window_start: Option<DateTime<Utc>>,
    pub time_window_end: Option<DateTime<Utc>>,
    pub matrix_index: usize,
}

/// Vehículo en formato solver: capacidad y posición de arranque
#[derive(Debug, Clone)]
pub struct SolveVehicle {
    pub id: Uuid,
    pub capacity: f64,
    pub start_index: usize,
}

/// Opciones del solve
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub time_budget: Duration,
    /// true = las rutas no vuelven al depósito
    pub open_routes: bool,
    /// Tiempo de servicio por parada en segundos
    pub service_time_sec: f64,
    /// Hora de salida asumida para evaluar ventanas de tiempo
    pub departure_at: DateTime<Utc>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(10),
            open_routes: false,
            service_time_sec: 300.0, // 5 min por entrega
            departure_at: Utc::now(),
        }
    }
}

/// Entrada completa del solver
#[derive(Debug, Clone)]
pub struct SolveInput {
    pub orders: Vec<SolveOrder>,
    pub vehicles: Vec<SolveVehicle>,
    /// Índice del depósito de retorno en la matriz, si hay
    pub depot_index: Option<usize>,
    pub distances_km: Vec<Vec<f64>>,
    pub durations_sec: Vec<Vec<f64>>,
    pub options: SolveOptions,
}

/// Ruta resuelta: paradas como índices sobre `input.orders`
#[derive(Debug, Clone)]
pub struct SolvedRoute {
    pub vehicle_id: Uuid,
    pub stops: Vec<usize>,
    pub total_distance_km: f64,
    pub total_duration_sec: f64,
}

/// Salida del solver
#[derive(Debug, Clone, Default)]
pub struct SolveOutput {
    pub routes: Vec<SolvedRoute>,
    pub unassigned: Vec<UnassignedOrder>,
}

impl SolveOutput {
    pub fn assigned_count(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }

    pub fn total_distance_km(&self) -> f64 {
        self.routes.iter().map(|r| r.total_distance_km).sum()
    }
}

/// Fachada del solver: despacha a la estrategia pedida
pub struct RouteSolver;

impl RouteSolver {
    /// Resolver con la estrategia indicada. `Precise` corre en
    /// `spawn_blocking` bajo su presupuesto de tiempo; si el task
    /// blocking muere, se degrada a la estrategia golosa.
    pub async fn solve(input: SolveInput, method: SolveMethod) -> SolveOutput {
        match method {
            SolveMethod::Fast => greedy::solve(&input),
            SolveMethod::Precise => {
                let fallback_input = input.clone();
                let budget = input.options.time_budget;
                let handle = tokio::task::spawn_blocking(move || {
                    let deadline = Instant::now() + budget;
                    let cancel = AtomicBool::new(false);
                    search::solve(&input, deadline, &cancel)
                });
                match handle.await {
                    Ok(output) => output,
                    Err(e) => {
                        log::error!("❌ Solver preciso abortado ({}), usando estrategia golosa", e);
                        greedy::solve(&fallback_input)
                    }
                }
            }
        }
    }
}

/// Deadline de la ventana de tiempo en segundos desde la salida
pub(crate) fn deadline_sec(order: &SolveOrder, departure_at: DateTime<Utc>) -> Option<f64> {
    order.time_window_end.map(|end| (end - departure_at).num_milliseconds() as f64 / 1000.0)
}

/// Apertura de la ventana de tiempo en segundos desde la salida
pub(crate) fn ready_sec(order: &SolveOrder, departure_at: DateTime<Utc>) -> Option<f64> {
    order.time_window_start.map(|start| (start - departure_at).num_milliseconds() as f64 / 1000.0)
}

/// Desempate determinista entre dos candidatos a misma distancia:
/// gana la ventana con deadline más temprano, y a igualdad el id menor.
pub(crate) fn candidate_beats(
    input: &SolveInput,
    candidate: usize,
    candidate_dist: f64,
    best: usize,
    best_dist: f64,
) -> bool {
    if (candidate_dist - best_dist).abs() > DIST_EPS {
        return candidate_dist < best_dist;
    }
    let departure = input.options.departure_at;
    let dl_candidate =
        deadline_sec(&input.orders[candidate], departure).unwrap_or(f64::INFINITY);
    let dl_best = deadline_sec(&input.orders[best], departure).unwrap_or(f64::INFINITY);
    if (dl_candidate - dl_best).abs() > DIST_EPS {
        return dl_candidate < dl_best;
    }
    input.orders[candidate].id.as_bytes() < input.orders[best].id.as_bytes()
}

/// Resultado de simular una secuencia de paradas
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouteSim {
    pub distance_km: f64,
    pub duration_sec: f64,
}

/// Simular una secuencia de paradas para un vehículo: valida capacidad y
/// ventanas de tiempo (con espera hasta la apertura) y devuelve los
/// totales. El tramo de retorno al depósito queda fuera del chequeo de
/// capacidad pero dentro de los totales.
pub(crate) fn simulate(
    input: &SolveInput,
    vehicle: &SolveVehicle,
    stops: &[usize],
) -> Option<RouteSim> {
    if stops.is_empty() {
        return Some(RouteSim { distance_km: 0.0, duration_sec: 0.0 });
    }

    let mut current = vehicle.start_index;
    let mut load = 0.0;
    let mut time = 0.0;
    let mut distance = 0.0;
    let departure = input.options.departure_at;

    for &stop in stops {
        let order = &input.orders[stop];

        load += order.demand;
        if load > vehicle.capacity + CAP_EPS {
            return None;
        }

        let travel = input.durations_sec[current][order.matrix_index];
        let leg = input.distances_km[current][order.matrix_index];
        if !travel.is_finite() || !leg.is_finite() {
            return None;
        }

        let mut arrival = time + travel;
        if let Some(ready) = ready_sec(order, departure) {
            if arrival < ready {
                arrival = ready; // esperar a que abra la ventana
            }
        }
        if let Some(deadline) = deadline_sec(order, departure) {
            if arrival > deadline {
                return None;
            }
        }

        distance += leg;
        time = arrival + input.options.service_time_sec;
        current = order.matrix_index;
    }

    // Tramo de retorno
    if !input.options.open_routes {
        if let Some(depot) = input.depot_index {
            let back_dist = input.distances_km[current][depot];
            let back_time = input.durations_sec[current][depot];
            if !back_dist.is_finite() || !back_time.is_finite() {
                return None;
            }
            distance += back_dist;
            time += back_time;
        }
    }

    Some(RouteSim { distance_km: distance, duration_sec: time })
}

/// Construir la ruta resuelta a partir de una secuencia ya validada
pub(crate) fn build_route(
    input: &SolveInput,
    vehicle: &SolveVehicle,
    stops: Vec<usize>,
) -> Option<SolvedRoute> {
    let sim = simulate(input, vehicle, &stops)?;
    Some(SolvedRoute {
        vehicle_id: vehicle.id,
        stops,
        total_distance_km: sim.distance_km,
        total_duration_sec: sim.duration_sec,
    })
}

/// Clasificar un pedido no asignado con la razón más específica posible
pub(crate) fn classify_unassigned(input: &SolveInput, order_idx: usize) -> UnassignedOrder {
    let order = &input.orders[order_idx];
    let departure = input.options.departure_at;

    // Inalcanzable: ningún arco finito desde ningún punto de arranque
    let reachable = input.vehicles.iter().any(|v| {
        input.distances_km[v.start_index][order.matrix_index].is_finite()
            && input.durations_sec[v.start_index][order.matrix_index].is_finite()
    });
    if !reachable && !input.vehicles.is_empty() {
        return UnassignedOrder { order_id: order.id, reason: UnassignedReason::Unreachable };
    }

    // Ventana imposible: ni yendo directo desde el arranque se llega
    if let Some(deadline) = deadline_sec(order, departure) {
        let direct_feasible = input.vehicles.iter().any(|v| {
            let travel = input.durations_sec[v.start_index][order.matrix_index];
            travel.is_finite() && travel <= deadline
        });
        if !direct_feasible {
            return UnassignedOrder {
                order_id: order.id,
                reason: UnassignedReason::TimeWindowInfeasible,
            };
        }
    }

    UnassignedOrder { order_id: order.id, reason: UnassignedReason::NoCapacity }
}
