//! Estrategia precisa (búsqueda bajo presupuesto)
//!
//! Algoritmo anytime: construcción golosa seguida de mejora local
//! (2-opt dentro de cada ruta, relocate entre rutas y reinserción de
//! pendientes) hasta agotar el presupuesto de tiempo o converger. Puede
//! cortarse en cualquier momento y siempre devuelve la mejor solución
//! encontrada; nunca propaga un timeout al caller.
//!
//! Todo es determinista: los movimientos se exploran en orden fijo de
//! índices con aceptación first-improvement, así el mismo input produce
//! la misma salida mientras el presupuesto alcance para converger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{
    build_route, classify_unassigned, greedy, simulate, SolveInput, SolveOutput, DIST_EPS,
};

/// Resolver bajo presupuesto. `deadline` y `cancel` cortan la búsqueda;
/// el resultado es siempre la mejor solución factible hallada hasta ahí.
pub fn solve(input: &SolveInput, deadline: Instant, cancel: &AtomicBool) -> SolveOutput {
    // Fase 0: construcción golosa como punto de partida
    let base = greedy::solve(input);

    if input.orders.is_empty() || input.vehicles.is_empty() {
        return base;
    }

    // Rutas alineadas con input.vehicles, pendientes como índices de pedido
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); input.vehicles.len()];
    for solved in &base.routes {
        if let Some(vi) = input.vehicles.iter().position(|v| v.id == solved.vehicle_id) {
            routes[vi] = solved.stops.clone();
        }
    }
    let mut unassigned: Vec<usize> = base
        .unassigned
        .iter()
        .filter_map(|u| input.orders.iter().position(|o| o.id == u.order_id))
        .collect();
    unassigned.sort_unstable();

    // Fase 1: intentar colocar pendientes por mejor inserción
    insert_unassigned_pass(input, &mut routes, &mut unassigned, deadline, cancel);

    // Fase 2: mejora local hasta converger o agotar presupuesto
    let mut improved = true;
    while improved && !expired(deadline, cancel) {
        improved = false;

        if two_opt_pass(input, &mut routes, deadline, cancel) {
            improved = true;
        }
        if relocate_pass(input, &mut routes, deadline, cancel) {
            improved = true;
        }
        if insert_unassigned_pass(input, &mut routes, &mut unassigned, deadline, cancel) {
            improved = true;
        }
    }

    finalize(input, routes, unassigned)
}

fn expired(deadline: Instant, cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::Relaxed) || Instant::now() >= deadline
}

fn route_distance(input: &SolveInput, vehicle_idx: usize, stops: &[usize]) -> Option<f64> {
    simulate(input, &input.vehicles[vehicle_idx], stops).map(|sim| sim.distance_km)
}

/// Reinsertar pendientes: para cada pedido pendiente busca la posición
/// factible de menor costo agregado en cualquier ruta. Devuelve true si
/// colocó al menos uno.
fn insert_unassigned_pass(
    input: &SolveInput,
    routes: &mut [Vec<usize>],
    unassigned: &mut Vec<usize>,
    deadline: Instant,
    cancel: &AtomicBool,
) -> bool {
    let mut any_inserted = false;

    loop {
        let mut best: Option<(usize, usize, usize, f64)> = None; // (pendiente, vehículo, posición, delta)

        for (u_pos, &order_idx) in unassigned.iter().enumerate() {
            if expired(deadline, cancel) {
                break;
            }
            for vi in 0..routes.len() {
                let current_dist = match route_distance(input, vi, &routes[vi]) {
                    Some(d) => d,
                    None => continue,
                };
                for pos in 0..=routes[vi].len() {
                    let mut candidate = routes[vi].clone();
                    candidate.insert(pos, order_idx);
                    if let Some(new_dist) = route_distance(input, vi, &candidate) {
                        let delta = new_dist - current_dist;
                        let beats = match best {
                            None => true,
                            Some((_, _, _, best_delta)) => delta < best_delta - DIST_EPS,
                        };
                        if beats {
                            best = Some((u_pos, vi, pos, delta));
                        }
                    }
                }
            }
        }

        match best {
            Some((u_pos, vi, pos, _)) => {
                let order_idx = unassigned.remove(u_pos);
                routes[vi].insert(pos, order_idx);
                any_inserted = true;
            }
            None => break,
        }

        if expired(deadline, cancel) {
            break;
        }
    }

    any_inserted
}

/// 2-opt dentro de cada ruta: revierte el segmento [i..=j] si el
/// resultado es factible y más corto. First-improvement.
fn two_opt_pass(
    input: &SolveInput,
    routes: &mut [Vec<usize>],
    deadline: Instant,
    cancel: &AtomicBool,
) -> bool {
    let mut any_improved = false;

    for vi in 0..routes.len() {
        if routes[vi].len() < 2 {
            continue;
        }

        let mut improved = true;
        while improved && !expired(deadline, cancel) {
            improved = false;
            let current_dist = match route_distance(input, vi, &routes[vi]) {
                Some(d) => d,
                None => break,
            };

            'scan: for i in 0..routes[vi].len() - 1 {
                for j in (i + 1)..routes[vi].len() {
                    if expired(deadline, cancel) {
                        break 'scan;
                    }
                    let mut candidate = routes[vi].clone();
                    candidate[i..=j].reverse();
                    if let Some(new_dist) = route_distance(input, vi, &candidate) {
                        if new_dist < current_dist - DIST_EPS {
                            routes[vi] = candidate;
                            improved = true;
                            any_improved = true;
                            break 'scan;
                        }
                    }
                }
            }
        }
    }

    any_improved
}

/// Relocate entre rutas: mueve una parada de una ruta a la mejor posición
/// de otra si baja la distancia total del par. First-improvement.
fn relocate_pass(
    input: &SolveInput,
    routes: &mut [Vec<usize>],
    deadline: Instant,
    cancel: &AtomicBool,
) -> bool {
    let mut any_improved = false;
    let n_routes = routes.len();

    let mut improved = true;
    while improved && !expired(deadline, cancel) {
        improved = false;

        'scan: for from in 0..n_routes {
            for to in 0..n_routes {
                if from == to || routes[from].is_empty() {
                    continue;
                }
                let from_dist = match route_distance(input, from, &routes[from]) {
                    Some(d) => d,
                    None => continue,
                };
                let to_dist = match route_distance(input, to, &routes[to]) {
                    Some(d) => d,
                    None => continue,
                };

                for stop_pos in 0..routes[from].len() {
                    for insert_pos in 0..=routes[to].len() {
                        if expired(deadline, cancel) {
                            break 'scan;
                        }
                        let mut new_from = routes[from].clone();
                        let moved = new_from.remove(stop_pos);
                        let mut new_to = routes[to].clone();
                        new_to.insert(insert_pos, moved);

                        let new_from_dist = match route_distance(input, from, &new_from) {
                            Some(d) => d,
                            None => continue,
                        };
                        let new_to_dist = match route_distance(input, to, &new_to) {
                            Some(d) => d,
                            None => continue,
                        };

                        if new_from_dist + new_to_dist < from_dist + to_dist - DIST_EPS {
                            routes[from] = new_from;
                            routes[to] = new_to;
                            improved = true;
                            any_improved = true;
                            break 'scan;
                        }
                    }
                }
            }
        }
    }

    any_improved
}

/// Materializar la salida final a partir del estado de búsqueda
fn finalize(input: &SolveInput, routes: Vec<Vec<usize>>, unassigned: Vec<usize>) -> SolveOutput {
    let mut output = SolveOutput::default();

    for (vi, stops) in routes.into_iter().enumerate() {
        if stops.is_empty() {
            continue;
        }
        if let Some(route) = build_route(input, &input.vehicles[vi], stops) {
            output.routes.push(route);
        }
    }

    let mut pending = unassigned;
    pending.sort_unstable();
    for order_idx in pending {
        output.unassigned.push(classify_unassigned(input, order_idx));
    }

    output
}
