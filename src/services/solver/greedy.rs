//! Estrategia golosa (fast)
//!
//! Inserción nearest-neighbor: cada vehículo toma repetidamente el pedido
//! factible más cercano (capacidad restante + ventana de tiempo) hasta
//! agotar candidatos, luego pasa el turno al siguiente vehículo. Solución
//! rápida y de menor calidad, sin presupuesto de tiempo.
//!
//! Las ventanas de tiempo violadas se descartan y reportan como
//! `time_window_infeasible`, nunca se planifican best-effort.

use super::{
    build_route, candidate_beats, classify_unassigned, deadline_sec, ready_sec, SolveInput,
    SolveOutput, CAP_EPS,
};

/// Resolver con nearest-neighbor capacitado
pub fn solve(input: &SolveInput) -> SolveOutput {
    let n = input.orders.len();
    let mut assigned = vec![false; n];
    let mut output = SolveOutput::default();

    if n == 0 {
        return output;
    }

    let departure = input.options.departure_at;

    for vehicle in &input.vehicles {
        let mut current = vehicle.start_index;
        let mut load = 0.0;
        let mut time = 0.0;
        let mut stops: Vec<usize> = Vec::new();

        loop {
            // Candidato factible más cercano desde la posición actual
            let mut best: Option<(usize, f64)> = None;

            for (i, order) in input.orders.iter().enumerate() {
                if assigned[i] {
                    continue;
                }
                if load + order.demand > vehicle.capacity + CAP_EPS {
                    continue;
                }

                let dist = input.distances_km[current][order.matrix_index];
                let travel = input.durations_sec[current][order.matrix_index];
                if !dist.is_finite() || !travel.is_finite() {
                    continue;
                }

                let mut arrival = time + travel;
                if let Some(ready) = ready_sec(order, departure) {
                    if arrival < ready {
                        arrival = ready;
                    }
                }
                if let Some(deadline) = deadline_sec(order, departure) {
                    if arrival > deadline {
                        continue;
                    }
                }

                let beats = match best {
                    None => true,
                    Some((best_idx, best_dist)) => {
                        candidate_beats(input, i, dist, best_idx, best_dist)
                    }
                };
                if beats {
                    best = Some((i, dist));
                }
            }

            match best {
                Some((next, _)) => {
                    let order = &input.orders[next];
                    let travel = input.durations_sec[current][order.matrix_index];
                    let mut arrival = time + travel;
                    if let Some(ready) = ready_sec(order, departure) {
                        if arrival < ready {
                            arrival = ready;
                        }
                    }

                    assigned[next] = true;
                    stops.push(next);
                    load += order.demand;
                    time = arrival + input.options.service_time_sec;
                    current = order.matrix_index;
                }
                None => break,
            }
        }

        if !stops.is_empty() {
            if let Some(route) = build_route(input, vehicle, stops) {
                output.routes.push(route);
            }
        }

        if assigned.iter().all(|&a| a) {
            break;
        }
    }

    for i in 0..n {
        if !assigned[i] {
            output.unassigned.push(classify_unassigned(input, i));
        }
    }

    output
}
