//! Utilidades geográficas
//!
//! Funciones de distancia great-circle usadas por el fallback del
//! proveedor de matrices y por los chequeos de radio de servicio.

use crate::models::position::GeoPoint;

/// Radio medio de la Tierra en kilómetros
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distancia haversine entre dos puntos en kilómetros
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Matriz simétrica de distancias haversine (km) para una lista de puntos
pub fn haversine_matrix(points: &[GeoPoint]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = haversine_km(&points[i], &points[j]);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }

    matrix
}

/// Derivar duraciones (segundos) de una matriz de distancias asumiendo
/// una velocidad media constante en km/h
pub fn durations_from_distances(distances_km: &[Vec<f64>], avg_speed_kmph: f64) -> Vec<Vec<f64>> {
    distances_km
        .iter()
        .map(|row| {
            row.iter()
                .map(|km| {
                    if km.is_finite() {
                        km / avg_speed_kmph * 3600.0
                    } else {
                        f64::INFINITY
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint { lat: 48.8566, lng: 2.3522 };
        assert!(haversine_km(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_paris_lyon() {
        // Paris -> Lyon, ~392 km a vuelo de pájaro
        let paris = GeoPoint { lat: 48.8566, lng: 2.3522 };
        let lyon = GeoPoint { lat: 45.7640, lng: 4.8357 };
        let d = haversine_km(&paris, &lyon);
        assert!(d > 380.0 && d < 400.0, "distancia inesperada: {}", d);
    }

    #[test]
    fn test_matrix_symmetric_with_zero_diagonal() {
        let points = vec![
            GeoPoint { lat: 0.0, lng: 0.0 },
            GeoPoint { lat: 0.0, lng: 1.0 },
            GeoPoint { lat: 1.0, lng: 1.0 },
        ];
        let m = haversine_matrix(&points);
        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert_eq!(m[i][i], 0.0);
            for j in 0..3 {
                assert!((m[i][j] - m[j][i]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_durations_from_distances() {
        let distances = vec![vec![0.0, 30.0], vec![30.0, 0.0]];
        let durations = durations_from_distances(&distances, 30.0);
        // 30 km a 30 km/h = 1 hora
        assert!((durations[0][1] - 3600.0).abs() < 1e-6);
        assert_eq!(durations[0][0], 0.0);
    }
}
