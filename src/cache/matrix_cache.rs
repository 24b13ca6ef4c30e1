//! Caché de matrices de costos
//!
//! Las matrices OSRM se cachean en Redis con clave md5 sobre la lista de
//! coordenadas redondeadas. El scheduler recalcula cada tenant con puntos
//! casi idénticos entre ticks; el caché evita golpear OSRM en cada tick.
//! Solo se cachean matrices del camino primario, nunca las del fallback.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::redis_client::RedisClient;
use crate::cache::CacheOperations;
use crate::models::position::GeoPoint;

/// Precisión de redondeo para la clave: ~11 m en latitud
const KEY_COORD_PRECISION: f64 = 1e4;

/// Matriz serializada tal como se guarda en Redis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMatrix {
    pub distances_km: Vec<Vec<f64>>,
    pub durations_sec: Vec<Vec<f64>>,
}

/// Caché Redis de matrices OSRM
#[derive(Clone)]
pub struct MatrixCache {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl MatrixCache {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    /// Checksum md5 de la lista ordenada de coordenadas redondeadas
    pub fn checksum(points: &[GeoPoint]) -> String {
        let mut buffer = String::with_capacity(points.len() * 20);
        for p in points {
            let lat = (p.lat * KEY_COORD_PRECISION).round() / KEY_COORD_PRECISION;
            let lng = (p.lng * KEY_COORD_PRECISION).round() / KEY_COORD_PRECISION;
            buffer.push_str(&format!("{:.4},{:.4};", lat, lng));
        }
        format!("{:x}", md5::compute(buffer.as_bytes()))
    }

    /// Buscar una matriz cacheada; los errores de Redis se tratan como miss
    pub async fn get(&self, points: &[GeoPoint]) -> Option<CachedMatrix> {
        let key = self.redis.matrix_key(&Self::checksum(points));
        match self.redis.get::<CachedMatrix>(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                debug!("Caché de matrices ilegible ({}), tratado como miss", e);
                None
            }
        }
    }

    /// Guardar una matriz; fallar en silencio (el caché nunca es fatal)
    pub async fn put(&self, points: &[GeoPoint], matrix: &CachedMatrix) {
        let key = self.redis.matrix_key(&Self::checksum(points));
        if let Err(e) = self.redis.set(&key, matrix, self.ttl_seconds).await {
            debug!("No se pudo guardar matriz en caché: {}", e);
        }
    }
}
