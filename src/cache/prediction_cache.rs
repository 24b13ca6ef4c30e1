//! Cache acotado de predicciones ML
//!
//! Cache en memoria para las respuestas del predictor de duraciones,
//! con política de expulsión explícita (tamaño máximo + TTL, LRU).
//! Es un componente inyectable propiedad del EtaService, nunca estado
//! global ambiente.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Predicción cacheada con metadatos
#[derive(Debug, Clone)]
pub struct CachedPrediction {
    pub duration_min: f64,
    pub confidence: f64,
    created_at: u64,
    last_accessed: u64,
}

/// Estadísticas del cache
#[derive(Debug, Default, Clone)]
pub struct PredictionCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries_created: u64,
    pub entries_expired: u64,
    pub entries_evicted: u64,
}

/// Cache TTL + LRU de predicciones
pub struct PredictionCache {
    entries: RwLock<HashMap<String, CachedPrediction>>,
    max_entries: usize,
    ttl_seconds: u64,
    stats: RwLock<PredictionCacheStats>,
}

impl PredictionCache {
    pub fn new(max_entries: usize, ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            ttl_seconds,
            stats: RwLock::new(PredictionCacheStats::default()),
        }
    }

    /// Obtener una predicción del cache
    pub async fn get(&self, key: &str) -> Option<(f64, f64)> {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        let now = current_timestamp();

        match entries.get_mut(key) {
            Some(cached) => {
                if now.saturating_sub(cached.created_at) > self.ttl_seconds {
                    entries.remove(key);
                    stats.entries_expired += 1;
                    stats.misses += 1;
                    debug!("Cache miss (expired) para clave: {}", key);
                    return None;
                }

                cached.last_accessed = now;
                stats.hits += 1;
                Some((cached.duration_min, cached.confidence))
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Guardar una predicción en cache
    pub async fn set(&self, key: &str, duration_min: f64, confidence: f64) {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        let now = current_timestamp();

        // Hacer espacio expulsando la entrada menos usada
        if entries.len() >= self.max_entries {
            evict_lru(&mut entries, &mut stats);
        }

        entries.insert(
            key.to_string(),
            CachedPrediction { duration_min, confidence, created_at: now, last_accessed: now },
        );
        stats.entries_created += 1;
    }

    /// Limpiar entradas expiradas
    pub async fn cleanup_expired(&self) -> u64 {
        let mut entries = self.entries.write().await;
        let mut stats = self.stats.write().await;
        let now = current_timestamp();

        let initial_size = entries.len();
        entries.retain(|_, cached| now.saturating_sub(cached.created_at) <= self.ttl_seconds);

        let cleaned = (initial_size - entries.len()) as u64;
        stats.entries_expired += cleaned;
        if cleaned > 0 {
            info!("Cache cleanup: {} predicciones expiradas eliminadas", cleaned);
        }
        cleaned
    }

    /// Obtener estadísticas del cache
    pub async fn stats(&self) -> PredictionCacheStats {
        self.stats.read().await.clone()
    }

    /// Tamaño actual del cache
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn evict_lru(entries: &mut HashMap<String, CachedPrediction>, stats: &mut PredictionCacheStats) {
    let oldest_key = entries
        .iter()
        .min_by_key(|(_, cached)| cached.last_accessed)
        .map(|(key, _)| key.clone());

    if let Some(key) = oldest_key {
        entries.remove(&key);
        stats.entries_evicted += 1;
        debug!("Entrada LRU eliminada: {}", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = PredictionCache::new(10, 3600);

        cache.set("leg-1", 42.0, 0.9).await;

        let cached = cache.get("leg-1").await;
        assert!(cached.is_some());
        let (duration, confidence) = cached.unwrap();
        assert_eq!(duration, 42.0);
        assert_eq!(confidence, 0.9);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries_created, 1);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = PredictionCache::new(10, 3600);
        assert!(cache.get("unknown").await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_cache_lru_eviction() {
        let cache = PredictionCache::new(2, 3600);

        cache.set("a", 1.0, 0.5).await;
        cache.set("b", 2.0, 0.5).await;
        // "a" queda como la menos usada y debe salir
        cache.set("c", 3.0, 0.5).await;

        assert_eq!(cache.size().await, 2);
        assert_eq!(cache.stats().await.entries_evicted, 1);
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        // TTL de cero: toda entrada nace expirada al segundo siguiente
        let cache = PredictionCache::new(10, 0);
        cache.set("x", 1.0, 0.5).await;
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(cache.get("x").await.is_none());
        assert_eq!(cache.stats().await.entries_expired, 1);
    }
}
