//! Cache
//!
//! Este módulo contiene los sistemas de cache: el cliente Redis, el
//! caché de matrices OSRM y el cache acotado de predicciones ML.

pub mod matrix_cache;
pub mod prediction_cache;
pub mod redis_client;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

pub use matrix_cache::{CachedMatrix, MatrixCache};
pub use prediction_cache::{PredictionCache, PredictionCacheStats};
pub use redis_client::RedisClient;

/// Configuración del cache
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    pub default_ttl: u64,
    pub max_connections: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            default_ttl: 3600, // 1 hora
            max_connections: 10,
        }
    }
}

/// Operaciones de cache
#[async_trait::async_trait]
pub trait CacheOperations {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: u64) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}
