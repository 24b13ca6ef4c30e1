//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de
//! configuración del engine: OSRM, predictor ML, rerouting dinámico.

use std::env;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    // OSRM (tiempos reales de red vial)
    pub osrm_base_url: String,
    pub osrm_profile: String,
    pub osrm_timeout_sec: u64,
    pub osrm_max_points: usize,
    /// Velocidad media asumida por el fallback haversine (km/h)
    pub fallback_avg_speed_kmph: f64,
    // Rerouting dinámico
    pub reroute_enabled: bool,
    pub reroute_interval_sec: u64,
    pub reroute_time_budget_sec: u64,
    pub reroute_max_concurrent_tenants: usize,
    // Predictor ML de duraciones
    pub eta_service_url: Option<String>,
    pub eta_timeout_sec: u64,
    pub eta_confidence_threshold: f64,
    pub eta_cache_max_entries: usize,
    pub eta_cache_ttl_sec: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            port: env_or("PORT", 3000),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            osrm_base_url: env::var("OSRM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            osrm_profile: env::var("OSRM_PROFILE").unwrap_or_else(|_| "driving".to_string()),
            osrm_timeout_sec: env_or("OSRM_TIMEOUT_SEC", 10),
            osrm_max_points: env_or("OSRM_MAX_POINTS", 100),
            fallback_avg_speed_kmph: env_or("OSRM_FALLBACK_AVG_SPEED_KMPH", 30.0),
            reroute_enabled: env_or("REROUTE_ENABLED", true),
            reroute_interval_sec: env_or("REROUTE_INTERVAL_SEC", 60),
            reroute_time_budget_sec: env_or("REROUTE_TIME_BUDGET_SEC", 10),
            reroute_max_concurrent_tenants: env_or("REROUTE_MAX_CONCURRENT_TENANTS", 4),
            eta_service_url: env::var("ETA_SERVICE_URL").ok(),
            eta_timeout_sec: env_or("ETA_TIMEOUT_SEC", 5),
            eta_confidence_threshold: env_or("ETA_CONFIDENCE_THRESHOLD", 0.5),
            eta_cache_max_entries: env_or("ETA_CACHE_MAX_ENTRIES", 10000),
            eta_cache_ttl_sec: env_or("ETA_CACHE_TTL_SEC", 900),
        }
    }
}

impl EnvironmentConfig {
    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
