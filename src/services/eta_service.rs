//! Servicio de estimación de duraciones (enriquecimiento ML)
//!
//! Dado el tiempo base de un tramo, consulta al predictor externo por una
//! estimación ajustada al contexto (hora, clima, congestión, tipo de
//! carga). Si el predictor está caído, poco confiado o marca el input
//! como fuera de distribución, el tiempo base pasa sin modificar y la
//! ruta queda marcada como no enriquecida. Este componente nunca bloquea
//! la construcción de rutas ni convierte su indisponibilidad en error.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::PredictionCache;
use crate::config::EnvironmentConfig;

/// Contexto de un tramo para el predictor
#[derive(Debug, Clone)]
pub struct LegContext {
    pub distance_km: f64,
    pub departure_at: DateTime<Utc>,
    pub traffic: Option<String>,
    pub weather: Option<String>,
    pub cargo_class: Option<String>,
}

/// Ajuste devuelto por tramo
#[derive(Debug, Clone, Copy)]
pub struct EtaAdjustment {
    pub duration_min: f64,
    pub confidence: f64,
    /// false cuando el predictor no aportó nada y pasó el tiempo base
    pub enriched: bool,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    base_duration_min: f64,
    distance_km: f64,
    hour: u32,
    day_of_week: u32,
    is_weekend: bool,
    traffic: Option<String>,
    weather: Option<String>,
    cargo_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predicted_min: f64,
    confidence: f64,
    #[serde(default)]
    out_of_distribution: bool,
}

/// Cliente del predictor ML con cache acotado de predicciones
pub struct EtaService {
    url: Option<String>,
    confidence_threshold: f64,
    client: reqwest::Client,
    cache: Arc<PredictionCache>,
}

impl EtaService {
    pub fn new(config: &EnvironmentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.eta_timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            url: config.eta_service_url.clone(),
            confidence_threshold: config.eta_confidence_threshold,
            client,
            cache: Arc::new(PredictionCache::new(
                config.eta_cache_max_entries,
                config.eta_cache_ttl_sec,
            )),
        }
    }

    pub fn cache(&self) -> Arc<PredictionCache> {
        self.cache.clone()
    }

    /// Ajustar la duración base de un tramo. Toda falla degrada a
    /// passthrough del tiempo base, nunca a error.
    pub async fn adjust_leg(&self, base_duration_min: f64, ctx: &LegContext) -> EtaAdjustment {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => return passthrough(base_duration_min),
        };

        let key = cache_key(base_duration_min, ctx);
        if let Some((duration_min, confidence)) = self.cache.get(&key).await {
            return EtaAdjustment { duration_min, confidence, enriched: true };
        }

        let request = PredictRequest {
            base_duration_min,
            distance_km: ctx.distance_km,
            hour: ctx.departure_at.hour(),
            day_of_week: ctx.departure_at.weekday().num_days_from_monday(),
            is_weekend: ctx.departure_at.weekday().num_days_from_monday() >= 5,
            traffic: ctx.traffic.clone(),
            weather: ctx.weather.clone(),
            cargo_class: ctx.cargo_class.clone(),
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("⚠️ Predictor ML inalcanzable ({}), usando duración base", e);
                return passthrough(base_duration_min);
            }
        };

        if !response.status().is_success() {
            log::warn!(
                "⚠️ Predictor ML respondió {}, usando duración base",
                response.status()
            );
            return passthrough(base_duration_min);
        }

        let prediction: PredictResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                log::warn!("⚠️ Respuesta del predictor ilegible ({}), usando duración base", e);
                return passthrough(base_duration_min);
            }
        };

        if prediction.out_of_distribution {
            log::warn!("⚠️ Predictor marcó el tramo como out-of-distribution, usando duración base");
            return passthrough(base_duration_min);
        }

        if prediction.confidence < self.confidence_threshold
            || !prediction.predicted_min.is_finite()
            || prediction.predicted_min <= 0.0
        {
            return passthrough(base_duration_min);
        }

        self.cache.set(&key, prediction.predicted_min, prediction.confidence).await;

        EtaAdjustment {
            duration_min: prediction.predicted_min,
            confidence: prediction.confidence,
            enriched: true,
        }
    }

    /// Ajustar un lote de tramos en paralelo. La longitud de salida
    /// siempre iguala a la de entrada; cada falla degrada solo su tramo.
    pub async fn adjust_legs(&self, legs: &[(f64, LegContext)]) -> Vec<EtaAdjustment> {
        let futures = legs.iter().map(|(base, ctx)| self.adjust_leg(*base, ctx));
        futures::future::join_all(futures).await
    }
}

fn passthrough(base_duration_min: f64) -> EtaAdjustment {
    EtaAdjustment { duration_min: base_duration_min, confidence: 0.0, enriched: false }
}

/// Clave de cache por contexto discretizado (décima de km + hora)
fn cache_key(base_duration_min: f64, ctx: &LegContext) -> String {
    format!(
        "{:.1}|{:.1}|{}|{}|{}|{}|{}",
        base_duration_min,
        ctx.distance_km,
        ctx.departure_at.hour(),
        ctx.departure_at.weekday().num_days_from_monday(),
        ctx.traffic.as_deref().unwrap_or("-"),
        ctx.weather.as_deref().unwrap_or("-"),
        ctx.cargo_class.as_deref().unwrap_or("-"),
    )
}
