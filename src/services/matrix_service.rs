//! Servicio de matrices de costos
//!
//! Este módulo calcula matrices NxN de distancia (km) y duración (s)
//! entre una lista ordenada de coordenadas. Camino primario: la Table
//! API de OSRM con timeout acotado. Camino de fallback: distancia
//! great-circle con velocidad media asumida. El fallback es
//! determinista, produce una matriz de la misma forma y se registra
//! como evento de modo degradado: la operación siempre devuelve una
//! matriz usable, nunca un error al caller.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::{CachedMatrix, MatrixCache};
use crate::config::EnvironmentConfig;
use crate::models::position::GeoPoint;
use crate::utils::geo;

/// Origen de la matriz devuelta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixSource {
    Osrm,
    Haversine,
}

/// Matriz de costos lista para el solver
#[derive(Debug, Clone)]
pub struct CostMatrix {
    pub distances_km: Vec<Vec<f64>>,
    pub durations_sec: Vec<Vec<f64>>,
    /// true si se cayó al fallback por falla o timeout del backend
    pub degraded: bool,
    pub source: MatrixSource,
}

impl CostMatrix {
    pub fn size(&self) -> usize {
        self.distances_km.len()
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: String,
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

/// Proveedor de matrices con OSRM primario y fallback haversine
#[derive(Clone)]
pub struct MatrixService {
    base_url: String,
    profile: String,
    max_points: usize,
    avg_speed_kmph: f64,
    client: reqwest::Client,
    cache: Option<MatrixCache>,
}

impl MatrixService {
    pub fn new(config: &EnvironmentConfig, cache: Option<MatrixCache>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.osrm_timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.osrm_base_url.trim_end_matches('/').to_string(),
            profile: config.osrm_profile.clone(),
            max_points: config.osrm_max_points,
            avg_speed_kmph: config.fallback_avg_speed_kmph,
            client,
            cache,
        }
    }

    /// Calcular la matriz de costos para una lista de puntos.
    ///
    /// Nunca falla: ante timeout, error del backend o exceso de puntos
    /// devuelve la matriz haversine marcada como degradada.
    pub async fn compute_matrix(
        &self,
        points: &[GeoPoint],
        use_road_network: bool,
        avg_speed_override: Option<f64>,
    ) -> CostMatrix {
        let avg_speed = avg_speed_override.unwrap_or(self.avg_speed_kmph);

        if points.is_empty() {
            return CostMatrix {
                distances_km: Vec::new(),
                durations_sec: Vec::new(),
                degraded: false,
                source: MatrixSource::Haversine,
            };
        }

        // Camino haversine pedido explícitamente: no es degradación
        if !use_road_network {
            return self.haversine_matrix(points, avg_speed, false);
        }

        if points.len() > self.max_points {
            log::warn!(
                "⚠️ OSRM max points excedido ({} > {}), usando fallback haversine",
                points.len(),
                self.max_points
            );
            return self.haversine_matrix(points, avg_speed, true);
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(points).await {
                return CostMatrix {
                    distances_km: hit.distances_km,
                    durations_sec: hit.durations_sec,
                    degraded: false,
                    source: MatrixSource::Osrm,
                };
            }
        }

        match self.osrm_table(points).await {
            Ok((distances_km, durations_sec)) => {
                if let Some(cache) = &self.cache {
                    let cached = CachedMatrix {
                        distances_km: distances_km.clone(),
                        durations_sec: durations_sec.clone(),
                    };
                    cache.put(points, &cached).await;
                }
                CostMatrix {
                    distances_km,
                    durations_sec,
                    degraded: false,
                    source: MatrixSource::Osrm,
                }
            }
            Err(e) => {
                // Evento de modo degradado: se registra, no se propaga
                log::warn!("⚠️ OSRM no disponible ({}), usando fallback haversine", e);
                self.haversine_matrix(points, avg_speed, true)
            }
        }
    }

    /// Pedir la tabla de distancias/duraciones a OSRM
    async fn osrm_table(&self, points: &[GeoPoint]) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let coords = points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!("{}/table/v1/{}/{}", self.base_url, self.profile, coords);

        log::info!("🗺️ Pidiendo tabla OSRM para {} puntos", points.len());

        let response = self
            .client
            .get(&url)
            .query(&[("annotations", "duration,distance")])
            .header("User-Agent", "FleetDispatch/1.0")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OSRM error {}: {}", status, error_text));
        }

        let table: OsrmTableResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Error parsing OSRM response: {}", e))?;

        if table.code != "Ok" {
            return Err(anyhow!("OSRM response code: {}", table.code));
        }

        let distances_m = table.distances.ok_or_else(|| anyhow!("OSRM returned no distances"))?;
        let durations_s = table.durations.ok_or_else(|| anyhow!("OSRM returned no durations"))?;

        if distances_m.len() != points.len() || durations_s.len() != points.len() {
            return Err(anyhow!("OSRM returned a matrix of unexpected shape"));
        }

        // Pares no ruteables llegan como null: se vuelven infinito y el
        // solver los clasifica como unreachable
        let distances_km = distances_m
            .into_iter()
            .map(|row| row.into_iter().map(|m| m.map(|v| v / 1000.0).unwrap_or(f64::INFINITY)).collect())
            .collect();
        let durations_sec = durations_s
            .into_iter()
            .map(|row| row.into_iter().map(|s| s.unwrap_or(f64::INFINITY)).collect())
            .collect();

        Ok((distances_km, durations_sec))
    }

    fn haversine_matrix(&self, points: &[GeoPoint], avg_speed: f64, degraded: bool) -> CostMatrix {
        let distances_km = geo::haversine_matrix(points);
        let durations_sec = geo::durations_from_distances(&distances_km, avg_speed);
        CostMatrix { distances_km, durations_sec, degraded, source: MatrixSource::Haversine }
    }
}
