//! Registro concurrente de posiciones en vivo
//!
//! Última posición conocida por (tenant, vehículo), escrita por muchos
//! productores concurrentes de updates y leída por el scheduler de
//! rerouting. Sharding por hash para escrituras de alta frecuencia con
//! baja contención: cada update toca un solo shard y los snapshots solo
//! copian referencias bajo read-locks por shard, nunca trabajo de solver
//! bajo un lock.
//!
//! Las posiciones se resuelven last-write-wins por timestamp del GPS, no
//! por orden de llegada: un update fuera de orden se descarta. Las
//! entradas no expiran; los vehículos offline se filtran al armar el
//! snapshot del scheduler, no acá.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::position::VehiclePosition;

const SHARD_COUNT: usize = 16;
/// Historial acotado por vehículo
const HISTORY_LEN: usize = 50;

#[derive(Debug)]
struct LiveEntry {
    position: VehiclePosition,
    history: VecDeque<VehiclePosition>,
}

type Shard = RwLock<HashMap<(Uuid, Uuid), LiveEntry>>;

/// Store shardeado de posiciones en vivo
pub struct LiveLocationStore {
    shards: Vec<Shard>,
}

impl LiveLocationStore {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect();
        Self { shards }
    }

    fn shard_for(&self, tenant_id: Uuid, vehicle_id: Uuid) -> &Shard {
        let mut hasher = DefaultHasher::new();
        (tenant_id, vehicle_id).hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Aplicar una actualización de posición. Devuelve false si se
    /// descartó por ser más vieja que la última conocida (idempotente
    /// ante reentregas y entregas fuera de orden).
    pub async fn update(&self, position: VehiclePosition) -> bool {
        let key = (position.tenant_id, position.vehicle_id);
        let shard = self.shard_for(position.tenant_id, position.vehicle_id);
        let mut entries = shard.write().await;

        match entries.get_mut(&key) {
            Some(entry) => {
                if position.recorded_at <= entry.position.recorded_at {
                    return false;
                }
                entry.history.push_back(entry.position.clone());
                if entry.history.len() > HISTORY_LEN {
                    entry.history.pop_front();
                }
                entry.position = position;
                true
            }
            None => {
                entries.insert(key, LiveEntry { position, history: VecDeque::new() });
                true
            }
        }
    }

    /// Última posición conocida de un vehículo
    pub async fn get(&self, tenant_id: Uuid, vehicle_id: Uuid) -> Option<VehiclePosition> {
        let shard = self.shard_for(tenant_id, vehicle_id);
        let entries = shard.read().await;
        entries.get(&(tenant_id, vehicle_id)).map(|e| e.position.clone())
    }

    /// Vista puntual consistente de todas las posiciones de un tenant.
    /// Solo copia entradas bajo read-locks por shard.
    pub async fn snapshot(&self, tenant_id: Uuid) -> HashMap<Uuid, VehiclePosition> {
        let mut result = HashMap::new();
        for shard in &self.shards {
            let entries = shard.read().await;
            for ((tenant, vehicle), entry) in entries.iter() {
                if *tenant == tenant_id {
                    result.insert(*vehicle, entry.position.clone());
                }
            }
        }
        result
    }

    /// Últimas posiciones históricas de un vehículo, la más nueva al final
    pub async fn history(
        &self,
        tenant_id: Uuid,
        vehicle_id: Uuid,
        limit: usize,
    ) -> Vec<VehiclePosition> {
        let shard = self.shard_for(tenant_id, vehicle_id);
        let entries = shard.read().await;
        match entries.get(&(tenant_id, vehicle_id)) {
            Some(entry) => {
                let mut positions: Vec<VehiclePosition> =
                    entry.history.iter().cloned().collect();
                positions.push(entry.position.clone());
                let skip = positions.len().saturating_sub(limit);
                positions.split_off(skip)
            }
            None => Vec::new(),
        }
    }

    /// Cantidad total de vehículos registrados
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }
}

impl Default for LiveLocationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumidor del canal de ingesta de posiciones: drena updates hacia el
/// store hasta que todos los productores cierren el canal.
pub fn spawn_position_ingest(
    store: std::sync::Arc<LiveLocationStore>,
    mut rx: tokio::sync::mpsc::Receiver<VehiclePosition>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(position) = rx.recv().await {
            store.update(position).await;
        }
        log::info!("📡 Canal de ingesta de posiciones cerrado");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn position(tenant: u128, vehicle: u128, lat: f64, offset_sec: i64) -> VehiclePosition {
        VehiclePosition {
            tenant_id: Uuid::from_u128(tenant),
            vehicle_id: Uuid::from_u128(vehicle),
            lat,
            lng: 2.35,
            speed_kmph: Some(32.0),
            recorded_at: Utc::now() + Duration::seconds(offset_sec),
        }
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let store = LiveLocationStore::new();
        assert!(store.update(position(1, 1, 48.85, 0)).await);

        let current = store.get(Uuid::from_u128(1), Uuid::from_u128(1)).await;
        assert!(current.is_some());
        assert_eq!(current.unwrap().lat, 48.85);
    }

    #[tokio::test]
    async fn test_last_write_wins_by_timestamp() {
        let store = LiveLocationStore::new();
        assert!(store.update(position(1, 1, 48.85, 10)).await);

        // Update más viejo entregado después: se descarta
        assert!(!store.update(position(1, 1, 40.0, 5)).await);
        // Mismo timestamp reentregado: no-op
        assert!(!store.update(position(1, 1, 40.0, 10)).await);

        let current = store.get(Uuid::from_u128(1), Uuid::from_u128(1)).await.unwrap();
        assert_eq!(current.lat, 48.85);
    }

    #[tokio::test]
    async fn test_snapshot_filters_by_tenant() {
        let store = LiveLocationStore::new();
        store.update(position(1, 1, 48.0, 0)).await;
        store.update(position(1, 2, 48.1, 0)).await;
        store.update(position(2, 3, 50.0, 0)).await;

        let snapshot = store.snapshot(Uuid::from_u128(1)).await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key(&Uuid::from_u128(1)));
        assert!(snapshot.contains_key(&Uuid::from_u128(2)));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let store = LiveLocationStore::new();
        for i in 0..(HISTORY_LEN as i64 + 20) {
            store.update(position(1, 1, 48.0 + i as f64 * 0.001, i)).await;
        }

        let history = store.history(Uuid::from_u128(1), Uuid::from_u128(1), 1000).await;
        assert!(history.len() <= HISTORY_LEN + 1);

        let last_two: Vec<f64> = history.iter().rev().take(2).map(|p| p.lat).collect();
        assert!(last_two[0] > last_two[1]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let store = Arc::new(LiveLocationStore::new());
        let mut handles = Vec::new();

        // 20 vehículos, 10 updates concurrentes cada uno
        for vehicle in 0..20u128 {
            for tick in 0..10i64 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.update(position(7, vehicle, 48.0, tick)).await;
                }));
            }
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        let snapshot = store.snapshot(Uuid::from_u128(7)).await;
        assert_eq!(snapshot.len(), 20);
        // Cada vehículo terminó con su update de timestamp máximo
        for (_, pos) in snapshot {
            assert_eq!(
                pos.recorded_at,
                store
                    .history(pos.tenant_id, pos.vehicle_id, 1000)
                    .await
                    .last()
                    .unwrap()
                    .recorded_at
            );
        }
    }
}
