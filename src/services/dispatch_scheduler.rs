//! Scheduler de despacho dinámico
//!
//! Tarea de fondo supervisada que recalcula rutas por tenant a cadencia
//! fija usando los pedidos abiertos y las posiciones en vivo, y
//! reconcilia el resultado contra las rutas emitidas antes. Aislamiento
//! por tenant: la falla de un tenant se loguea y no toca a los demás ni
//! tumba el loop. Dos ticks del mismo tenant nunca corren en paralelo;
//! el paralelismo entre tenants está acotado por un semáforo para no
//! saturar al proveedor de matrices.

use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::services::optimization_service::{OptimizationService, OptimizeCommand};
use crate::services::route_lifecycle::RouteLifecycleManager;
use crate::services::solver::SolveMethod;
use crate::services::live_location::LiveLocationStore;
use crate::repositories::DispatchRepository;
use crate::utils::errors::AppResult;

/// Scheduler periódico de reruteo
pub struct DispatchScheduler {
    repository: Arc<dyn DispatchRepository>,
    optimization: Arc<OptimizationService>,
    lifecycle: Arc<RouteLifecycleManager>,
    live_locations: Arc<LiveLocationStore>,
    interval: Duration,
    time_budget: Duration,
    tenant_parallelism: Arc<Semaphore>,
    tenant_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl DispatchScheduler {
    pub fn new(
        repository: Arc<dyn DispatchRepository>,
        optimization: Arc<OptimizationService>,
        lifecycle: Arc<RouteLifecycleManager>,
        live_locations: Arc<LiveLocationStore>,
        interval: Duration,
        time_budget: Duration,
        max_concurrent_tenants: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            repository,
            optimization,
            lifecycle,
            live_locations,
            interval,
            time_budget,
            tenant_parallelism: Arc::new(Semaphore::new(max_concurrent_tenants.max(1))),
            tenant_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Loop principal. Corre hasta recibir la señal de apagado.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // Jitter de arranque para no alinear todos los procesos
        let jitter_ms = rand::thread_rng().gen_range(0..self.interval.as_millis().max(1) / 10 + 1);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(jitter_ms as u64)) => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    log::info!("🛑 Scheduler de despacho apagándose");
                    return;
                }
            }
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        log::info!("⏱️ Scheduler de despacho iniciado (intervalo: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        log::info!("🛑 Scheduler de despacho apagándose");
                        break;
                    }
                }
            }
        }
    }

    /// Un tick completo: todos los tenants con pedidos abiertos, en
    /// paralelo acotado. Nunca lanza: cada falla queda aislada y logueada.
    pub async fn tick(&self) {
        let tenants = match self.repository.tenants_with_open_orders().await {
            Ok(tenants) => tenants,
            Err(e) => {
                log::error!("❌ No se pudo listar tenants con pedidos abiertos: {}", e);
                return;
            }
        };

        if tenants.is_empty() {
            return;
        }

        let futures = tenants.into_iter().map(|tenant_id| self.process_tenant_guarded(tenant_id));
        futures::future::join_all(futures).await;
    }

    /// Procesar un tenant con su lock de serialización y el permiso del
    /// semáforo global. Si el tick anterior del tenant sigue corriendo,
    /// este se salta (nunca en paralelo).
    async fn process_tenant_guarded(&self, tenant_id: Uuid) {
        let lock = {
            let mut locks = self.tenant_locks.lock().await;
            locks.entry(tenant_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };

        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!(
                    "⚠️ Tick saltado para tenant {}: reconciliación anterior en curso",
                    tenant_id
                );
                return;
            }
        };

        let _permit = match self.tenant_parallelism.acquire().await {
            Ok(permit) => permit,
            Err(_) => return, // semáforo cerrado: apagado en curso
        };

        if let Err(e) = self.process_tenant(tenant_id).await {
            // Falla transitoria de alcance tenant: aislada, no propaga
            log::error!("❌ Tick de reruteo falló para tenant {}: {}", tenant_id, e);
        }
    }

    /// idle -> collecting inputs -> solving -> reconciling -> idle
    async fn process_tenant(&self, tenant_id: Uuid) -> AppResult<()> {
        // Posiciones en vivo hacia los vehículos persistidos
        let snapshot = self.live_locations.snapshot(tenant_id).await;
        for (vehicle_id, position) in &snapshot {
            self.repository
                .sync_vehicle_position(
                    tenant_id,
                    *vehicle_id,
                    position.lat,
                    position.lng,
                    position.recorded_at,
                )
                .await?;
        }

        let orders = self.repository.open_orders(tenant_id).await?;
        let has_pending = orders.iter().any(|o| o.status == OrderStatus::Pending);

        // Tick no-op: nada pendiente y ningún vehículo reposicionado
        if orders.is_empty() || (!has_pending && snapshot.is_empty()) {
            log::debug!("Tick no-op para tenant {}", tenant_id);
            return Ok(());
        }

        let vehicles = self.repository.dispatchable_vehicles(tenant_id).await?;
        if vehicles.is_empty() {
            log::warn!("⚠️ Tenant {} tiene pedidos abiertos y ningún vehículo activo", tenant_id);
            return Ok(());
        }

        let depots = self.repository.depots_by_tenant(tenant_id).await?;
        // Depósito más referenciado por los pedidos abiertos, o el primero
        let depot = orders
            .iter()
            .filter_map(|o| o.depot_id)
            .fold(HashMap::<Uuid, usize>::new(), |mut counts, id| {
                *counts.entry(id).or_insert(0) += 1;
                counts
            })
            .into_iter()
            .max_by_key(|(id, count)| (*count, std::cmp::Reverse(*id)))
            .and_then(|(id, _)| depots.iter().find(|d| d.id == id))
            .or_else(|| depots.first())
            .cloned();

        let outcome = self
            .optimization
            .optimize(OptimizeCommand {
                tenant_id,
                orders,
                vehicles,
                depot,
                method: SolveMethod::Precise,
                enrich_with_ml: true,
                use_road_network: true,
                avg_speed_kmph: None,
                time_budget: Some(self.time_budget),
            })
            .await?;

        // Conservador: sin rutas nuevas no se tocan las existentes
        if outcome.routes.is_empty() {
            log::debug!("Solve sin rutas para tenant {}, reconciliación saltada", tenant_id);
            return Ok(());
        }

        self.lifecycle.reconcile(tenant_id, outcome.routes).await?;
        Ok(())
    }
}
