use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::{future::join_all, FutureExt};
use tokio::{
    sync::Semaphore,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use wedash_types::Service;

use crate::{
    registry::SharedRegistry,
    status::{Probe, StatusProber, StatusSource},
};

pub const REFRESH_PERIOD: Duration = Duration::from_secs(10);
pub const MAX_IN_FLIGHT: usize = 4;

/// Called with the registry index of every service whose live fields changed.
pub type OnUpdate = Arc<dyn Fn(usize) + Send + Sync>;

/// Re-probes the visible services on a fixed period.
pub struct RefreshLoop<S: StatusSource> {
    registry: SharedRegistry,
    prober: Arc<StatusProber<S>>,
    period: Duration,
    max_in_flight: usize,
    on_update: OnUpdate,
}

impl<S: StatusSource + 'static> RefreshLoop<S> {
    pub fn new(
        registry: SharedRegistry,
        prober: Arc<StatusProber<S>>,
        on_update: OnUpdate,
    ) -> Self {
        Self {
            registry,
            prober,
            period: REFRESH_PERIOD,
            max_in_flight: MAX_IN_FLIGHT,
            on_update,
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Run the loop on its own task until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Refresh loop started (every {:?}, {} probes in flight)",
            self.period,
            self.max_in_flight
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = self.tick() => {
                    tracing::trace!("Refresh tick changed {changed} services");
                }
            }
        }

        tracing::info!("Refresh loop stopped");
    }

    /// Probe every visible row once and merge what changed.
    ///
    /// Returns the number of services whose state or pid changed.
    pub async fn tick(&self) -> usize {
        let (generation, targets): (u64, Vec<(usize, Service)>) = {
            let registry = self.registry.read();
            let targets = registry
                .rows()
                .iter()
                .filter_map(|index| registry.get(*index).map(|service| (*index, service.clone())))
                .collect();
            (registry.generation(), targets)
        };
        if targets.is_empty() {
            return 0;
        }

        let permits = Semaphore::new(self.max_in_flight);
        let permits = &permits;
        let prober = &self.prober;

        let probes = targets.into_iter().map(|(index, service)| async move {
            let _permit = permits.acquire().await.ok();
            let probe = AssertUnwindSafe(prober.probe(&service))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::warn!("Status probe for {} panicked", service.name);
                    Probe::default()
                });
            (index, probe)
        });
        let results = join_all(probes).await;

        let now = SystemTime::now();
        let mut changed = Vec::new();
        {
            let mut registry = self.registry.write();
            if registry.generation() != generation {
                tracing::debug!("Services were re-discovered during the tick, dropping results");
                return 0;
            }
            for (index, probe) in results {
                if registry.apply_probe(index, probe, now) {
                    changed.push(index);
                }
            }
        }

        for index in &changed {
            (self.on_update)(*index);
        }
        changed.len()
    }
}
