//! Status Poller
//!
//! Keeps non-terminal transfers moving. Two drivers share one coordinator:
//!
//! - per-transfer tasks ([`StatusPoller::track`]), one cancellable tokio task
//!   per id, started by `initiate`/`retry` and stopped by `clear`
//! - the round driver ([`StatusPoller::run_rounds`]) used at startup, which
//!   checks every in-progress transfer concurrently each round

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::coordinator::TransferCoordinator;
use super::types::TransferId;
use crate::config::BridgeConfig;

/// Configuration for the status poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between two checks of the same transfer
    pub poll_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5500),
        }
    }
}

impl From<&BridgeConfig> for PollerConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
        }
    }
}

pub struct StatusPoller {
    coordinator: Weak<TransferCoordinator>,
    config: PollerConfig,
    tasks: Mutex<HashMap<TransferId, JoinHandle<()>>>,
}

impl StatusPoller {
    /// Create a poller for `coordinator` and register it, so `initiate` and
    /// `retry` start tracking automatically.
    pub fn attach(coordinator: &Arc<TransferCoordinator>, config: PollerConfig) -> Arc<Self> {
        let poller = Arc::new(Self {
            coordinator: Arc::downgrade(coordinator),
            config,
            tasks: Mutex::new(HashMap::new()),
        });
        if !coordinator.attach_poller(poller.clone()) {
            warn!("Coordinator already has a status poller");
        }
        poller
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<TransferId, JoinHandle<()>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Poll `id` until it is complete or gone. Replaces an existing task for
    /// the same id.
    pub fn track(&self, id: TransferId) {
        let coordinator = self.coordinator.clone();
        let interval = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            loop {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                match coordinator.check_status(&id).await {
                    Ok(Some(status)) if status.is_terminal() => {
                        debug!(transfer_id = %id, status = %status, "Tracking finished");
                        coordinator.notify();
                        break;
                    }
                    Ok(Some(_)) => coordinator.notify(),
                    Ok(None) => {
                        debug!(transfer_id = %id, "Transfer gone, tracking stopped");
                        break;
                    }
                    Err(e) => {
                        warn!(transfer_id = %id, code = e.code(), error = %e, "Status check failed");
                    }
                }
                drop(coordinator);
                tokio::time::sleep(interval).await;
            }
        });

        if let Some(previous) = self.tasks().insert(id, handle) {
            previous.abort();
        }
    }

    /// Stop tracking `id`. Returns whether a live task was stopped.
    pub fn cancel(&self, id: &TransferId) -> bool {
        match self.tasks().remove(id) {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
    }

    /// Ids with a running task.
    pub fn tracked(&self) -> Vec<TransferId> {
        let mut tasks = self.tasks();
        tasks.retain(|_, handle| !handle.is_finished());
        let mut ids: Vec<TransferId> = tasks.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Run polling rounds until no transfer is in progress and no mint awaits
    /// resolution. Returns the number of rounds run.
    pub async fn run_rounds(&self) -> usize {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting status rounds"
        );

        let mut rounds = 0;
        loop {
            let Some(coordinator) = self.coordinator.upgrade() else {
                break;
            };

            match coordinator.check_statuses().await {
                Ok(checked) => debug!(round = rounds, checked, "Status round done"),
                Err(e) => error!(error = %e, "Status round failed"),
            }
            rounds += 1;

            match coordinator.has_pending_work() {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) => error!(error = %e, "Could not read transfer state"),
            }
            drop(coordinator);
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(rounds, "No transfers in progress");
        rounds
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
