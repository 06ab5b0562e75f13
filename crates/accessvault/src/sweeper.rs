//! Periodic deletion of long-expired grants.
//!
//! [`Sweeper::run_once`] is the whole operation and is safe to call at any
//! time from anywhere. [`Sweeper::spawn`] is a convenience that calls it on
//! a timer; nothing in this crate starts it implicitly.

use std::sync::Arc;
use std::time::Duration;

use accessvault_core::Clock;
use accessvault_store::GrantStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Grants with `expires_at` strictly before this instant were deleted.
    pub cutoff: i64,
    /// Number of deleted grants.
    pub deleted: u64,
}

/// Deletes grants that expired more than a grace period ago.
///
/// Revoked grants are deleted by the same rule. Since the cutoff is never
/// after the current time, an active grant is never deleted.
pub struct Sweeper<S: GrantStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    grace_millis: i64,
}

impl<S: GrantStore> Sweeper<S> {
    /// Create a sweeper with the given grace period.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, grace: Duration) -> Self {
        Self {
            store,
            clock,
            grace_millis: i64::try_from(grace.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Run a single sweep.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let cutoff = self.clock.now_millis().saturating_sub(self.grace_millis);
        let deleted = self.store.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, cutoff, "swept expired grants");
        } else {
            debug!(cutoff, "sweep found nothing to delete");
        }
        Ok(SweepReport { cutoff, deleted })
    }
}

impl<S: GrantStore + 'static> Sweeper<S> {
    /// Run [`run_once`](Self::run_once) every `interval` on the current
    /// tokio runtime until the handle is shut down or dropped.
    ///
    /// The first sweep runs immediately. A failed sweep is logged and the
    /// next tick tries again. A zero interval is raised to one millisecond.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let interval = interval.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                grace_millis = self.grace_millis,
                "sweeper started"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            warn!(error = %e, "sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("sweeper stopping");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a spawned sweeper. Dropping it also stops the sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
