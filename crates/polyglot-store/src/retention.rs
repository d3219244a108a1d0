use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::store::MessageStore;

/// Periodic expiry of messages older than the retention horizon.
///
/// The sweep itself is a plain method ([`RetentionSweeper::sweep_at`]) so it
/// can be driven directly; [`RetentionSweeper::spawn`] wraps it in a tokio
/// task that ticks on a fixed interval until its handle is shut down.
pub struct RetentionSweeper {
    store: Arc<MessageStore>,
    retention: chrono::Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<MessageStore>, retention: chrono::Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Delete everything older than `now - retention`. Returns the count removed.
    ///
    /// A horizon reaching before the earliest representable time deletes nothing.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        match now.checked_sub_signed(self.retention) {
            Some(cutoff) => self.store.expire(cutoff),
            None => {
                warn!(
                    retention_days = self.retention.num_days(),
                    "retention horizon out of range, nothing expired"
                );
                Ok(0)
            }
        }
    }

    /// Start the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately, then once per interval.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Main loop. Ticks until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_days = self.retention.num_days(),
            interval_secs = self.interval.as_secs(),
            "retention sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = interval.tick() => {
                    match self.sweep_at(Utc::now()) {
                        Ok(n) => info!(deleted = n, "retention sweep complete"),
                        Err(e) => error!("retention sweep failed: {e}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("retention sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Cancellation handle for a spawned [`RetentionSweeper`].
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("retention sweeper task failed: {e}");
        }
    }
}
