//! Per-container TTL refresh loops.
//!
//! Every registered container gets one loop that periodically resets its
//! record's TTL so the registry does not expire it. The live set tracks
//! which UUIDs currently have a loop; check-and-insert on entry and removal
//! on exit both happen under one mutex, held only for the membership
//! change, never across I/O.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::metrics;
use crate::registry::Registry;

/// Consecutive refresh failures tolerated before a loop gives up. Once the
/// budget is exhausted the registry's own TTL expiry reclaims the record.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Refresh interval above which each tick is worth an info line.
const CHATTY_INTERVAL: Duration = Duration::from_secs(30);

/// Timing for refresh loops.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between TTL refreshes.
    pub interval: Duration,
    /// TTL written on every refresh.
    pub ttl: u32,
}

/// Starts and tracks one refresh loop per registered container.
///
/// Cloning shares the underlying live set.
#[derive(Clone)]
pub struct Heartbeats {
    registry: Arc<dyn Registry>,
    config: HeartbeatConfig,
    live: Arc<Mutex<HashSet<String>>>,
}

impl Heartbeats {
    /// Create a controller refreshing through `registry`.
    pub fn new(registry: Arc<dyn Registry>, config: HeartbeatConfig) -> Self {
        Self {
            registry,
            config,
            live: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start a refresh loop for `uuid`. No-op when one is already live, so
    /// redundant starts from concurrent workers collapse to a single loop.
    pub fn start(&self, uuid: &str) {
        {
            let mut live = self.live.lock();
            if !live.insert(uuid.to_string()) {
                debug!(uuid, "heartbeat already running");
                return;
            }
            metrics::record_live_heartbeats(live.len());
        }

        let controller = self.clone();
        let uuid = uuid.to_string();
        tokio::spawn(async move { controller.run(uuid).await });
    }

    /// Whether a refresh loop is currently live for `uuid`.
    pub fn is_live(&self, uuid: &str) -> bool {
        self.live.lock().contains(uuid)
    }

    /// Number of live refresh loops.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    async fn run(self, uuid: String) {
        debug!(uuid = %uuid, interval = ?self.config.interval, "heartbeat started");

        let mut consecutive_errors = 0u32;
        loop {
            sleep(self.config.interval).await;

            if consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                error!(
                    uuid = %uuid,
                    "aborting heartbeat after {MAX_CONSECUTIVE_ERRORS} consecutive errors"
                );
                metrics::record_heartbeat_abort();
                break;
            }

            // keep quiet at short intervals
            if self.config.interval >= CHATTY_INTERVAL {
                info!(uuid = %uuid, "refreshing TTL");
            }

            match self.registry.update(&uuid, self.config.ttl).await {
                Ok(()) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    metrics::record_heartbeat_failure();
                    error!(uuid = %uuid, "failed to refresh TTL: {e}");
                }
            }
        }

        let mut live = self.live.lock();
        live.remove(&uuid);
        metrics::record_live_heartbeats(live.len());
    }
}
