//! Event-handler worker pool.
//!
//! A fixed number of workers drain one shared event channel and feed the
//! bridge. The receiver sits behind a mutex held only while waiting for the
//! next event, so handling itself runs in parallel. Per-container ordering
//! is not preserved across workers; the bridge's idempotent operations and
//! the heartbeat live set keep that safe.

use std::process;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::bridge::Bridge;
use crate::types::ContainerEvent;

/// Spawn `count` workers draining `rx`, and wait until every one of them
/// has drained. Workers exit when the channel closes, which happens when
/// the event pump drops its sender.
pub async fn run(bridge: Arc<Bridge>, rx: mpsc::Receiver<ContainerEvent>, count: usize) {
    let rx = Arc::new(Mutex::new(rx));

    let handles: Vec<JoinHandle<()>> = (0..count)
        .map(|id| tokio::spawn(worker_loop(id, bridge.clone(), rx.clone())))
        .collect();

    for (id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            error!(worker = id, "worker task panicked: {}", e);
        }
    }
}

async fn worker_loop(
    id: usize,
    bridge: Arc<Bridge>,
    rx: Arc<Mutex<mpsc::Receiver<ContainerEvent>>>,
) {
    loop {
        let event = { rx.lock().await.recv().await };
        let Some(event) = event else {
            debug!(worker = id, "event channel closed");
            return;
        };

        if let Err(e) = bridge.handle(&event).await {
            if e.is_fatal() {
                eprintln!("{e}");
                process::exit(1);
            }
            error!(worker = id, id = %event.container_id, "failed to handle event: {e}");
        }
    }
}
