//! Event-to-registry coordination.
//!
//! The bridge owns the collaborators (host client, registry client, policy,
//! heartbeat controller) and turns lifecycle events into idempotent
//! registry operations: start-ish events become an add (or a TTL reset when
//! the key already exists) plus a heartbeat, stop-ish events become a
//! delete. [`Bridge::restore`] registers the already-running world once at
//! startup, before any event is consumed.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::docker::ContainerHost;
use crate::error::BridgeError;
use crate::heartbeat::Heartbeats;
use crate::metrics::{self, RegistrationOutcome};
use crate::policy::ServicePolicy;
use crate::registry::Registry;
use crate::types::{truncate_id, Container, ContainerEvent, EventStatus, ServiceRecord};

/// The registration coordinator.
pub struct Bridge {
    host: Arc<dyn ContainerHost>,
    registry: Arc<dyn Registry>,
    policy: Arc<dyn ServicePolicy>,
    heartbeats: Heartbeats,
    ttl: u32,
}

impl Bridge {
    /// Wire up a bridge over its collaborators. `ttl` is the value written
    /// when a conflicting add degrades to a TTL reset.
    pub fn new(
        host: Arc<dyn ContainerHost>,
        registry: Arc<dyn Registry>,
        policy: Arc<dyn ServicePolicy>,
        heartbeats: Heartbeats,
        ttl: u32,
    ) -> Self {
        Self {
            host,
            registry,
            policy,
            heartbeats,
            ttl,
        }
    }

    /// The heartbeat controller, for inspection.
    pub fn heartbeats(&self) -> &Heartbeats {
        &self.heartbeats
    }

    /// One-shot reconciliation at startup: register every container already
    /// running on the host.
    ///
    /// Per-container fetch and registry failures are logged and skipped;
    /// policy failures propagate and are fatal.
    pub async fn restore(&self) -> Result<(), BridgeError> {
        let containers = self.host.fetch_all_containers().await?;
        info!(count = containers.len(), "restoring running containers");

        for reference in containers {
            let uuid = truncate_id(&reference.id);
            let container = match self.snapshot(uuid, &reference.image).await {
                Ok(Some(container)) => container,
                Ok(None) => continue,
                Err(e) => {
                    error!(uuid, "failed to fetch container on restore: {e}");
                    continue;
                }
            };

            let record = self.policy.create_service(&container)?;
            if let Err(e) = self.send_service(uuid, record).await {
                error!(uuid, "failed to register on restore: {e}");
            }
        }
        Ok(())
    }

    /// Apply one lifecycle event. Safe to invoke redundantly for the same
    /// container: adds degrade to TTL resets and heartbeat starts collapse.
    ///
    /// The returned error is fatal only for policy failures
    /// ([`BridgeError::is_fatal`]); callers log everything else and move on.
    pub async fn handle(&self, event: &ContainerEvent) -> Result<(), BridgeError> {
        debug!(
            status = event.status.as_str(),
            id = %event.container_id,
            image = %event.image,
            time = event.time,
            "received event"
        );

        let uuid = truncate_id(&event.container_id);
        match event.status {
            EventStatus::Start | EventStatus::Restart => self.add_service(uuid, &event.image).await,
            EventStatus::Die | EventStatus::Stop | EventStatus::Kill => {
                self.remove_service(uuid).await
            }
        }
    }

    /// Fetch a snapshot, mapping the skip cases to `None`: untagged images
    /// and containers that are gone or unroutable by the time we look.
    async fn snapshot(&self, uuid: &str, image: &str) -> Result<Option<Container>, BridgeError> {
        let container = match self.host.fetch_container(uuid, image).await {
            Ok(container) => container,
            Err(BridgeError::ImageNotTagged(image)) => {
                debug!(uuid, image = %image, "skipping untagged image");
                metrics::record_registration(RegistrationOutcome::Skipped);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !container.registrable() {
            debug!(uuid, "container not running or has no address, skipping");
            metrics::record_registration(RegistrationOutcome::Skipped);
            return Ok(None);
        }
        Ok(Some(container))
    }

    async fn add_service(&self, uuid: &str, image: &str) -> Result<(), BridgeError> {
        let Some(container) = self.snapshot(uuid, image).await? else {
            return Ok(());
        };
        let record = self.policy.create_service(&container)?;
        self.send_service(uuid, record).await
    }

    /// Register `record` under `uuid` and start its heartbeat. An add that
    /// conflicts degrades to a TTL reset; the heartbeat starts either way.
    async fn send_service(&self, uuid: &str, mut record: ServiceRecord) -> Result<(), BridgeError> {
        record.uuid = uuid.to_string();
        info!(uuid, name = %record.name, "adding service");

        match self.registry.add(uuid, &record).await {
            Ok(()) => metrics::record_registration(RegistrationOutcome::Added),
            Err(BridgeError::ConflictingUuid(_)) => {
                info!(uuid, "service already registered, resetting TTL");
                metrics::record_registration(RegistrationOutcome::Conflict);
                if let Err(e) = self.registry.update(uuid, self.ttl).await {
                    error!(uuid, "failed to reset TTL: {e}");
                }
            }
            Err(e) => return Err(e),
        }

        self.heartbeats.start(uuid);
        Ok(())
    }

    /// Delete the record for `uuid`. The live set is left alone: a running
    /// heartbeat reaps itself once its refreshes start failing.
    async fn remove_service(&self, uuid: &str) -> Result<(), BridgeError> {
        info!(uuid, "removing service");
        self.registry.delete(uuid).await?;
        metrics::record_registration(RegistrationOutcome::Removed);
        Ok(())
    }
}
