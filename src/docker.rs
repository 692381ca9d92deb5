//! Container-host client and event pump.
//!
//! Talks to the local container daemon over its unix socket via [`bollard`]:
//! one-shot listings and snapshots on demand, plus a long-lived event stream
//! pumped into a channel of typed [`ContainerEvent`]s. The stream is
//! open-ended in principle but finite in practice; when it closes the pump
//! returns and the dropped sender shuts the worker pool down.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::EventMessage;
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::metrics;
use crate::types::{
    image_is_tagged, Container, ContainerConfig, ContainerEvent, ContainerRef, ContainerState,
    EventStatus, NetworkSettings,
};

/// Connection timeout for the unix socket, in seconds.
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// Read access to the container host.
#[async_trait]
pub trait ContainerHost: Send + Sync {
    /// List the currently running containers.
    async fn fetch_all_containers(&self) -> Result<Vec<ContainerRef>, BridgeError>;

    /// Fetch a full snapshot of one container.
    ///
    /// Returns [`BridgeError::ImageNotTagged`] when a non-empty `image`
    /// carries no tag; callers treat that as "skip", not failure. Passing an
    /// empty `image` skips the check, for lookups that only need an address.
    async fn fetch_container(&self, id: &str, image: &str) -> Result<Container, BridgeError>;
}

/// Container host backed by the local daemon's unix socket.
pub struct DockerHost {
    docker: Docker,
}

impl DockerHost {
    /// Connect to the daemon socket at `path`.
    pub fn connect(path: &str) -> Result<Self, BridgeError> {
        let docker = Docker::connect_with_socket(path, SOCKET_TIMEOUT_SECS, API_DEFAULT_VERSION)?;
        Ok(Self { docker })
    }

    /// Pump the host's event stream into `tx` until the stream closes.
    ///
    /// Only `container`-type messages are requested; each is parsed into a
    /// [`ContainerEvent`] and statuses outside the lifecycle set are dropped.
    pub async fn pump_events(&self, tx: mpsc::Sender<ContainerEvent>) {
        let options = EventsOptions::<String> {
            filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
            ..Default::default()
        };

        let mut stream = self.docker.events(Some(options));
        info!("listening for container events");

        while let Some(message) = stream.next().await {
            match message {
                Ok(message) => {
                    let Some(event) = parse_event(message) else {
                        continue;
                    };
                    metrics::record_event(event.status.as_str());
                    if tx.send(event).await.is_err() {
                        warn!("event channel closed, stopping pump");
                        return;
                    }
                }
                Err(e) => {
                    warn!("event stream error: {e}");
                    return;
                }
            }
        }

        info!("event stream ended");
    }
}

#[async_trait]
impl ContainerHost for DockerHost {
    async fn fetch_all_containers(&self) -> Result<Vec<ContainerRef>, BridgeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let Some(id) = c.id else {
                    warn!("listing returned a container without an id");
                    return None;
                };
                Some(ContainerRef {
                    id,
                    image: c.image.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn fetch_container(&self, id: &str, image: &str) -> Result<Container, BridgeError> {
        if !image.is_empty() && !image_is_tagged(image) {
            return Err(BridgeError::ImageNotTagged(image.to_string()));
        }
        let detail = self.docker.inspect_container(id, None).await?;
        Ok(snapshot(detail))
    }
}

/// Convert an inspect response into an owned [`Container`] snapshot.
fn snapshot(detail: bollard::models::ContainerInspectResponse) -> Container {
    let config = detail
        .config
        .map(|c| ContainerConfig {
            hostname: c.hostname.unwrap_or_default(),
            env: c.env.unwrap_or_default(),
            image: c.image.unwrap_or_default(),
        })
        .unwrap_or_default();

    Container {
        id: detail.id.unwrap_or_default(),
        name: detail
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        image: config.image.clone(),
        network_settings: NetworkSettings {
            ip_address: detail
                .network_settings
                .and_then(|s| s.ip_address)
                .unwrap_or_default(),
        },
        config,
        state: ContainerState {
            running: detail.state.and_then(|s| s.running).unwrap_or(false),
        },
    }
}

/// Parse one stream message into a typed event. Returns `None` for statuses
/// outside the lifecycle set and for frames missing a container id.
fn parse_event(message: EventMessage) -> Option<ContainerEvent> {
    let action = message.action.unwrap_or_default();
    let Some(status) = EventStatus::parse(&action) else {
        debug!(action = %action, "ignoring event");
        return None;
    };

    let Some(actor) = message.actor else {
        warn!(action = %action, "dropping event without actor");
        return None;
    };
    let Some(container_id) = actor.id else {
        warn!(action = %action, "dropping event without container id");
        return None;
    };
    let image = actor
        .attributes
        .and_then(|a| a.get("image").cloned())
        .unwrap_or_default();

    Some(ContainerEvent {
        container_id,
        status,
        image,
        time: message.time.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    fn message(action: &str, id: Option<&str>, image: Option<&str>) -> EventMessage {
        let mut attributes = HashMap::new();
        if let Some(image) = image {
            attributes.insert("image".to_string(), image.to_string());
        }
        EventMessage {
            action: Some(action.to_string()),
            actor: id.map(|id| EventActor {
                id: Some(id.to_string()),
                attributes: Some(attributes),
            }),
            time: Some(1700000000),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_event_start() {
        let event = parse_event(message("start", Some("abc123"), Some("redis:3.2"))).unwrap();
        assert_eq!(event.status, EventStatus::Start);
        assert_eq!(event.container_id, "abc123");
        assert_eq!(event.image, "redis:3.2");
        assert_eq!(event.time, 1700000000);
    }

    #[test]
    fn test_parse_event_ignores_unknown_status() {
        assert!(parse_event(message("pause", Some("abc123"), None)).is_none());
    }

    #[test]
    fn test_parse_event_drops_missing_id() {
        assert!(parse_event(message("start", None, None)).is_none());
    }

    #[test]
    fn test_snapshot_strips_name_slash() {
        let detail = bollard::models::ContainerInspectResponse {
            id: Some("abc".to_string()),
            name: Some("/web".to_string()),
            ..Default::default()
        };
        let container = snapshot(detail);
        assert_eq!(container.name, "web");
        assert!(!container.state.running);
    }
}
