//! Shared data model: container snapshots, lifecycle events, and the
//! service records written to the registry.
//!
//! Serde field names follow the container host's wire format (PascalCase),
//! so the same shape is used when parsing inspect responses, when handing a
//! snapshot to a policy script, and when posting a record to the registry.

use serde::{Deserialize, Serialize};

/// Number of leading characters of a container id that form its UUID.
const UUID_LEN: usize = 12;

/// Derive the canonical short id used as the registry key.
///
/// Container ids are long hex strings; the first 12 characters are unique in
/// practice and are what the host itself displays. Ids shorter than that are
/// returned unchanged.
pub fn truncate_id(id: &str) -> &str {
    match id.char_indices().nth(UUID_LEN) {
        Some((offset, _)) => &id[..offset],
        None => id,
    }
}

/// Whether an image reference carries a tag or digest.
///
/// A `:` only counts as a tag separator when it appears after the last `/`,
/// so a registry host port (`localhost:5000/app`) does not make an image
/// tagged. Digest references (`app@sha256:...`) always count.
pub fn image_is_tagged(image: &str) -> bool {
    image.contains('@') || !split_image_tag(image).1.is_empty()
}

/// Split an image reference into `(repository, tag)`.
///
/// The digest part, when present, is discarded. The tag is empty when the
/// reference has none.
pub(crate) fn split_image_tag(image: &str) -> (&str, &str) {
    let body = match image.find('@') {
        Some(at) => &image[..at],
        None => image,
    };
    match body.rfind(':') {
        Some(colon) if !body[colon + 1..].contains('/') => (&body[..colon], &body[colon + 1..]),
        _ => (body, ""),
    }
}

/// A running container as returned by the one-shot listing.
#[derive(Debug, Clone)]
pub struct ContainerRef {
    /// Full container id.
    pub id: String,
    /// Image reference the container was created from.
    pub image: String,
}

/// Lifecycle transitions the bridge acts on.
///
/// The host emits many more statuses; anything that does not parse into one
/// of these is dropped by the event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Container started.
    Start,
    /// Container restarted.
    Restart,
    /// Container process exited.
    Die,
    /// Container stopped.
    Stop,
    /// Container killed.
    Kill,
}

impl EventStatus {
    /// Parse a host status string. Returns `None` for statuses the bridge
    /// ignores.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "start" => Some(Self::Start),
            "restart" => Some(Self::Restart),
            "die" => Some(Self::Die),
            "stop" => Some(Self::Stop),
            "kill" => Some(Self::Kill),
            _ => None,
        }
    }

    /// Stable lowercase name, matching the host's wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Restart => "restart",
            Self::Die => "die",
            Self::Stop => "stop",
            Self::Kill => "kill",
        }
    }
}

/// A parsed lifecycle event from the host's event stream.
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    /// Full id of the container the event is about.
    pub container_id: String,
    /// The lifecycle transition.
    pub status: EventStatus,
    /// Image reference carried by the event.
    pub image: String,
    /// Host timestamp (seconds since the epoch).
    pub time: i64,
}

/// Snapshot of container metadata, fetched on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Container {
    /// Full container id.
    pub id: String,
    /// Canonical container name, leading `/` stripped.
    pub name: String,
    /// Image reference the container runs.
    pub image: String,
    /// Network state.
    pub network_settings: NetworkSettings,
    /// Creation-time configuration.
    pub config: ContainerConfig,
    /// Runtime state.
    pub state: ContainerState,
}

/// Network section of a container snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Primary routable IPv4 address; empty when the container has none.
    #[serde(rename = "IpAddress")]
    pub ip_address: String,
}

/// Configuration section of a container snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    /// Configured hostname.
    pub hostname: String,
    /// Environment as `KEY=VALUE` entries.
    pub env: Vec<String>,
    /// Image reference as given at creation (`repository:tag` or bare).
    pub image: String,
}

/// State section of a container snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    /// Whether the container is currently running.
    pub running: bool,
}

impl Container {
    /// Whether this snapshot may be registered: the container must be
    /// running and must have a routable address.
    pub fn registrable(&self) -> bool {
        self.state.running && !self.network_settings.ip_address.is_empty()
    }
}

/// The record a policy produces and the registry stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceRecord {
    /// Registry key; derived from the container id by the coordinator.
    #[serde(rename = "UUID")]
    pub uuid: String,
    /// Service name.
    pub name: String,
    /// Service version, usually the image tag. May be empty.
    pub version: String,
    /// Image repository the service runs.
    pub image: String,
    /// Address the service is reachable at.
    pub host: String,
    /// Environment label.
    pub environment: String,
    /// Record time-to-live in seconds.
    #[serde(rename = "TTL")]
    pub ttl: u32,
    /// Service port, when the policy knows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ServiceRecord {
    /// Check the invariants the registry depends on. The error names the
    /// first violated field.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("record has no host".to_string());
        }
        if self.name.is_empty() {
            return Err("record has no name".to_string());
        }
        if self.environment.is_empty() {
            return Err("record has no environment".to_string());
        }
        if self.ttl == 0 {
            return Err("record TTL must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_id() {
        assert_eq!(
            truncate_id("3cf6b9d5a8e1f2c4d7a9b0e3f6c8d1a4b7e0"),
            "3cf6b9d5a8e1"
        );
    }

    #[test]
    fn test_truncate_short_id_unchanged() {
        assert_eq!(truncate_id("abc123"), "abc123");
    }

    #[test]
    fn test_image_tagged() {
        assert!(image_is_tagged("redis:3.2"));
        assert!(image_is_tagged("quay.io/ns/app:v1"));
        assert!(image_is_tagged("app@sha256:deadbeef"));
        assert!(!image_is_tagged("redis"));
        assert!(!image_is_tagged("localhost:5000/app"));
    }

    #[test]
    fn test_split_image_tag() {
        assert_eq!(split_image_tag("redis:3.2"), ("redis", "3.2"));
        assert_eq!(split_image_tag("redis"), ("redis", ""));
        assert_eq!(
            split_image_tag("localhost:5000/app"),
            ("localhost:5000/app", "")
        );
        assert_eq!(
            split_image_tag("localhost:5000/app:v2"),
            ("localhost:5000/app", "v2")
        );
        assert_eq!(split_image_tag("app@sha256:deadbeef"), ("app", ""));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(EventStatus::parse("start"), Some(EventStatus::Start));
        assert_eq!(EventStatus::parse("kill"), Some(EventStatus::Kill));
        assert_eq!(EventStatus::parse("pause"), None);
        assert_eq!(EventStatus::parse(""), None);
    }

    #[test]
    fn test_validate_accepts_complete_record() {
        let record = ServiceRecord {
            name: "web".to_string(),
            host: "10.0.0.2".to_string(),
            environment: "dev".to_string(),
            ttl: 60,
            ..Default::default()
        };
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let record = ServiceRecord {
            name: "web".to_string(),
            environment: "dev".to_string(),
            ttl: 60,
            ..Default::default()
        };
        assert!(record.validate().unwrap_err().contains("host"));

        let record = ServiceRecord {
            name: "web".to_string(),
            host: "10.0.0.2".to_string(),
            environment: "dev".to_string(),
            ttl: 0,
            ..Default::default()
        };
        assert!(record.validate().unwrap_err().contains("TTL"));
    }

    #[test]
    fn test_registrable() {
        let mut container = Container {
            state: ContainerState { running: true },
            ..Default::default()
        };
        container.network_settings.ip_address = "10.0.0.2".to_string();
        assert!(container.registrable());

        container.state.running = false;
        assert!(!container.registrable());

        container.state.running = true;
        container.network_settings.ip_address.clear();
        assert!(!container.registrable());
    }
}
