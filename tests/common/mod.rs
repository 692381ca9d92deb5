//! Shared fakes and builders for bridge integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use skybridge::docker::ContainerHost;
use skybridge::error::BridgeError;
use skybridge::types::{
    image_is_tagged, truncate_id, Container, ContainerConfig, ContainerEvent, ContainerRef,
    ContainerState, EventStatus, NetworkSettings, ServiceRecord,
};
use skybridge::{
    Bridge, BuiltinPolicy, HeartbeatConfig, Heartbeats, PolicyDefaults, Registry, ServicePolicy,
};

/// TTL used by every test bridge.
pub const TTL: u32 = 60;

// --- Fake registry ---

/// Operations observed by the fake registry, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryOp {
    Add(String),
    Update(String, u32),
    Delete(String),
}

/// In-memory registry recording every call.
///
/// Update outcomes can be scripted per call; once the script is drained the
/// `fail_updates` flag applies, and without it an update succeeds only when
/// the record exists (as the real registry behaves).
#[derive(Default)]
pub struct FakeRegistry {
    ops: Mutex<Vec<RegistryOp>>,
    records: Mutex<HashMap<String, ServiceRecord>>,
    update_script: Mutex<VecDeque<bool>>,
    fail_updates: AtomicBool,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-populate a record, as if a previous daemon run had registered it.
    pub fn preload(&self, uuid: &str, record: ServiceRecord) {
        self.records.lock().insert(uuid.to_string(), record);
    }

    /// Make every unscripted update fail.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Queue explicit update outcomes, consumed before `fail_updates` applies.
    pub fn script_updates(&self, outcomes: &[bool]) {
        self.update_script.lock().extend(outcomes.iter().copied());
    }

    pub fn ops(&self) -> Vec<RegistryOp> {
        self.ops.lock().clone()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.records.lock().contains_key(uuid)
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn add_count(&self, uuid: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, RegistryOp::Add(u) if u == uuid))
            .count()
    }

    pub fn update_count(&self, uuid: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, RegistryOp::Update(u, _) if u == uuid))
            .count()
    }

    pub fn delete_count(&self, uuid: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, RegistryOp::Delete(u) if u == uuid))
            .count()
    }

    fn refused() -> BridgeError {
        BridgeError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "registry refused",
        ))
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn add(&self, uuid: &str, record: &ServiceRecord) -> Result<(), BridgeError> {
        self.ops.lock().push(RegistryOp::Add(uuid.to_string()));
        let mut records = self.records.lock();
        if records.contains_key(uuid) {
            return Err(BridgeError::ConflictingUuid(uuid.to_string()));
        }
        records.insert(uuid.to_string(), record.clone());
        Ok(())
    }

    async fn update(&self, uuid: &str, ttl: u32) -> Result<(), BridgeError> {
        self.ops
            .lock()
            .push(RegistryOp::Update(uuid.to_string(), ttl));

        if let Some(ok) = self.update_script.lock().pop_front() {
            return if ok { Ok(()) } else { Err(Self::refused()) };
        }
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::refused());
        }
        if !self.records.lock().contains_key(uuid) {
            return Err(Self::refused());
        }
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<(), BridgeError> {
        self.ops.lock().push(RegistryOp::Delete(uuid.to_string()));
        self.records.lock().remove(uuid);
        Ok(())
    }
}

// --- Fake container host ---

/// In-memory container host, keyed by short id.
#[derive(Default)]
pub struct FakeHost {
    containers: Mutex<HashMap<String, Container>>,
    ghosts: Mutex<Vec<ContainerRef>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, container: Container) {
        let uuid = truncate_id(&container.id).to_string();
        self.containers.lock().insert(uuid, container);
    }

    pub fn remove(&self, uuid: &str) {
        self.containers.lock().remove(uuid);
    }

    /// Register a container that shows up in listings but fails to inspect,
    /// as when it disappears between the two calls.
    pub fn insert_ghost(&self, id: &str, image: &str) {
        self.ghosts.lock().push(ContainerRef {
            id: id.to_string(),
            image: image.to_string(),
        });
    }
}

#[async_trait]
impl ContainerHost for FakeHost {
    async fn fetch_all_containers(&self) -> Result<Vec<ContainerRef>, BridgeError> {
        let mut refs: Vec<ContainerRef> = self
            .containers
            .lock()
            .values()
            .map(|c| ContainerRef {
                id: c.id.clone(),
                image: c.config.image.clone(),
            })
            .collect();
        refs.extend(self.ghosts.lock().iter().cloned());
        Ok(refs)
    }

    async fn fetch_container(&self, id: &str, image: &str) -> Result<Container, BridgeError> {
        if !image.is_empty() && !image_is_tagged(image) {
            return Err(BridgeError::ImageNotTagged(image.to_string()));
        }
        self.containers
            .lock()
            .get(truncate_id(id))
            .cloned()
            .ok_or_else(|| {
                BridgeError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such container: {id}"),
                ))
            })
    }
}

// --- Builders ---

/// A running container snapshot ready for registration.
pub fn running_container(id: &str, name: &str, image: &str, ip: &str) -> Container {
    Container {
        id: id.to_string(),
        name: name.to_string(),
        image: image.to_string(),
        network_settings: NetworkSettings {
            ip_address: ip.to_string(),
        },
        config: ContainerConfig {
            hostname: name.to_string(),
            env: vec!["PATH=/usr/bin".to_string()],
            image: image.to_string(),
        },
        state: ContainerState { running: true },
    }
}

/// A lifecycle event as the pump would produce it.
pub fn event(id: &str, status: EventStatus, image: &str) -> ContainerEvent {
    ContainerEvent {
        container_id: id.to_string(),
        status,
        image: image.to_string(),
        time: 1700000000,
    }
}

pub fn policy_defaults() -> PolicyDefaults {
    PolicyDefaults {
        environment: "dev".to_string(),
        ttl: TTL,
    }
}

/// A bridge over the fakes with the built-in policy.
pub fn build_bridge(
    host: Arc<FakeHost>,
    registry: Arc<FakeRegistry>,
    interval: Duration,
) -> Bridge {
    build_bridge_with_policy(
        host,
        registry,
        interval,
        Arc::new(BuiltinPolicy::new(policy_defaults())),
    )
}

/// A bridge over the fakes with a caller-supplied policy.
pub fn build_bridge_with_policy(
    host: Arc<FakeHost>,
    registry: Arc<FakeRegistry>,
    interval: Duration,
    policy: Arc<dyn ServicePolicy>,
) -> Bridge {
    let heartbeats = Heartbeats::new(
        registry.clone() as Arc<dyn Registry>,
        HeartbeatConfig { interval, ttl: TTL },
    );
    Bridge::new(
        host as Arc<dyn ContainerHost>,
        registry as Arc<dyn Registry>,
        policy,
        heartbeats,
        TTL,
    )
}
