//! Policy evaluation: mapping a container snapshot to a service record.
//!
//! A policy is either the built-in default or a user script. Scripts are
//! rhai files exposing a single `createService(container)` function; the
//! container argument is the snapshot in its wire shape, and a small host
//! library is registered for the common derivations. The interpreter is
//! sandboxed: scripts get read-only data and the registered helpers,
//! nothing else.
//!
//! A policy that errors or returns a malformed record is a fatal condition
//! for the daemon; see [`BridgeError::is_fatal`].

use std::path::Path;

use rhai::{Dynamic, Engine, Map, Scope, AST};

use crate::error::BridgeError;
use crate::types::{split_image_tag, truncate_id, Container, ServiceRecord};

/// Transform a container snapshot into the record to register.
pub trait ServicePolicy: Send + Sync {
    /// Build the service record for `container`. Errors are fatal to the
    /// daemon.
    fn create_service(&self, container: &Container) -> Result<ServiceRecord, BridgeError>;
}

/// Configuration-derived values a policy falls back on.
#[derive(Debug, Clone)]
pub struct PolicyDefaults {
    /// Environment label stamped on records.
    pub environment: String,
    /// Record TTL in seconds.
    pub ttl: u32,
}

/// Repository part of an image reference, registry prefix and tag stripped.
pub(crate) fn clean_image_image(image: &str) -> String {
    let (repository, _) = split_image_tag(image);
    repository
        .rsplit('/')
        .next()
        .unwrap_or(repository)
        .to_string()
}

/// Tag part of an image reference, or empty when untagged.
pub(crate) fn clean_image_name(image: &str) -> String {
    split_image_tag(image).1.to_string()
}

/// Canonical service name for a container: its name, leading `/` stripped.
pub(crate) fn default_name(container: &Container) -> String {
    container.name.trim_start_matches('/').to_string()
}

/// The built-in policy: name from the container, image and version from the
/// tag-split of the configured image, host from the container's address,
/// environment and TTL from configuration.
pub struct BuiltinPolicy {
    defaults: PolicyDefaults,
}

impl BuiltinPolicy {
    /// Create the built-in policy over `defaults`.
    pub fn new(defaults: PolicyDefaults) -> Self {
        Self { defaults }
    }
}

impl ServicePolicy for BuiltinPolicy {
    fn create_service(&self, container: &Container) -> Result<ServiceRecord, BridgeError> {
        let record = ServiceRecord {
            uuid: truncate_id(&container.id).to_string(),
            name: default_name(container),
            version: clean_image_name(&container.config.image),
            image: clean_image_image(&container.config.image),
            host: container.network_settings.ip_address.clone(),
            environment: self.defaults.environment.clone(),
            ttl: self.defaults.ttl,
            port: None,
        };
        record.validate().map_err(BridgeError::InvalidRecord)?;
        Ok(record)
    }
}

/// Policy backed by a user script, compiled once at startup.
///
/// The engine is built with rhai's `sync` storage, so concurrent workers
/// evaluate without a process-wide lock.
pub struct ScriptPolicy {
    engine: Engine,
    ast: AST,
}

impl ScriptPolicy {
    /// Load and compile the script at `path`, registering the host library.
    pub fn load(path: &Path, defaults: PolicyDefaults) -> Result<Self, BridgeError> {
        let engine = host_engine(defaults);
        let ast = engine
            .compile_file(path.to_path_buf())
            .map_err(|e| BridgeError::Policy(format!("{}: {e}", path.display())))?;
        Ok(Self { engine, ast })
    }
}

impl ServicePolicy for ScriptPolicy {
    fn create_service(&self, container: &Container) -> Result<ServiceRecord, BridgeError> {
        let argument = rhai::serde::to_dynamic(container)
            .map_err(|e| BridgeError::Policy(e.to_string()))?;

        let mut scope = Scope::new();
        let value: Dynamic = self
            .engine
            .call_fn(&mut scope, &self.ast, "createService", (argument,))
            .map_err(|e| BridgeError::Policy(e.to_string()))?;

        let mut record: ServiceRecord = rhai::serde::from_dynamic(&value)
            .map_err(|e| BridgeError::Policy(format!("createService returned {e}")))?;
        if record.uuid.is_empty() {
            record.uuid = truncate_id(&container.id).to_string();
        }
        record.validate().map_err(BridgeError::InvalidRecord)?;
        Ok(record)
    }
}

/// Build an engine with the host library registered under the names scripts
/// use: `defaultTTL`, `environment`, `defaultName`, `cleanImageImage`,
/// `cleanImageName`.
fn host_engine(defaults: PolicyDefaults) -> Engine {
    let mut engine = Engine::new();

    // No `import`: scripts get the snapshot and the helpers, not the
    // filesystem.
    engine.set_module_resolver(rhai::module_resolvers::DummyModuleResolver::new());

    let ttl = defaults.ttl;
    engine.register_fn("defaultTTL", move || ttl as i64);

    let environment = defaults.environment;
    engine.register_fn("environment", move || environment.clone());

    engine.register_fn("defaultName", |container: Map| {
        map_string(&container, "Name")
            .trim_start_matches('/')
            .to_string()
    });
    engine.register_fn("cleanImageImage", |container: Map| {
        clean_image_image(&config_image(&container))
    });
    engine.register_fn("cleanImageName", |container: Map| {
        clean_image_name(&config_image(&container))
    });

    engine
}

fn map_string(map: &Map, key: &str) -> String {
    map.get(key)
        .cloned()
        .and_then(|value| value.into_string().ok())
        .unwrap_or_default()
}

fn config_image(container: &Map) -> String {
    let config = container
        .get("Config")
        .cloned()
        .and_then(|value| value.try_cast::<Map>())
        .unwrap_or_default();
    map_string(&config, "Image")
}
