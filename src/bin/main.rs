//! skybridge binary entry point.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};

use skybridge::config::SKYDNS_PORT;
use skybridge::docker::{ContainerHost, DockerHost};
use skybridge::registry::Registry;
use skybridge::{
    telemetry, worker, Bridge, BuiltinPolicy, Config, HeartbeatConfig, Heartbeats, PolicyDefaults,
    ScriptPolicy, ServicePolicy, SkydnsClient,
};

/// Capacity of the event channel between the pump and the workers.
const EVENT_BUFFER: usize = 128;

fn fatal(err: &dyn std::fmt::Display) -> ! {
    eprintln!("{err}");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    let mut config = Config::parse();
    if let Err(e) = config.validate() {
        fatal(&e);
    }

    telemetry::init();
    info!(
        socket = %config.socket,
        domain = %config.domain,
        environment = %config.environment,
        ttl = config.ttl,
        beat = config.beat,
        workers = config.workers,
        plugins = ?config.plugins,
        "starting skybridge"
    );

    let defaults = PolicyDefaults {
        environment: config.environment.clone(),
        ttl: config.ttl,
    };
    let policy: Arc<dyn ServicePolicy> = match &config.plugins {
        Some(path) => match ScriptPolicy::load(path, defaults) {
            Ok(policy) => Arc::new(policy),
            Err(e) => fatal(&e),
        },
        None => Arc::new(BuiltinPolicy::new(defaults)),
    };

    let host = match DockerHost::connect(&config.socket) {
        Ok(host) => Arc::new(host),
        Err(e) => fatal(&e),
    };

    // A registry container name resolves to its current address.
    let registry_url = if config.registry_name.is_empty() {
        config.skydns_url.clone()
    } else {
        match host.fetch_container(&config.registry_name, "").await {
            Ok(container) => {
                format!("http://{}:{SKYDNS_PORT}", container.network_settings.ip_address)
            }
            Err(e) => fatal(&e),
        }
    };
    info!(url = %registry_url, "registry endpoint");

    let registry = match SkydnsClient::new(&registry_url, &config.secret) {
        Ok(registry) => registry,
        Err(e) => fatal(&e),
    };
    if let Err(e) = registry.ping().await {
        fatal(&e);
    }
    let registry: Arc<dyn Registry> = Arc::new(registry);

    let heartbeats = Heartbeats::new(
        registry.clone(),
        HeartbeatConfig {
            interval: config.beat_interval(),
            ttl: config.ttl,
        },
    );
    let bridge = Arc::new(Bridge::new(
        host.clone() as Arc<dyn ContainerHost>,
        registry,
        policy,
        heartbeats,
        config.ttl,
    ));

    debug!("restoring containers");
    if let Err(e) = bridge.restore().await {
        fatal(&e);
    }

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let pump_host = host.clone();
    tokio::spawn(async move { pump_host.pump_events(tx).await });

    debug!("starting event handlers");
    worker::run(bridge, rx, config.workers).await;
    info!("event stream closed, exiting");
}
