//! Configuration and flag parsing for skybridge.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BridgeError;

/// Environment variable consulted for the registry address when neither
/// `--skydns` nor `--name` is given.
pub const SKYDNS_ADDR_ENV: &str = "SKYDNS_PORT_8080_TCP_ADDR";

/// Port the registry's HTTP API listens on when the URL is composed from a
/// container address.
pub const SKYDNS_PORT: u16 = 8080;

/// Daemon configuration, immutable after [`Config::validate`].
#[derive(Debug, Clone, Parser)]
#[command(name = "skybridge", version)]
#[command(about = "Registers containers in a SkyDNS registry as they start and stop")]
pub struct Config {
    /// Path to the container host unix socket.
    #[arg(short = 's', long = "socket", default_value = "/var/run/docker.sock")]
    pub socket: String,

    /// URL of the registry's HTTP API.
    #[arg(long = "skydns", default_value = "")]
    pub skydns_url: String,

    /// Name of the container running the registry; its address is used to
    /// compose the URL. Mutually exclusive with --skydns.
    #[arg(long = "name", default_value = "")]
    pub registry_name: String,

    /// Shared secret forwarded to the registry.
    #[arg(long, default_value = "")]
    pub secret: String,

    /// DNS domain the registry serves.
    #[arg(long, default_value = "")]
    pub domain: String,

    /// Environment label stamped on every record.
    #[arg(long, default_value = "dev")]
    pub environment: String,

    /// Default record TTL in seconds.
    #[arg(long, default_value_t = 60)]
    pub ttl: u32,

    /// Heartbeat interval in seconds; 0 derives it from the TTL.
    #[arg(long, default_value_t = 0)]
    pub beat: u64,

    /// Number of concurrent event handlers.
    #[arg(long, default_value_t = 3)]
    pub workers: usize,

    /// Policy script path. Without it the built-in default policy is used.
    #[arg(long = "plugins")]
    pub plugins: Option<PathBuf>,
}

impl Config {
    /// Check flag consistency and fill derived defaults.
    ///
    /// After this returns Ok, `beat` is a positive interval and exactly one
    /// registry endpoint source is set (`skydns_url` or `registry_name`).
    pub fn validate(&mut self) -> Result<(), BridgeError> {
        if self.domain.is_empty() {
            return Err(BridgeError::Config("--domain is required".to_string()));
        }
        if self.ttl == 0 {
            return Err(BridgeError::Config("--ttl must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(BridgeError::Config("--workers must be at least 1".to_string()));
        }
        if !self.skydns_url.is_empty() && !self.registry_name.is_empty() {
            return Err(BridgeError::Config(
                "specify --skydns or --name, not both".to_string(),
            ));
        }
        if self.skydns_url.is_empty() && self.registry_name.is_empty() {
            let addr = std::env::var(SKYDNS_ADDR_ENV).unwrap_or_default();
            if addr.is_empty() {
                return Err(BridgeError::Config(format!(
                    "no registry endpoint: set --skydns, --name, or {SKYDNS_ADDR_ENV}"
                )));
            }
            self.skydns_url = format!("http://{addr}:{SKYDNS_PORT}");
        }
        if self.beat == 0 {
            self.beat = derive_beat(self.ttl);
        }
        Ok(())
    }

    /// The heartbeat interval as a [`Duration`].
    pub fn beat_interval(&self) -> Duration {
        Duration::from_secs(self.beat)
    }
}

/// Derive the heartbeat interval from the TTL: three quarters of it, leaving
/// a margin before expiry. Clamped to one second so tiny TTLs cannot produce
/// a zero interval.
pub(crate) fn derive_beat(ttl: u32) -> u64 {
    u64::from(ttl - ttl / 4).max(1)
}
