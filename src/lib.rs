//! skybridge - a bridge daemon from a local container host to a SkyDNS
//! service registry.
//!
//! The daemon watches the container host's lifecycle event stream. When a
//! container starts, a policy turns its metadata into a service record that
//! is registered under the container's short id; while it runs, a per-id
//! heartbeat refreshes the record before its TTL expires; when it stops,
//! the record is deleted. Other containers then discover peers through the
//! DNS names the registry composes from name, image, environment, and its
//! configured domain.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         skybridge                            │
//! │                                                              │
//! │  ┌─────────────┐  events   ┌─────────┐   handle  ┌────────┐  │
//! │  │ DockerHost  │──────────▶│ channel │──────────▶│ Bridge │  │
//! │  │ (event pump)│           └─────────┘  (N       └───┬────┘  │
//! │  └─────────────┘                        workers)     │       │
//! │        ▲                                 ┌───────────┤       │
//! │        │ inspect                         ▼           ▼       │
//! │        └──────────────────────────  ServicePolicy  Skydns ───┼──▶ registry
//! │                                                   + Heartbeats   HTTP API
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Restore runs before the first event is consumed, so the already-running
//! world is registered before deltas apply. The event stream's close is the
//! daemon's termination signal: the pump drops the channel sender, the
//! workers drain and return, and the process exits cleanly.

#![warn(missing_docs)]

pub mod bridge;
pub mod config;
pub mod docker;
pub mod error;
pub mod heartbeat;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod telemetry;
pub mod types;
pub mod worker;

// Re-export main types
pub use bridge::Bridge;
pub use config::Config;
pub use error::BridgeError;
pub use heartbeat::{HeartbeatConfig, Heartbeats};
pub use policy::{BuiltinPolicy, PolicyDefaults, ScriptPolicy, ServicePolicy};
pub use registry::{Registry, SkydnsClient};
pub use types::{Container, ContainerEvent, EventStatus, ServiceRecord};
