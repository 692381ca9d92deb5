//! Metrics instrumentation for skybridge.
//!
//! All metrics are prefixed with `skybridge.`. The crate only emits through
//! the facade; installing a recorder is up to the embedding process.

use metrics::{counter, gauge};

/// Record an event taken off the host's stream.
pub fn record_event(status: &str) {
    counter!("skybridge.event.count", "status" => status.to_string()).increment(1);
}

/// Outcome of a registration attempt, for labeling.
#[derive(Debug, Clone, Copy)]
pub enum RegistrationOutcome {
    /// Record added to the registry.
    Added,
    /// Key already present; TTL was reset instead.
    Conflict,
    /// Record removed from the registry.
    Removed,
    /// Container skipped (untagged image or not registrable).
    Skipped,
}

/// Record a registration attempt.
pub fn record_registration(outcome: RegistrationOutcome) {
    let outcome_str = match outcome {
        RegistrationOutcome::Added => "added",
        RegistrationOutcome::Conflict => "conflict",
        RegistrationOutcome::Removed => "removed",
        RegistrationOutcome::Skipped => "skipped",
    };

    counter!("skybridge.registration.count", "outcome" => outcome_str).increment(1);
}

/// Record a failed TTL refresh.
pub fn record_heartbeat_failure() {
    counter!("skybridge.heartbeat.failure.count").increment(1);
}

/// Record a heartbeat giving up after exhausting its error budget.
pub fn record_heartbeat_abort() {
    counter!("skybridge.heartbeat.abort.count").increment(1);
}

/// Record the number of live heartbeat loops.
pub fn record_live_heartbeats(count: usize) {
    gauge!("skybridge.heartbeat.live").set(count as f64);
}
