//! Error taxonomy for the node
//!
//! One enum per failure class, matching how the supervisor reacts:
//!
//! - [`SetupError`] — a load-bearing subsystem could not be established
//!   after bounded retries. The only fatal class: log critical, pause so
//!   the log flushes, restart the device.
//! - [`BrokerError`] — session-level MQTT faults. `Publish` and `Inbound`
//!   mark the session down for the next tick's repair path; never fatal.
//! - [`SensorError`] — a single read or reset failed. Counted per sensor,
//!   never restarts the node.
//! - [`FetchError`] — the external weather fetch failed. The cache keeps
//!   its last-known-good value and retries next tick.
//! - [`CommandError`] — a malformed inbound command. Logged and dropped.

use thiserror::Error;

/// Fatal setup-class failures. Every variant ends in a device restart.
#[derive(Debug, Error)]
pub enum SetupError {
    /// No configured Wi-Fi network produced a usable link after retries.
    #[error("no usable Wi-Fi link after {attempts} attempts")]
    LinkExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The broker session could not be (re)established after retries.
    #[error("broker session unavailable after {attempts} attempts")]
    BrokerExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Wi-Fi link failures, as seen by the connectivity manager.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Scan completed but no configured network was both joinable and
    /// internet-reachable.
    #[error("no candidate network is associated and reachable")]
    NoCandidate,

    /// The radio itself misbehaved (scan or association fault).
    #[error("wifi device fault: {0}")]
    Device(String),
}

/// Broker session failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Connect or CONNACK handshake failed.
    #[error("broker connect failed: {0}")]
    Connect(String),

    /// SUBACK never arrived or subscribe was rejected.
    #[error("subscribe failed for {topic}: {reason}")]
    Subscribe {
        /// Topic that failed.
        topic: String,
        /// Transport-level reason.
        reason: String,
    },

    /// A publish failed mid-session. Distinguished so the supervisor
    /// triggers reconnect-and-resubscribe instead of generic handling.
    #[error("publish failed on {topic}: {reason}")]
    Publish {
        /// Topic that failed.
        topic: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The inbound poll faulted (including plain timeout at the transport
    /// layer). Connection presumed lost.
    #[error("inbound poll failed: {0}")]
    Inbound(String),
}

/// Per-sensor failures.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The bus transaction failed.
    #[error("bus fault: {0}")]
    Bus(String),

    /// The sensor answered but every channel was null.
    #[error("sensor returned no data")]
    NoData,

    /// The sensor never initialized and has no live handle.
    #[error("sensor not initialized")]
    NotInitialized,
}

/// External weather fetch failures.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level HTTP failure (timeout included).
    #[error("http fetch failed: {0}")]
    Http(String),

    /// The provider answered with something we could not normalize.
    #[error("unexpected provider response: {0}")]
    Parse(String),
}

/// Best-effort time sync failure (RTC/NTP collaborator).
#[derive(Debug, Error)]
#[error("time sync failed: {0}")]
pub struct SyncError(pub String);

/// Inbound command parse failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The verb is not in the grammar.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// The verb is known but its argument is missing or malformed.
    #[error("bad argument for {verb}: {reason}")]
    BadArgument {
        /// Command verb.
        verb: &'static str,
        /// What was wrong.
        reason: String,
    },
}
