//! Collaborator seams for the supervisor
//!
//! Every piece of hardware or transport the supervisor touches lives
//! behind one of these traits. Keep them small: the point is that the
//! whole engine runs against fakes in tests, and the node binary swaps in
//! real radios and sockets without the core noticing.

use crate::errors::{BrokerError, LinkError, SyncError};

/// The Wi-Fi link, as managed by the connectivity manager.
pub trait Link {
    /// Establish (or re-validate) an internet-reachable association.
    /// One full pass over the configured networks; callers wrap this in
    /// the retrier.
    fn connect(&mut self) -> Result<(), LinkError>;

    /// Direct poll of the association state. Does not probe reachability.
    fn is_up(&mut self) -> bool;
}

/// The telemetry broker session.
pub trait Broker {
    /// Connect and register the last-will message. One attempt; callers
    /// wrap this in the retrier.
    fn connect(&mut self) -> Result<(), BrokerError>;

    /// Subscribe to every topic the supervisor cares about. Must be
    /// re-run after every reconnect; sessions are not persistent.
    fn subscribe(&mut self, topics: &[&str]) -> Result<(), BrokerError>;

    /// Publish a topic→payload record. A transport failure on any entry
    /// returns [`BrokerError::Publish`].
    fn publish(&mut self, record: &[(String, String)]) -> Result<(), BrokerError>;

    /// Drain inbound messages without blocking for long. Any fault means
    /// connection presumed lost.
    fn poll_inbound(&mut self) -> Result<Vec<(String, String)>, BrokerError>;
}

/// Why the device last restarted, for the boot status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// First power-up.
    PowerOn,
    /// Physical reset or power cycle.
    Hard,
    /// Watchdog fired.
    Watchdog,
    /// Woke from deep sleep.
    DeepSleepWake,
    /// Software-requested reset.
    Soft,
    /// Cause not reported by the platform.
    Unknown,
}

impl std::fmt::Display for ResetCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResetCause::PowerOn => "power on reset",
            ResetCause::Hard => "hard reset",
            ResetCause::Watchdog => "watchdog reset",
            ResetCause::DeepSleepWake => "wake from deep sleep",
            ResetCause::Soft => "soft reset",
            ResetCause::Unknown => "unknown reset cause",
        };
        f.write_str(s)
    }
}

/// Device-level operations.
pub trait Platform {
    /// Cause of the previous restart.
    fn reset_cause(&self) -> ResetCause;

    /// Request a full device restart. The supervisor stops ticking after
    /// calling this; the platform decides how the restart happens.
    fn restart(&mut self);

    /// Disable the conflicting access-point radio mode before associating
    /// as a station. Best effort.
    fn disable_access_point(&mut self);
}

/// Status LED. Off in Normal mode, on in Degraded.
pub trait StatusLed {
    /// Drive the LED.
    fn set(&mut self, on: bool);

    /// Invert the LED state (remote `toggleled`).
    fn toggle(&mut self);
}

/// Battery-backed clock collaborator.
///
/// The hardware alarm fires in interrupt context; implementations only
/// latch a flag there, and the supervisor does the actual blocking sync
/// from inside the tick (`take_alarm` + [`Rtc::sync`]).
pub trait Rtc {
    /// Re-sync the clock against its time source. Best effort: failure
    /// disables fallback timestamps, never the node.
    fn sync(&mut self) -> Result<(), SyncError>;

    /// Consume the pending-alarm flag set by the alarm interrupt.
    fn take_alarm(&mut self) -> bool;
}

/// Over-the-air file updater collaborator.
pub trait Updater {
    /// Download `url` into `filename`, optionally validating a sha256 hex
    /// digest, replacing the previous version atomically. Returns whether
    /// the replacement happened.
    fn download_and_replace(&mut self, url: &str, filename: &str, checksum: Option<&str>) -> bool;
}
