//! Core resilience engine for Aeris
//!
//! Aeris is firmware-style software for an environmental-monitoring node:
//! local sensors plus an external weather fetch, published over MQTT, driven
//! by a single-threaded tick loop that must survive flaky Wi-Fi, flaky
//! brokers, and flaky sensors indefinitely.
//!
//! This crate holds everything that does not touch a wire: the bounded
//! retry engine, the sensor fleet health tracker, the external data cache,
//! payload formatting, the inbound command grammar, and the supervisor that
//! ties them into one operating-mode state machine. All I/O goes through
//! the collaborator traits in [`traits`], so the whole engine runs against
//! fakes in tests.
//!
//! ```no_run
//! use aeris_core::retry::{retry, RetryPolicy, StdSleeper};
//!
//! let policy = RetryPolicy::default();
//! let mut sleeper = StdSleeper;
//! let link = retry("wifi", &policy, &mut sleeper, || dial_wifi());
//! # fn dial_wifi() -> Result<(), std::io::Error> { Ok(()) }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod command;
pub mod errors;
pub mod fleet;
pub mod logfile;
pub mod measurement;
pub mod retry;
pub mod sensor;
pub mod supervisor;
pub mod telemetry;
pub mod time;
pub mod traits;

// Public API
pub use cache::{ExternalReading, WeatherCache};
pub use command::Command;
pub use errors::{BrokerError, CommandError, FetchError, LinkError, SensorError, SetupError};
pub use fleet::Fleet;
pub use measurement::{Measurement, Scalar};
pub use retry::{retry, RetryPolicy};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorParts, SystemMode};

/// Crate version string, for the boot status line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
