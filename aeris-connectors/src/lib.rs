//! Wire-facing connectors for Aeris
//!
//! Implementations of the collaborator traits from `aeris-core` against
//! real transports: Wi-Fi association and reachability probing, the MQTT
//! broker session, the external weather HTTP fetch, and over-the-air file
//! replacement. Everything here is deliberately thin; policy (retries,
//! health flags, cadence) lives in the core supervisor.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod mqtt;
pub mod ota;
pub mod weather;
pub mod wifi;

pub use mqtt::{MqttCredentials, MqttSession};
pub use ota::HttpUpdater;
pub use weather::OwmClient;
pub use wifi::{NetworkCandidate, ReachabilityProbe, TcpProbe, WifiDevice, WifiManager};
