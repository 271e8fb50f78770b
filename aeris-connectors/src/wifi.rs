//! Wi-Fi connectivity manager
//!
//! Walks a priority-ordered list of known networks. A network only
//! counts as connected once two things hold: the radio reports
//! association, and a reachability probe confirms actual internet access
//! (captive portals and dead uplinks fail the second check). A network
//! that associates but cannot reach the internet is explicitly
//! disconnected before the next candidate is tried, so the radio never
//! camps on a useless association.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use aeris_core::errors::LinkError;
use aeris_core::retry::Sleeper;
use aeris_core::traits::Link;

/// Association polls per candidate before giving up on it.
const ASSOCIATION_POLLS: u32 = 10;

/// Spacing between association polls.
const ASSOCIATION_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A known network with its join priority (lower joins first).
#[derive(Debug, Clone)]
pub struct NetworkCandidate {
    /// Network name.
    pub ssid: String,
    /// Pre-shared key.
    pub psk: String,
    /// Join order; lower is tried first.
    pub priority: u32,
}

/// Seam over the radio itself.
pub trait WifiDevice {
    /// SSIDs currently visible to the radio.
    fn scan(&mut self) -> Vec<String>;

    /// Begin association with a network. Returns immediately; completion
    /// is observed via [`WifiDevice::is_associated`].
    fn start_join(&mut self, ssid: &str, psk: &str) -> Result<(), LinkError>;

    /// Whether the radio currently holds an association.
    fn is_associated(&mut self) -> bool;

    /// Drop the current association, if any.
    fn disconnect(&mut self);
}

/// Seam over the internet reachability check.
pub trait ReachabilityProbe {
    /// Whether the internet is reachable through the current association.
    fn internet_reachable(&mut self) -> bool;
}

/// Probes reachability by opening a TCP connection to well-known public
/// DNS resolvers. Any one target answering is sufficient.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    targets: Vec<SocketAddr>,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            targets: vec![
                SocketAddr::from(([8, 8, 8, 8], 53)),
                SocketAddr::from(([1, 1, 1, 1], 53)),
            ],
            timeout: Duration::from_secs(3),
        }
    }
}

impl TcpProbe {
    /// Probe with custom targets and timeout.
    pub fn new(targets: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self { targets, timeout }
    }
}

impl ReachabilityProbe for TcpProbe {
    fn internet_reachable(&mut self) -> bool {
        self.targets.iter().any(|addr| {
            match TcpStream::connect_timeout(addr, self.timeout) {
                Ok(_) => true,
                Err(e) => {
                    debug!("reachability probe to {addr} failed: {e}");
                    false
                }
            }
        })
    }
}

/// The connectivity manager. One pass over the candidate list per
/// `connect` call; the supervisor's retry engine supplies persistence.
pub struct WifiManager {
    device: Box<dyn WifiDevice>,
    probe: Box<dyn ReachabilityProbe>,
    sleeper: Box<dyn Sleeper>,
    candidates: Vec<NetworkCandidate>,
}

impl WifiManager {
    /// Build a manager over a radio and a probe. Candidates are sorted by
    /// priority once, here.
    pub fn new(
        device: Box<dyn WifiDevice>,
        probe: Box<dyn ReachabilityProbe>,
        sleeper: Box<dyn Sleeper>,
        mut candidates: Vec<NetworkCandidate>,
    ) -> Self {
        candidates.sort_by_key(|c| c.priority);
        Self {
            device,
            probe,
            sleeper,
            candidates,
        }
    }

    fn try_candidate(&mut self, candidate: &NetworkCandidate) -> bool {
        if let Err(e) = self.device.start_join(&candidate.ssid, &candidate.psk) {
            warn!("join of {:?} failed to start: {e}", candidate.ssid);
            return false;
        }
        for _ in 0..ASSOCIATION_POLLS {
            if self.device.is_associated() {
                if self.probe.internet_reachable() {
                    info!("connected to {:?} with internet access", candidate.ssid);
                    return true;
                }
                warn!(
                    "{:?} associated but has no internet access, disconnecting",
                    candidate.ssid
                );
                self.device.disconnect();
                return false;
            }
            self.sleeper.sleep(ASSOCIATION_POLL_INTERVAL);
        }
        warn!("association with {:?} timed out", candidate.ssid);
        self.device.disconnect();
        false
    }
}

impl Link for WifiManager {
    fn connect(&mut self) -> Result<(), LinkError> {
        // An existing association is kept only if it actually reaches the
        // internet; a dead or captive one is dropped before scanning.
        if self.device.is_associated() {
            if self.probe.internet_reachable() {
                debug!("existing association is healthy, keeping it");
                return Ok(());
            }
            warn!("existing association has no internet access, disconnecting");
            self.device.disconnect();
        }

        if self.candidates.is_empty() {
            return Err(LinkError::NoCandidate);
        }
        let visible = self.device.scan();
        let candidates = self.candidates.clone();
        for candidate in &candidates {
            if !visible.contains(&candidate.ssid) {
                debug!("network {:?} not in scan results, skipping", candidate.ssid);
                continue;
            }
            if self.try_candidate(candidate) {
                return Ok(());
            }
        }
        Err(LinkError::NoCandidate)
    }

    fn is_up(&mut self) -> bool {
        // Association alone is not enough; a link that lost its uplink
        // must read as down so the supervisor reconnects.
        self.device.is_associated() && self.probe.internet_reachable()
    }
}
