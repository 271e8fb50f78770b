//! Host-side platform bindings
//!
//! On real hardware these map to the SoC reset controller, a GPIO LED,
//! and a battery-backed RTC. On a host the node runs under a process
//! supervisor, so restart is a clean exit and the RTC is the NTP-synced
//! system clock.

use log::{debug, info};

use aeris_core::errors::{LinkError, SyncError};
use aeris_core::traits::{Platform, ResetCause, Rtc, StatusLed};
use aeris_connectors::wifi::WifiDevice;

/// Exit code asking the process supervisor to start us again.
const RESTART_EXIT_CODE: i32 = 0;

/// Platform backed by the host process.
#[derive(Debug, Default)]
pub struct StdPlatform;

impl Platform for StdPlatform {
    fn reset_cause(&self) -> ResetCause {
        // The host exposes no reset controller.
        ResetCause::Unknown
    }

    fn restart(&mut self) {
        info!("exiting for restart by the process supervisor");
        log::logger().flush();
        std::process::exit(RESTART_EXIT_CODE);
    }

    fn disable_access_point(&mut self) {
        // No AP interface to shut down on a host.
    }
}

/// LED that reports its state on the debug log.
#[derive(Debug, Default)]
pub struct ConsoleLed {
    on: bool,
}

impl StatusLed for ConsoleLed {
    fn set(&mut self, on: bool) {
        if self.on != on {
            self.on = on;
            debug!("status led {}", if on { "on" } else { "off" });
        }
    }

    fn toggle(&mut self) {
        let on = !self.on;
        self.set(on);
    }
}

/// RTC backed by the system clock, which NTP keeps in sync.
#[derive(Debug, Default)]
pub struct SystemRtc;

impl Rtc for SystemRtc {
    fn sync(&mut self) -> Result<(), SyncError> {
        Ok(())
    }

    fn take_alarm(&mut self) -> bool {
        false
    }
}

/// "Radio" for a host whose kernel already manages the network. Joins
/// always succeed; reachability probing still decides whether the link
/// counts as up.
#[derive(Debug, Default)]
pub struct HostNic;

impl WifiDevice for HostNic {
    fn scan(&mut self) -> Vec<String> {
        // The kernel holds the association, so connect() takes the
        // already-associated branch and never consults scan results.
        Vec::new()
    }

    fn start_join(&mut self, ssid: &str, _psk: &str) -> Result<(), LinkError> {
        debug!("host nic: pretending to join {ssid:?}");
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        true
    }

    fn disconnect(&mut self) {}
}
