//! Sensor fleet tracker
//!
//! Owns every configured sensor and its health state. The policy, in one
//! place:
//!
//! - Initialization is independent per sensor; one sensor failing to come
//!   up never blocks the others. A failed slot stays in the fleet with no
//!   driver until recovery re-acquires it.
//! - A read that faults, or that returns a reading with every channel
//!   null, increments that sensor's consecutive-failure counter. Only a
//!   full success clears the counter - no partial credit.
//! - At `max_failures` consecutive failures the sensor flips to Failed
//!   exactly once and the fleet reports `recovery_needed`.
//! - Recovery only touches Failed sensors and must be validated by an
//!   immediate read with at least one non-null channel before the sensor
//!   is trusted again. Recovery faults are logged, never propagated.
//!
//! Rate-limiting of recovery sweeps is the supervisor's job, not the
//! fleet's.

use log::{error, info, warn};

use crate::measurement::Measurement;
use crate::sensor::{SensorInit, SensorSlot, SensorStatus};

/// Default consecutive-failure threshold before a sensor is demoted.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// The full set of configured sensors and their tracked health state.
pub struct Fleet {
    slots: Vec<SensorSlot>,
    max_failures: u32,
}

impl Fleet {
    /// Initialize every configured sensor, one independent attempt each.
    pub fn initialize_all(configs: Vec<(String, SensorInit)>, max_failures: u32) -> Self {
        let slots = configs
            .into_iter()
            .map(|(name, init)| SensorSlot::initialize(name, init))
            .collect::<Vec<_>>();
        for slot in &slots {
            if slot.status == SensorStatus::Failed {
                warn!("sensor {} starts without a working driver", slot.name);
            }
        }
        Self {
            slots,
            max_failures,
        }
    }

    /// True when any sensor is Failed and awaiting recovery.
    pub fn recovery_needed(&self) -> bool {
        self.slots.iter().any(|s| s.status == SensorStatus::Failed)
    }

    /// Change the demotion threshold (remote `config` command).
    pub fn set_max_failures(&mut self, max_failures: u32) {
        self.max_failures = max_failures.max(1);
    }

    /// Number of configured sensors.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no sensors are configured.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read-only view of the slots, in configuration order.
    pub fn slots(&self) -> &[SensorSlot] {
        &self.slots
    }

    /// Read every Active sensor once. Failed sensors contribute an
    /// all-null placeholder so the published record keeps its shape.
    pub fn read_all(&mut self) -> Vec<(String, Measurement)> {
        let max_failures = self.max_failures;
        self.slots
            .iter_mut()
            .map(|slot| {
                let reading = Self::read_slot(slot, max_failures);
                (slot.name.clone(), reading)
            })
            .collect()
    }

    fn read_slot(slot: &mut SensorSlot, max_failures: u32) -> Measurement {
        if slot.status != SensorStatus::Active {
            return Measurement::default();
        }
        let outcome = match slot.driver.as_mut() {
            Some(driver) => driver.read(),
            None => Err(crate::errors::SensorError::NotInitialized),
        };
        match outcome {
            Ok(reading) if !reading.is_empty() => {
                slot.consecutive_failures = 0;
                slot.last_reading = Some(reading);
                reading
            }
            // An all-null reading counts identically to a bus fault.
            Ok(_) | Err(_) => {
                slot.consecutive_failures += 1;
                if slot.consecutive_failures >= max_failures {
                    slot.status = SensorStatus::Failed;
                    error!(
                        "sensor {} marked failed after {} consecutive bad reads",
                        slot.name, slot.consecutive_failures
                    );
                }
                Measurement::default()
            }
        }
    }

    /// Attempt to restore every Failed sensor. A sensor that never
    /// initialized gets a full re-acquire from its original bus config;
    /// one that used to work gets a driver reset. Either path is only
    /// trusted after a follow-up read with at least one non-null channel.
    pub fn attempt_recovery(&mut self) {
        for slot in &mut self.slots {
            if slot.status != SensorStatus::Failed {
                continue;
            }
            info!("attempting recovery for sensor {}", slot.name);
            match Self::recover_slot(slot) {
                Ok(reading) => {
                    slot.status = SensorStatus::Active;
                    slot.consecutive_failures = 0;
                    slot.last_reading = Some(reading);
                    info!("sensor {} recovered", slot.name);
                }
                Err(e) => {
                    warn!("recovery failed for sensor {}: {e}", slot.name);
                }
            }
        }
    }

    fn recover_slot(slot: &mut SensorSlot) -> Result<Measurement, crate::errors::SensorError> {
        let reacquired = match slot.driver.as_mut() {
            None => {
                // Never initialized: full re-acquire from the original bus
                // configuration.
                let driver = (slot.init)()?;
                slot.driver = Some(driver);
                true
            }
            Some(driver) => {
                driver.reset()?;
                false
            }
        };
        let driver = slot
            .driver
            .as_mut()
            .ok_or(crate::errors::SensorError::NotInitialized)?;
        let validated = match driver.read() {
            Ok(reading) if !reading.is_empty() => Ok(reading),
            Ok(_) => Err(crate::errors::SensorError::NoData),
            Err(e) => Err(e),
        };
        if validated.is_err() && reacquired {
            // The fresh handle never produced data; discard it so the next
            // sweep retries the full re-acquire.
            slot.driver = None;
        }
        validated
    }
}
