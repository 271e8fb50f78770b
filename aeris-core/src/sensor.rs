//! Sensor capability and per-sensor health record
//!
//! Raw bus drivers (I2C/SPI/1-Wire) live outside this crate; the core only
//! sees the [`Sensor`] capability and tracks each sensor's health in a
//! [`SensorSlot`]. A slot is created once per configured sensor and never
//! destroyed: a sensor that failed to initialize keeps an empty driver
//! until a recovery sweep re-acquires it.

use crate::errors::SensorError;
use crate::measurement::Measurement;

/// Capability every sensor driver implements.
pub trait Sensor {
    /// Take one measurement. A result with every channel `None` is treated
    /// by the fleet as a failed read.
    fn read(&mut self) -> Result<Measurement, SensorError>;

    /// Driver-level reset, used by recovery on a sensor that previously
    /// initialized.
    fn reset(&mut self) -> Result<(), SensorError>;
}

/// Constructor used both at fleet initialization and when recovery has to
/// re-acquire hardware from the original bus configuration.
pub type SensorInit = Box<dyn FnMut() -> Result<Box<dyn Sensor>, SensorError>>;

/// Health state of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// Reads are attempted every tick.
    Active,
    /// Threshold crossed; waits for a recovery sweep.
    Failed,
}

/// One configured sensor with its driver handle and failure bookkeeping.
pub struct SensorSlot {
    /// Unique name within the fleet; also selects its telemetry channels.
    pub name: String,
    pub(crate) init: SensorInit,
    /// Live driver, or `None` if initialization/recovery never succeeded.
    pub(crate) driver: Option<Box<dyn Sensor>>,
    /// Current health state.
    pub status: SensorStatus,
    /// Consecutive failed reads; reset to 0 only by a full success.
    pub consecutive_failures: u32,
    /// Most recent successful reading, if any.
    pub last_reading: Option<Measurement>,
}

impl SensorSlot {
    /// Attempt one independent initialization. A slot whose init fails is
    /// still created, marked [`SensorStatus::Failed`] with no driver.
    pub fn initialize(name: impl Into<String>, mut init: SensorInit) -> Self {
        let name = name.into();
        let driver = match init() {
            Ok(driver) => Some(driver),
            Err(e) => {
                log::error!("sensor {name} failed to initialize: {e}");
                None
            }
        };
        let status = if driver.is_some() {
            SensorStatus::Active
        } else {
            SensorStatus::Failed
        };
        Self {
            name,
            init,
            driver,
            status,
            consecutive_failures: 0,
            last_reading: None,
        }
    }
}

impl std::fmt::Debug for SensorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSlot")
            .field("name", &self.name)
            .field("initialized", &self.driver.is_some())
            .field("status", &self.status)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish()
    }
}
