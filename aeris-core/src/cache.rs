//! External weather data cache
//!
//! The weather provider only refreshes its "current" reading every few
//! minutes, so there is no point fetching on every tick. The cache keeps a
//! ticks-until-due counter: when it reaches zero the next [`WeatherCache::tick`]
//! performs exactly one fetch attempt.
//!
//! - Success overwrites the cached reading and re-arms the counter for a
//!   full interval.
//! - Failure keeps the previous reading (last-known-good) and leaves the
//!   counter at zero, so the very next tick retries instead of silently
//!   waiting out a whole interval.
//!
//! A fetch failure is logged but never surfaces to the aggregation path;
//! callers always get a reading, possibly all-null before the first
//! success.

use log::warn;

use crate::errors::FetchError;
use crate::measurement::Scalar;

/// The four-field contract every weather provider is normalized to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExternalReading {
    /// Outdoor temperature, degrees Celsius.
    pub temperature: Option<Scalar>,
    /// Apparent ("feels like") temperature, degrees Celsius.
    pub feels_like: Option<Scalar>,
    /// Outdoor relative humidity, percent.
    pub humidity: Option<Scalar>,
    /// Barometric pressure, pascals.
    pub pressure: Option<Scalar>,
}

/// Provider seam. Implementations must bound their network time with
/// explicit connect/read timeouts.
pub trait WeatherSource {
    /// One fetch attempt, normalized to [`ExternalReading`].
    fn fetch(&mut self) -> Result<ExternalReading, FetchError>;
}

/// Time-bucketed cache of the last successful external fetch.
pub struct WeatherCache {
    source: Box<dyn WeatherSource>,
    interval_ticks: u32,
    ticks_until_due: u32,
    last: ExternalReading,
}

impl WeatherCache {
    /// Cache fetching at most once every `interval_ticks` ticks. The first
    /// tick always fetches.
    pub fn new(source: Box<dyn WeatherSource>, interval_ticks: u32) -> Self {
        Self {
            source,
            interval_ticks: interval_ticks.max(1),
            ticks_until_due: 0,
            last: ExternalReading::default(),
        }
    }

    /// Called once per supervisor tick. Returns the freshest available
    /// reading without ever failing.
    pub fn tick(&mut self) -> ExternalReading {
        if self.ticks_until_due == 0 {
            match self.source.fetch() {
                Ok(reading) => {
                    self.last = reading;
                    self.ticks_until_due = self.interval_ticks - 1;
                }
                Err(e) => {
                    // Counter stays at zero: retry on the very next tick.
                    warn!("weather fetch failed, serving cached reading: {e}");
                }
            }
        } else {
            self.ticks_until_due -= 1;
        }
        self.last
    }

    /// The cached reading without advancing the counter.
    pub fn last(&self) -> ExternalReading {
        self.last
    }
}
