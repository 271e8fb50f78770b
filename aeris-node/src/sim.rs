//! Simulated sensor drivers
//!
//! Stand-ins for the I2C/1-Wire drivers used on hardware, so the full
//! pipeline runs on a host. Each simulated sensor drifts around a
//! baseline with a small deterministic wobble; the sequence is seeded
//! per sensor, so two runs produce the same trace.

use aeris_core::errors::SensorError;
use aeris_core::measurement::{Measurement, Scalar};
use aeris_core::sensor::{Sensor, SensorInit};

/// Channels a simulated sensor populates.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

/// Deterministic wobble generator (xorshift).
#[derive(Debug)]
struct Wobble(u64);

impl Wobble {
    fn next(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        // Scale into [-0.5, 0.5).
        (x % 1000) as f64 / 1000.0 - 0.5
    }
}

/// A simulated sensor.
#[derive(Debug)]
pub struct SimSensor {
    baseline: Baseline,
    wobble: Wobble,
}

impl SimSensor {
    fn new(seed: u64, baseline: Baseline) -> Self {
        Self {
            baseline,
            wobble: Wobble(seed.max(1)),
        }
    }

    /// Indoor temperature and humidity, like an SHT30.
    pub fn hygro() -> Self {
        Self::new(
            11,
            Baseline {
                temperature: Some(21.5),
                humidity: Some(40.0),
                pressure: None,
            },
        )
    }

    /// Temperature and barometric pressure, like a BMP280.
    pub fn baro() -> Self {
        Self::new(
            23,
            Baseline {
                temperature: Some(21.2),
                humidity: None,
                pressure: Some(99_500.0),
            },
        )
    }

    /// Temperature-only probe, like a DS18B20.
    pub fn probe() -> Self {
        Self::new(
            37,
            Baseline {
                temperature: Some(18.0),
                humidity: None,
                pressure: None,
            },
        )
    }
}

impl Sensor for SimSensor {
    fn read(&mut self) -> Result<Measurement, SensorError> {
        let mut channel = |base: Option<f64>, spread: f64| {
            base.map(|b| Scalar::Float(b + self.wobble.next() * spread))
        };
        Ok(Measurement {
            temperature: channel(self.baseline.temperature, 0.6),
            humidity: channel(self.baseline.humidity, 3.0),
            pressure: channel(self.baseline.pressure, 80.0),
        })
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        Ok(())
    }
}

/// The simulated fleet, in the order telemetry assembly expects.
pub fn fleet_configs() -> Vec<(String, SensorInit)> {
    vec![
        (
            "sht30".to_string(),
            Box::new(|| Ok(Box::new(SimSensor::hygro()) as Box<dyn Sensor>)) as SensorInit,
        ),
        (
            "bmp280".to_string(),
            Box::new(|| Ok(Box::new(SimSensor::baro()) as Box<dyn Sensor>)) as SensorInit,
        ),
        (
            "ds18b20".to_string(),
            Box::new(|| Ok(Box::new(SimSensor::probe()) as Box<dyn Sensor>)) as SensorInit,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_near_baseline() {
        let mut sensor = SimSensor::hygro();
        for _ in 0..32 {
            let m = sensor.read().unwrap();
            let Some(Scalar::Float(t)) = m.temperature else {
                panic!("expected a temperature");
            };
            assert!((21.0..22.0).contains(&t), "temperature drifted to {t}");
            assert!(m.humidity.is_some());
            assert!(m.pressure.is_none());
        }
    }

    #[test]
    fn traces_are_deterministic() {
        let mut a = SimSensor::baro();
        let mut b = SimSensor::baro();
        for _ in 0..8 {
            assert_eq!(a.read().unwrap(), b.read().unwrap());
        }
    }

    #[test]
    fn fleet_covers_all_three_roles() {
        let names: Vec<String> = fleet_configs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["sht30", "bmp280", "ds18b20"]);
    }
}
