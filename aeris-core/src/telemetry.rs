//! Telemetry topic set and publish-record assembly
//!
//! One topic per measurement channel, all rooted at the broker username
//! (the Adafruit-IO feed convention), plus one status/log topic and one
//! inbound command topic. [`TopicSet::assemble`] folds the fleet readings
//! and the cached external reading into the topic→payload map the broker
//! session publishes each tick. Absent readings publish as the literal
//! string `None` so the record keeps its shape in degraded mode.

use crate::cache::ExternalReading;
use crate::measurement::{payload, Measurement};

/// Full set of topics this node publishes and subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    /// Indoor temperature.
    pub temperature: String,
    /// Indoor humidity.
    pub humidity: String,
    /// Outdoor temperature (external fetch).
    pub temperature_out: String,
    /// Outdoor feels-like temperature (external fetch).
    pub feels_like_out: String,
    /// Outdoor humidity (external fetch).
    pub humidity_out: String,
    /// Outdoor pressure (external fetch).
    pub pressure_out: String,
    /// Barometric sensor temperature.
    pub temperature_baro: String,
    /// Barometric sensor pressure.
    pub pressure: String,
    /// Auxiliary probe temperature.
    pub temperature_probe: String,
    /// Status and mirrored log lines.
    pub status: String,
    /// Inbound command feed (also the LWT topic).
    pub command: String,
}

impl TopicSet {
    /// Build the feed set for a broker user.
    pub fn for_user(user: &str) -> Self {
        let feed = |name: &str| format!("{user}/feeds/{name}");
        Self {
            temperature: feed("Temp"),
            humidity: feed("Humidity"),
            temperature_out: feed("Temp_out"),
            feels_like_out: feed("Temp_feels_like"),
            humidity_out: feed("Humidity_out"),
            pressure_out: feed("Pressure_out"),
            temperature_baro: feed("Temp_bmp"),
            pressure: feed("Pressure"),
            temperature_probe: feed("Temp_probe"),
            status: feed("Status"),
            command: feed("Command"),
        }
    }

    /// Fold one tick's readings into the topic→payload map, in channel
    /// order. Sensor names select channels: `bmp280` feeds the barometric
    /// pair, `ds18b20` the auxiliary probe, and the first sensor offering
    /// temperature or humidity feeds the indoor pair.
    pub fn assemble(
        &self,
        readings: &[(String, Measurement)],
        external: &ExternalReading,
    ) -> Vec<(String, String)> {
        let mut indoor = Measurement::default();
        let mut baro = Measurement::default();
        let mut probe = Measurement::default();
        for (name, m) in readings {
            match name.as_str() {
                "bmp280" => baro = *m,
                "ds18b20" => probe = *m,
                _ => {
                    if indoor.temperature.is_none() {
                        indoor.temperature = m.temperature;
                    }
                    if indoor.humidity.is_none() {
                        indoor.humidity = m.humidity;
                    }
                }
            }
        }

        vec![
            (self.temperature.clone(), payload(indoor.temperature)),
            (self.humidity.clone(), payload(indoor.humidity)),
            (self.temperature_out.clone(), payload(external.temperature)),
            (self.feels_like_out.clone(), payload(external.feels_like)),
            (self.humidity_out.clone(), payload(external.humidity)),
            (self.pressure_out.clone(), payload(external.pressure)),
            (self.temperature_baro.clone(), payload(baro.temperature)),
            (self.pressure.clone(), payload(baro.pressure)),
            (self.temperature_probe.clone(), payload(probe.temperature)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Scalar;

    #[test]
    fn feed_names_follow_user_root() {
        let topics = TopicSet::for_user("station");
        assert_eq!(topics.temperature, "station/feeds/Temp");
        assert_eq!(topics.command, "station/feeds/Command");
        assert_eq!(topics.status, "station/feeds/Status");
    }

    #[test]
    fn assemble_maps_channels_and_placeholders() {
        let topics = TopicSet::for_user("station");
        let readings = vec![
            (
                "aht25".to_string(),
                Measurement {
                    temperature: Some(Scalar::Float(21.456)),
                    humidity: Some(Scalar::Float(40.0)),
                    pressure: None,
                },
            ),
            (
                "bmp280".to_string(),
                Measurement {
                    temperature: Some(Scalar::Float(21.9)),
                    humidity: None,
                    pressure: Some(Scalar::Int(101_325)),
                },
            ),
            // ds18b20 failed this tick: all-null placeholder.
            ("ds18b20".to_string(), Measurement::default()),
        ];
        let external = ExternalReading {
            temperature: Some(Scalar::Float(18.0)),
            feels_like: Some(Scalar::Float(17.2)),
            humidity: Some(Scalar::Int(61)),
            pressure: Some(Scalar::Int(101_300)),
        };

        let record = topics.assemble(&readings, &external);
        assert_eq!(record.len(), 9);
        assert_eq!(record[0], ("station/feeds/Temp".into(), "21.46".into()));
        assert_eq!(record[1].1, "40.00");
        assert_eq!(record[2].1, "18.00");
        assert_eq!(record[4].1, "61");
        assert_eq!(record[6].1, "21.90");
        assert_eq!(record[7].1, "101325");
        assert_eq!(record[8].1, "None");
    }
}
