//! External weather fetch
//!
//! One HTTP GET against the OpenWeatherMap current-weather endpoint,
//! decoded into an [`ExternalReading`]. Numbers keep the type the
//! provider sent: a JSON integer stays an integer all the way to the
//! published payload, a float stays a float. Pressure arrives in hPa and
//! is republished in Pa.
//!
//! Caching, cadence, and failure tolerance live in the core
//! [`WeatherCache`](aeris_core::cache::WeatherCache); this client is one
//! attempt, one result.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use aeris_core::cache::{ExternalReading, WeatherSource};
use aeris_core::errors::FetchError;
use aeris_core::measurement::Scalar;

const ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

/// OpenWeatherMap client for a fixed location.
pub struct OwmClient {
    agent: ureq::Agent,
    api_key: String,
    latitude: f64,
    longitude: f64,
}

impl OwmClient {
    /// Client for a fixed lat/lon with sane timeouts.
    pub fn new(api_key: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            api_key: api_key.into(),
            latitude,
            longitude,
        }
    }
}

impl WeatherSource for OwmClient {
    fn fetch(&mut self) -> Result<ExternalReading, FetchError> {
        let response = self
            .agent
            .get(ENDPOINT)
            .query("lat", &self.latitude.to_string())
            .query("lon", &self.longitude.to_string())
            .query("units", "metric")
            .query("appid", &self.api_key)
            .call()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        let body = response
            .into_string()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        debug!("weather response: {} bytes", body.len());
        parse_reading(&body)
    }
}

/// Pull a number out of a JSON object, preserving int-ness.
fn scalar(object: &Value, key: &str) -> Option<Scalar> {
    let v = object.get(key)?;
    if let Some(i) = v.as_i64() {
        Some(Scalar::Int(i))
    } else {
        v.as_f64().map(Scalar::Float)
    }
}

/// hPa to Pa, without losing int-ness.
fn to_pascal(s: Scalar) -> Scalar {
    match s {
        Scalar::Int(i) => Scalar::Int(i.saturating_mul(100)),
        Scalar::Float(f) => Scalar::Float(f * 100.0),
    }
}

/// Decode an OpenWeatherMap current-weather body. Missing channels
/// decode to `None`; a body without a `main` object is a parse fault.
pub fn parse_reading(body: &str) -> Result<ExternalReading, FetchError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    let main = root
        .get("main")
        .filter(|m| m.is_object())
        .ok_or_else(|| FetchError::Parse("response has no main object".to_string()))?;
    Ok(ExternalReading {
        temperature: scalar(main, "temp"),
        feels_like: scalar(main, "feels_like"),
        humidity: scalar(main, "humidity"),
        pressure: scalar(main, "pressure").map(to_pascal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_typical_response() {
        let body = r#"{
            "main": {
                "temp": 4.56,
                "feels_like": 1.2,
                "pressure": 1013,
                "humidity": 81
            },
            "wind": {"speed": 5.1}
        }"#;
        let reading = parse_reading(body).unwrap();
        assert_eq!(reading.temperature, Some(Scalar::Float(4.56)));
        assert_eq!(reading.feels_like, Some(Scalar::Float(1.2)));
        // Integers from the provider stay integers.
        assert_eq!(reading.humidity, Some(Scalar::Int(81)));
        // hPa from the provider, Pa on the wire.
        assert_eq!(reading.pressure, Some(Scalar::Int(101_300)));
    }

    #[test]
    fn float_pressure_stays_float() {
        let body = r#"{"main": {"pressure": 1013.25}}"#;
        let reading = parse_reading(body).unwrap();
        assert_eq!(reading.pressure, Some(Scalar::Float(101_325.0)));
    }

    #[test]
    fn missing_channels_decode_to_none() {
        let body = r#"{"main": {"temp": 20}}"#;
        let reading = parse_reading(body).unwrap();
        assert_eq!(reading.temperature, Some(Scalar::Int(20)));
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.pressure, None);
    }

    #[test]
    fn missing_main_object_is_a_parse_fault() {
        assert!(matches!(
            parse_reading(r#"{"cod": 401, "message": "bad key"}"#),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn malformed_body_is_a_parse_fault() {
        assert!(matches!(
            parse_reading("<html>gateway error</html>"),
            Err(FetchError::Parse(_))
        ));
    }
}
