//! Measurement values and publish formatting
//!
//! Telemetry payloads are decimal-formatted ASCII: floats with exactly two
//! decimal places, integers passed through unchanged, and the literal
//! string `None` for an absent reading. [`Scalar`] keeps the float/integer
//! distinction all the way from the provider response to the wire so a
//! humidity of `61` publishes as `"61"`, not `"61.00"`.

use std::fmt;

/// A single numeric reading, preserving whether the source gave an
/// integer or a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Floating-point reading; formats with two decimal places.
    Float(f64),
    /// Integer reading; formats unchanged.
    Int(i64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Float(v) => write!(f, "{v:.2}"),
            Scalar::Int(v) => write!(f, "{v}"),
        }
    }
}

impl Scalar {
    /// Value as f64 regardless of representation.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Float(v) => v,
            Scalar::Int(v) => v as f64,
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

/// Format an optional reading for publishing.
pub fn payload(value: Option<Scalar>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "None".to_string(),
    }
}

/// One sensor's reading. Channels a given sensor does not provide stay
/// `None`; a reading with every channel `None` counts as a failed read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temperature: Option<Scalar>,
    /// Relative humidity in percent.
    pub humidity: Option<Scalar>,
    /// Pressure in pascals.
    pub pressure: Option<Scalar>,
}

impl Measurement {
    /// True when no channel has a value - an ill-formed read.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.pressure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn float_formats_two_decimals() {
        assert_eq!(payload(Some(Scalar::Float(21.456))), "21.46");
        assert_eq!(payload(Some(Scalar::Float(-3.0))), "-3.00");
    }

    #[test]
    fn integer_passes_through() {
        assert_eq!(payload(Some(Scalar::Int(1013))), "1013");
        assert_eq!(payload(Some(Scalar::Int(-7))), "-7");
    }

    #[test]
    fn absent_reading_is_literal_none() {
        assert_eq!(payload(None), "None");
    }

    #[test]
    fn empty_measurement() {
        assert!(Measurement::default().is_empty());
        let m = Measurement {
            humidity: Some(Scalar::Int(40)),
            ..Default::default()
        };
        assert!(!m.is_empty());
    }

    proptest! {
        #[test]
        fn float_payload_always_has_two_decimals(v in -1e6f64..1e6) {
            let s = payload(Some(Scalar::Float(v)));
            let (_, frac) = s.split_once('.').expect("decimal point");
            prop_assert_eq!(frac.len(), 2);
        }
    }
}
