use serde::{Deserialize, Serialize};
use std::fmt;

/// A single metadata value attached to a candidate.
///
/// GA databases store heterogeneous key-value pairs (scores, flags, generation
/// counters, free-form labels). Only numeric values can serve as regression
/// targets; see [`KeyValue::as_target`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    /// A boolean flag (e.g. `relaxed`, `extinct`).
    Bool(bool),
    /// An integer value (e.g. `generation`).
    Int(i64),
    /// A floating point value (e.g. `raw_score`).
    Float(f64),
    /// Free-form text.
    Text(String),
}

impl KeyValue {
    /// Returns the value as a regression target, if it is a *defined* label.
    ///
    /// Integers and booleans (as `0.0`/`1.0`) are accepted, floats only when finite.
    /// Text values are never defined labels.
    pub fn as_target(&self) -> Option<f64> {
        match self {
            KeyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            KeyValue::Int(i) => Some(*i as f64),
            KeyValue::Float(f) if f.is_finite() => Some(*f),
            KeyValue::Float(_) | KeyValue::Text(_) => None,
        }
    }

    /// Interprets the value as a flag, following the truthiness of the GA store.
    pub fn is_truthy(&self) -> bool {
        match self {
            KeyValue::Bool(b) => *b,
            KeyValue::Int(i) => *i != 0,
            KeyValue::Float(f) => *f != 0.0,
            KeyValue::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::Float(x) => write!(f, "{}", x),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_are_defined_targets() {
        assert_eq!(KeyValue::Float(-1.5).as_target(), Some(-1.5));
        assert_eq!(KeyValue::Int(4).as_target(), Some(4.0));
        assert_eq!(KeyValue::Bool(true).as_target(), Some(1.0));
    }

    #[test]
    fn text_and_non_finite_values_are_not_targets() {
        assert_eq!(KeyValue::Text("high".into()).as_target(), None);
        assert_eq!(KeyValue::Float(f64::NAN).as_target(), None);
        assert_eq!(KeyValue::Float(f64::INFINITY).as_target(), None);
    }

    #[test]
    fn truthiness_matches_flag_semantics() {
        assert!(KeyValue::Bool(true).is_truthy());
        assert!(KeyValue::Int(1).is_truthy());
        assert!(!KeyValue::Int(0).is_truthy());
        assert!(!KeyValue::Text(String::new()).is_truthy());
    }

    #[test]
    fn json_numbers_deserialize_into_matching_variants() {
        let int: KeyValue = serde_json::from_str("3").unwrap();
        let float: KeyValue = serde_json::from_str("3.5").unwrap();
        let flag: KeyValue = serde_json::from_str("false").unwrap();
        let text: KeyValue = serde_json::from_str("\"mutation\"").unwrap();
        assert_eq!(int, KeyValue::Int(3));
        assert_eq!(float, KeyValue::Float(3.5));
        assert_eq!(flag, KeyValue::Bool(false));
        assert_eq!(text, KeyValue::Text("mutation".into()));
    }
}
