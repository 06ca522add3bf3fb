//! Datum - the JSON-like value carried by records and stored documents.
//!
//! A `Datum` represents any value a model field can hold or a backend
//! collection can store.
//!
//! # Supported Types
//!
//! - **Null**: Absence of a value
//! - **Boolean**: true or false
//! - **Number**: f64 floating point numbers
//! - **String**: UTF-8 encoded text
//! - **Array**: Ordered list of datums
//! - **Object**: Key-value map (like JSON object)
//!
//! # Example
//!
//! ```rust
//! use photondb_proxy::document::Datum;
//! use std::collections::HashMap;
//!
//! let num_val = Datum::Number(42.5);
//! let str_val = Datum::String("hello".into());
//! let arr_val = Datum::Array(vec![num_val.clone(), str_val.clone()]);
//!
//! let mut obj = HashMap::new();
//! obj.insert("name".to_string(), Datum::from("Alice"));
//! obj.insert("age".to_string(), Datum::from(30));
//! let obj_val = Datum::Object(obj);
//! assert!(obj_val.as_object().is_some());
//! assert_eq!(arr_val.as_array().map(Vec::len), Some(2));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Datum represents a single field value or a whole document.
///
/// It's JSON-compatible with serde serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datum {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<Datum>),
    Object(HashMap<String, Datum>),
}

impl Datum {
    /// Render a unix timestamp (milliseconds) with a chrono format string.
    ///
    /// Returns `Datum::Null` when the timestamp is out of range.
    pub fn from_timestamp_millis(millis: f64, format: &str) -> Self {
        DateTime::<Utc>::from_timestamp_millis(millis as i64)
            .map(|dt| Datum::from_datetime(&dt, format))
            .unwrap_or(Datum::Null)
    }

    /// Render a date-time with a chrono format string.
    pub fn from_datetime(dt: &DateTime<Utc>, format: &str) -> Self {
        Datum::String(dt.format(format).to_string())
    }

    /// Check if datum is null
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&Vec<Datum>> {
        match self {
            Datum::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&HashMap<String, Datum>> {
        match self {
            Datum::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Order two scalars of the same kind.
    ///
    /// Mixed kinds, arrays and objects have no ordering.
    pub fn compare(&self, other: &Datum) -> Option<Ordering> {
        match (self, other) {
            (Datum::Null, Datum::Null) => Some(Ordering::Equal),
            (Datum::Boolean(a), Datum::Boolean(b)) => Some(a.cmp(b)),
            (Datum::Number(a), Datum::Number(b)) => a.partial_cmp(b),
            (Datum::String(a), Datum::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

// Conversions
impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Boolean(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Datum {
            fn from(n: $t) -> Self {
                Datum::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u64, f64);

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::String(s)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::String(s.to_string())
    }
}

impl From<HashMap<String, Datum>> for Datum {
    fn from(obj: HashMap<String, Datum>) -> Self {
        Datum::Object(obj)
    }
}

impl From<serde_json::Value> for Datum {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Datum::Null,
            serde_json::Value::Bool(b) => Datum::Boolean(b),
            serde_json::Value::Number(n) => Datum::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Datum::String(s),
            serde_json::Value::Array(arr) => {
                Datum::Array(arr.into_iter().map(Datum::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Datum::Object(obj.into_iter().map(|(k, v)| (k, Datum::from(v))).collect())
            }
        }
    }
}

impl From<Datum> for serde_json::Value {
    fn from(datum: Datum) -> Self {
        match datum {
            Datum::Null => serde_json::Value::Null,
            Datum::Boolean(b) => serde_json::Value::Bool(b),
            Datum::Number(n) => serde_json::Value::Number(
                serde_json::Number::from_f64(n).unwrap_or_else(|| serde_json::Number::from(0)),
            ),
            Datum::String(s) => serde_json::Value::String(s),
            Datum::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Datum::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Renders as compact JSON.
impl std::fmt::Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_json_conversion_keeps_nested_objects() {
        let json = serde_json::json!({"name": "Alice", "tags": ["a", "b"], "score": 30.5});
        let datum = Datum::from(json.clone());

        let obj = datum.as_object().expect("object");
        assert_eq!(obj.get("name"), Some(&Datum::from("Alice")));
        assert_eq!(obj.get("score"), Some(&Datum::Number(30.5)));
        assert_eq!(serde_json::Value::from(datum), json);
    }

    #[test]
    fn test_display_is_json() {
        assert_eq!(Datum::from("a").to_string(), "\"a\"");
        assert_eq!(Datum::Array(vec![Datum::from(1), Datum::Null]).to_string(), "[1.0,null]");
    }

    #[test]
    fn test_compare_only_orders_matching_kinds() {
        assert_eq!(Datum::from(1).compare(&Datum::from(2)), Some(Ordering::Less));
        assert_eq!(Datum::from("b").compare(&Datum::from("a")), Some(Ordering::Greater));
        assert_eq!(Datum::from(1).compare(&Datum::from("1")), None);
        assert_eq!(Datum::Array(vec![]).compare(&Datum::Array(vec![])), None);
    }

    #[test]
    fn test_datetime_rendering() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            Datum::from_datetime(&dt, "%Y-%m-%d %H:%M:%S"),
            Datum::from("2024-03-09 14:05:07")
        );
        let millis = dt.timestamp_millis() as f64;
        assert_eq!(
            Datum::from_timestamp_millis(millis, "%Y-%m-%d"),
            Datum::from("2024-03-09")
        );
    }
}
