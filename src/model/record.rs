//! Client-side model instances.

use crate::document::{Datum, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A model instance owned by the caller.
///
/// Every record carries a client id that is unique on the caller's side, and
/// once stored, a persisted identifier under the model's id property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default = "generate_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub data: Document,
    /// Not yet acknowledged by the store.
    #[serde(default = "default_phantom")]
    pub phantom: bool,
    /// Set once the record has been destroyed in the store.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub erased: bool,
}

fn default_phantom() -> bool {
    true
}

fn generate_client_id() -> String {
    format!("rec-{}", Uuid::new_v4())
}

impl Record {
    /// Create a record with a freshly generated client id.
    pub fn new(data: Document) -> Self {
        Self {
            client_id: generate_client_id(),
            data,
            phantom: true,
            erased: false,
        }
    }

    /// A record read back from the store.
    pub fn persisted(data: Document) -> Self {
        Self {
            phantom: false,
            ..Self::new(data)
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Build a record from `(field, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Datum>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.data.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Datum>) {
        self.data.insert(name.into(), value.into());
    }

    /// Store a date as unix milliseconds; it is rendered with the field's
    /// date format when projected.
    pub fn set_date(&mut self, name: impl Into<String>, value: DateTime<Utc>) {
        self.set(name, value.timestamp_millis());
    }

    /// Mark the record as saved.
    pub fn commit(&mut self) {
        self.phantom = false;
    }

    /// Persisted identifier under `id_property`, ignoring nulls.
    pub fn id(&self, id_property: &str) -> Option<&Datum> {
        self.get(id_property).filter(|id| !id.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids_are_unique() {
        let a = Record::new(Document::new());
        let b = Record::new(Document::new());
        assert_ne!(a.client_id, b.client_id);
        assert!(a.client_id.starts_with("rec-"));
    }

    #[test]
    fn test_id_ignores_null() {
        let mut record = Record::from_pairs([("id", Datum::Null)]);
        assert_eq!(record.id("id"), None);

        record.set("id", 7);
        assert_eq!(record.id("id"), Some(&Datum::Number(7.0)));
    }

    #[test]
    fn test_deserialize_generates_missing_client_id() {
        let record: Record =
            serde_json::from_value(serde_json::json!({"data": {"name": "Bob"}})).unwrap();
        assert!(record.client_id.starts_with("rec-"));
        assert_eq!(record.get("name"), Some(&Datum::from("Bob")));
        assert!(!record.erased);
        assert!(record.phantom);
    }

    #[test]
    fn test_commit_clears_phantom() {
        let mut record = Record::from_pairs([("name", "Ann")]);
        assert!(record.phantom);
        record.commit();
        assert!(!record.phantom);
        assert!(!Record::persisted(Document::new()).phantom);
    }
}
