//! Record projection: turn a record into the payload written to the store.

use crate::document::{Datum, Document};
use crate::model::{Model, Record};

/// Build the storage payload for `record`.
///
/// Only persistent fields are included. The id property is left out unless
/// `unique_ids` is set, in which case the caller owns identifiers and they
/// must round-trip through the store. Date fields holding a timestamp are
/// rendered with the field's date format. Fields the record has no value for
/// are skipped.
pub fn project(record: &Record, model: &Model, unique_ids: bool) -> Document {
    let mut payload = Document::with_capacity(model.fields.len());

    for field in model.fields.iter().filter(|f| f.persist) {
        if field.name == model.id_property && !unique_ids {
            continue;
        }

        let Some(value) = record.get(&field.name) else {
            continue;
        };

        let value = match (field.is_date(), value, field.date_format.as_deref()) {
            (true, Datum::Number(millis), Some(format)) => Datum::from_timestamp_millis(*millis, format),
            _ => value.clone(),
        };
        payload.insert(field.name.clone(), value);
    }

    payload
}
