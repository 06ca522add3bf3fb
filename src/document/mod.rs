//! Document values exchanged with the backend store.
//!
//! Records are projected into flat [`Document`]s before they are written, and
//! stored documents are reshaped back into record entries after a query. The
//! storage engine tags every stored document with an internal identifier
//! ([`INTERNAL_ID_FIELD`]) which must be stripped before a document is handed
//! back to the caller.

pub mod datum;

pub use datum::Datum;

use std::collections::HashMap;

/// A flat field name → value mapping.
pub type Document = HashMap<String, Datum>;

/// Field the storage engine uses for its own document identifier.
pub const INTERNAL_ID_FIELD: &str = "_id";

/// Remove the storage engine's internal identifier from a document.
///
/// Returns the removed identifier, if there was one.
pub fn strip_internal_id(doc: &mut Document) -> Option<Datum> {
    doc.remove(INTERNAL_ID_FIELD)
}
