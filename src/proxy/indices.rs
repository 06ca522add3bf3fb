//! Secondary index maintenance.

use crate::metrics::COMMAND_TIMEOUTS_TOTAL;
use crate::model::Model;
use crate::storage::Collection;
use std::time::Duration;
use tracing::{debug, warn};

/// Fields that need an index: explicitly indexed fields and the id property.
pub fn index_fields(model: &Model) -> Vec<&str> {
    model
        .fields
        .iter()
        .filter(|f| f.index || f.name == model.id_property)
        .map(|f| f.name.as_str())
        .collect()
}

/// Ask the store to ensure every index the model needs.
///
/// Best effort: a failed or expired index build is logged and does not block
/// the read that triggered it. Each request is bounded by `limit`. Returns how
/// many indexes were confirmed.
pub async fn ensure_indices(collection: &dyn Collection, model: &Model, limit: Duration) -> usize {
    let mut ensured = 0;
    for field in index_fields(model) {
        match tokio::time::timeout(limit, collection.ensure_index(field)).await {
            Ok(Ok(())) => {
                debug!(collection = collection.name(), field, "index ensured");
                ensured += 1;
            }
            Ok(Err(e)) => {
                warn!(collection = collection.name(), field, error = %e, "failed to ensure index");
            }
            Err(_) => {
                COMMAND_TIMEOUTS_TOTAL.inc();
                warn!(collection = collection.name(), field, ?limit, "index build timed out");
            }
        }
    }
    ensured
}
