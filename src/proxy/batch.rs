//! Batch coordinator for create, update and destroy.
//!
//! One backend command is spawned per record, all of them in flight at once.
//! Commands resolve in any order and report back over a channel to a single
//! coordinator loop, which alone owns the outcome lists and the resolved
//! counter. The batch is complete once every record has either succeeded or
//! failed:
//!
//! ```text
//!            ┌─ task(record 0) ─ insert/update/remove ─┐
//! records ───┼─ task(record 1) ─ insert/update/remove ─┼──▶ mpsc ──▶ coordinator ──▶ BatchOutcome
//!            └─ task(record n) ─ insert/update/remove ─┘            (resolved == n)
//! ```
//!
//! Every command runs under a timeout. A command that expires, or whose task
//! dies before reporting, is recorded as a failure for its record so the
//! batch always completes.

use crate::document::{strip_internal_id, Datum, Document};
use crate::error::{Error, Result};
use crate::metrics::COMMAND_TIMEOUTS_TOTAL;
use crate::model::{Model, Record};
use crate::operation::{Action, RecordEntry, RecordFailure};
use crate::proxy::projector::project;
use crate::storage::Collection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

/// Per-record results of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub succeeded: Vec<RecordEntry>,
    pub failed: Vec<RecordFailure>,
}

impl BatchOutcome {
    /// Records accounted for so far.
    pub fn resolved(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Settings shared by every command of a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub model: &'a Model,
    pub unique_ids: bool,
    pub command_timeout: Duration,
}

/// A dispatched command waiting for its resolution.
struct Pending {
    client_id: String,
    id: Option<Datum>,
    payload: Document,
}

impl Pending {
    fn into_entry(mut self, action: Action, stored: Option<Document>, id_property: &str) -> RecordEntry {
        strip_internal_id(&mut self.payload);

        let Some(mut stored) = stored.filter(|_| action != Action::Destroy) else {
            return RecordEntry {
                client_id: Some(self.client_id),
                id: self.id,
                data: Document::new(),
            };
        };

        strip_internal_id(&mut stored);
        let id = stored
            .get(id_property)
            .filter(|id| !id.is_null())
            .cloned()
            .or_else(|| self.payload.get(id_property).cloned())
            .or(self.id);

        RecordEntry {
            client_id: Some(self.client_id),
            id,
            data: self.payload,
        }
    }

    fn into_failure(self, error: String) -> RecordFailure {
        RecordFailure {
            client_id: self.client_id,
            error,
        }
    }
}

type Resolution = (usize, Result<Option<Document>>);

async fn run_command(
    action: Action,
    collection: Arc<dyn Collection>,
    selector: Option<Document>,
    payload: Document,
) -> Result<Option<Document>> {
    match (action, selector) {
        (Action::Create, _) => collection.insert(payload).await.map(Some),
        (Action::Update, Some(selector)) => collection.update(selector, payload).await.map(Some),
        (Action::Destroy, Some(selector)) => collection.remove(selector).await.map(|_| None),
        (action, _) => Err(Error::Internal(format!("no command for {} without selector", action))),
    }
}

/// Fan out one command per record and wait for all of them.
///
/// Returns an error only when `action` is not a batch action; backend
/// failures are reported per record in the outcome.
#[instrument(skip_all, fields(action = %action, records = records.len()))]
pub async fn execute_batch(
    action: Action,
    collection: Arc<dyn Collection>,
    ctx: BatchContext<'_>,
    records: &[Record],
) -> Result<BatchOutcome> {
    if action == Action::Read {
        return Err(Error::InvalidArgument("read is not a batch action".to_string()));
    }

    let total = records.len();
    let mut outcome = BatchOutcome::default();
    if total == 0 {
        debug!("empty batch, nothing to dispatch");
        return Ok(outcome);
    }

    let id_property = ctx.model.id_property.as_str();
    let (tx, mut rx) = mpsc::unbounded_channel::<Resolution>();
    let mut pending: Vec<Option<Pending>> = Vec::with_capacity(total);
    let mut resolved = 0;

    for (slot, record) in records.iter().enumerate() {
        let payload = project(record, ctx.model, ctx.unique_ids);
        let id = record.id(id_property).cloned();

        let selector = match (action, &id) {
            (Action::Create, _) => None,
            (_, Some(id)) => Some(Document::from([(id_property.to_string(), id.clone())])),
            (_, None) => {
                warn!(client_id = %record.client_id, "record has no identifier to match");
                outcome.failed.push(RecordFailure {
                    client_id: record.client_id.clone(),
                    error: format!("record has no {} to match", id_property),
                });
                pending.push(None);
                resolved += 1;
                continue;
            }
        };

        pending.push(Some(Pending {
            client_id: record.client_id.clone(),
            id,
            payload: payload.clone(),
        }));

        let tx = tx.clone();
        let collection = Arc::clone(&collection);
        let limit = ctx.command_timeout;
        tokio::spawn(async move {
            let command = run_command(action, collection, selector, payload);
            let resolution = match tokio::time::timeout(limit, command).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(limit)),
            };
            // The coordinator may have been dropped by its caller.
            let _ = tx.send((slot, resolution));
        });
    }
    drop(tx);

    while resolved < total {
        let Some((slot, resolution)) = rx.recv().await else {
            break;
        };
        let Some(command) = pending.get_mut(slot).and_then(Option::take) else {
            warn!(slot, "ignoring duplicate resolution");
            continue;
        };
        resolved += 1;

        match resolution {
            Ok(stored) => outcome.succeeded.push(command.into_entry(action, stored, id_property)),
            Err(e) => {
                if matches!(e, Error::Timeout(_)) {
                    COMMAND_TIMEOUTS_TOTAL.inc();
                }
                error!(client_id = %command.client_id, error = %e, "record command failed");
                outcome.failed.push(command.into_failure(e.to_string()));
            }
        }
    }

    // Every sender is gone; whatever is still pending will never report.
    for command in pending.into_iter().flatten() {
        error!(client_id = %command.client_id, "record command ended without resolving");
        outcome
            .failed
            .push(command.into_failure("command ended without resolving".to_string()));
    }

    debug!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "batch complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, IdentifierStrategy};
    use crate::storage::MemoryCollection;
    use std::collections::HashSet;

    fn model() -> Model {
        Model::new("App.model.Item")
            .with_field(Field::new("id"))
            .with_field(Field::new("name"))
            .with_identifier(IdentifierStrategy::Unique)
    }

    fn ctx(model: &Model) -> BatchContext<'_> {
        BatchContext {
            model,
            unique_ids: model.identifier.is_unique(),
            command_timeout: Duration::from_secs(5),
        }
    }

    fn item(id: i32, name: &str) -> Record {
        Record::from_pairs([("id", Datum::from(id)), ("name", Datum::from(name))])
            .with_client_id(format!("c{}", id))
    }

    #[tokio::test]
    async fn test_empty_batch_completes_immediately() {
        let coll: Arc<dyn Collection> = Arc::new(MemoryCollection::new("Item", None));
        let model = model();
        let outcome = execute_batch(Action::Create, coll, ctx(&model), &[]).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
    }

    #[tokio::test]
    async fn test_read_is_rejected() {
        let coll: Arc<dyn Collection> = Arc::new(MemoryCollection::new("Item", None));
        let model = model();
        assert!(execute_batch(Action::Read, coll, ctx(&model), &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_order_resolution_keeps_every_record() {
        let mem = Arc::new(MemoryCollection::new("Item", None));
        mem.delay_when("name", "slow", Duration::from_millis(50));
        let model = model();
        let records = vec![item(1, "slow"), item(2, "fast"), item(3, "fast")];

        let coll: Arc<dyn Collection> = mem.clone();
        let outcome = execute_batch(Action::Create, coll, ctx(&model), &records)
            .await
            .unwrap();

        assert_eq!(outcome.resolved(), 3);
        assert!(outcome.failed.is_empty());
        let ids: HashSet<_> = outcome
            .succeeded
            .iter()
            .filter_map(|e| e.client_id.clone())
            .collect();
        assert_eq!(ids, HashSet::from(["c1".to_string(), "c2".to_string(), "c3".to_string()]));
        assert_eq!(mem.len(), 3);
    }

    #[tokio::test]
    async fn test_hung_command_times_out_as_failure() {
        let mem = Arc::new(MemoryCollection::new("Item", None));
        mem.hang_when("name", "stuck");
        let model = model();
        let ctx = BatchContext {
            command_timeout: Duration::from_millis(20),
            ..ctx(&model)
        };

        let coll: Arc<dyn Collection> = mem.clone();
        let outcome = execute_batch(Action::Create, coll, ctx, &[item(1, "ok"), item(2, "stuck")])
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].client_id, "c2");
        assert!(outcome.failed[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_update_without_identifier_fails_that_record_only() {
        let mem = Arc::new(MemoryCollection::new("Item", None));
        let model = model();
        let coll: Arc<dyn Collection> = mem.clone();
        execute_batch(Action::Create, coll.clone(), ctx(&model), &[item(1, "a")])
            .await
            .unwrap();

        let anonymous = Record::from_pairs([("name", "b")]).with_client_id("anon");
        let outcome = execute_batch(Action::Update, coll, ctx(&model), &[item(1, "renamed"), anonymous])
            .await
            .unwrap();

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].client_id, "anon");
        assert_eq!(mem.documents()[0].get("name"), Some(&Datum::from("renamed")));
    }

    #[tokio::test]
    async fn test_entries_never_carry_internal_id() {
        let mem = Arc::new(MemoryCollection::new("Item", None));
        let model = model();
        let coll: Arc<dyn Collection> = mem.clone();
        let outcome = execute_batch(Action::Create, coll, ctx(&model), &[item(4, "d")])
            .await
            .unwrap();

        let entry = &outcome.succeeded[0];
        assert_eq!(entry.id, Some(Datum::from(4)));
        assert!(!entry.data.contains_key(crate::document::INTERNAL_ID_FIELD));
        assert!(mem.documents()[0].contains_key(crate::document::INTERNAL_ID_FIELD));
    }
}
