//! In-memory document store.
//!
//! Backs the `replay` command and the test suite. Besides plain storage it
//! can inject faults per document (fail, hang, delay) so batches with partial
//! failures, out-of-order resolution and lost commands can be reproduced.

use crate::document::{Datum, Document, INTERNAL_ID_FIELD};
use crate::error::{Error, Result};
use crate::storage::engine::{Collection, DocumentStore};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum FaultKind {
    Fail(String),
    Hang,
    Delay(Duration),
}

/// Fault triggered by any write whose document or selector has `field == value`.
#[derive(Debug, Clone)]
struct Fault {
    field: String,
    value: Datum,
    kind: FaultKind,
}

impl Fault {
    fn applies_to(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| doc.get(key).unwrap_or(&Datum::Null) == value)
}

/// One in-memory collection.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    indexes: RwLock<BTreeSet<String>>,
    index_requests: AtomicUsize,
    generated_id: Option<String>,
    next_id: AtomicU64,
    faults: RwLock<Vec<Fault>>,
    query_failure: RwLock<Option<String>>,
    index_failure: RwLock<Option<String>>,
}

impl MemoryCollection {
    /// Create an empty collection. With `generated_id`, inserts lacking that
    /// field get a sequential identifier assigned by the store.
    pub fn new(name: impl Into<String>, generated_id: Option<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(BTreeSet::new()),
            index_requests: AtomicUsize::new(0),
            generated_id,
            next_id: AtomicU64::new(0),
            faults: RwLock::new(Vec::new()),
            query_failure: RwLock::new(None),
            index_failure: RwLock::new(None),
        }
    }

    /// Get the number of documents stored
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Snapshot of the stored documents, internal ids included.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.read().clone()
    }

    /// Fields with an index, sorted.
    pub fn indexes(&self) -> Vec<String> {
        self.indexes.read().iter().cloned().collect()
    }

    /// Number of index requests received, including repeats.
    pub fn index_requests(&self) -> usize {
        self.index_requests.load(Ordering::SeqCst)
    }

    /// Fail writes touching documents with `field == value`.
    pub fn fail_when(&self, field: &str, value: impl Into<Datum>, message: &str) {
        self.add_fault(field, value.into(), FaultKind::Fail(message.to_string()));
    }

    /// Never resolve writes touching documents with `field == value`.
    pub fn hang_when(&self, field: &str, value: impl Into<Datum>) {
        self.add_fault(field, value.into(), FaultKind::Hang);
    }

    /// Delay writes touching documents with `field == value`.
    pub fn delay_when(&self, field: &str, value: impl Into<Datum>, delay: Duration) {
        self.add_fault(field, value.into(), FaultKind::Delay(delay));
    }

    /// Make every `find` fail with `message`.
    pub fn fail_queries(&self, message: &str) {
        *self.query_failure.write() = Some(message.to_string());
    }

    /// Make every `ensure_index` fail with `message`.
    pub fn fail_index_builds(&self, message: &str) {
        *self.index_failure.write() = Some(message.to_string());
    }

    /// Drop all injected faults.
    pub fn clear_faults(&self) {
        self.faults.write().clear();
        *self.query_failure.write() = None;
        *self.index_failure.write() = None;
    }

    fn add_fault(&self, field: &str, value: Datum, kind: FaultKind) {
        self.faults.write().push(Fault {
            field: field.to_string(),
            value,
            kind,
        });
    }

    async fn apply_faults(&self, docs: &[&Document]) -> Result<()> {
        // Clone out of the lock; the guard must not live across an await.
        let fault = self
            .faults
            .read()
            .iter()
            .find(|fault| docs.iter().any(|doc| fault.applies_to(doc)))
            .cloned();

        match fault.map(|f| f.kind) {
            Some(FaultKind::Fail(message)) => Err(Error::Storage(message)),
            Some(FaultKind::Hang) => std::future::pending().await,
            Some(FaultKind::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, mut doc: Document) -> Result<Document> {
        self.apply_faults(&[&doc]).await?;

        if let Some(field) = &self.generated_id {
            if doc.get(field).map_or(true, Datum::is_null) {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                doc.insert(field.clone(), Datum::from(id));
            }
        }
        doc.insert(
            INTERNAL_ID_FIELD.to_string(),
            Datum::String(Uuid::new_v4().simple().to_string()),
        );

        debug!(collection = %self.name, "insert");
        self.documents.write().push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        if let Some(message) = self.query_failure.read().clone() {
            return Err(Error::Query(message));
        }

        Ok(self
            .documents
            .read()
            .iter()
            .filter(|doc| matches(doc, &filter))
            .cloned()
            .collect())
    }

    async fn update(&self, selector: Document, changes: Document) -> Result<Document> {
        self.apply_faults(&[&selector, &changes]).await?;

        let mut documents = self.documents.write();
        let doc = documents
            .iter_mut()
            .find(|doc| matches(doc, &selector))
            .ok_or_else(|| Error::NotFound(format!("no document in {} matches", self.name)))?;

        for (key, value) in changes {
            if key != INTERNAL_ID_FIELD {
                doc.insert(key, value);
            }
        }
        Ok(doc.clone())
    }

    async fn remove(&self, selector: Document) -> Result<u64> {
        self.apply_faults(&[&selector]).await?;

        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|doc| !matches(doc, &selector));
        Ok((before - documents.len()) as u64)
    }

    async fn ensure_index(&self, field: &str) -> Result<()> {
        self.index_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.index_failure.read().clone() {
            return Err(Error::Storage(message));
        }
        self.indexes.write().insert(field.to_string());
        Ok(())
    }
}

/// In-memory store holding collections per `database.collection`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, Arc<MemoryCollection>>,
    generated_id: Option<String>,
    opened: AtomicUsize,
    unavailable: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the store assign identifiers under `field` on insert.
    pub fn with_generated_ids(mut self, field: impl Into<String>) -> Self {
        self.generated_id = Some(field.into());
        self
    }

    /// Concrete handle to a collection, created on first use.
    pub fn handle(&self, database: &str, name: &str) -> Arc<MemoryCollection> {
        self.collections
            .entry(format!("{}.{}", database, name))
            .or_insert_with(|| Arc::new(MemoryCollection::new(name, self.generated_id.clone())))
            .value()
            .clone()
    }

    /// How many collection handles have been handed out.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Refuse to open collections until cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write() = reason.map(str::to_string);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn collection(&self, database: &str, name: &str) -> Result<Arc<dyn Collection>> {
        if let Some(reason) = self.unavailable.read().clone() {
            return Err(Error::Storage(format!("cannot connect to {}: {}", database, reason)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let collection: Arc<dyn Collection> = self.handle(database, name);
        Ok(collection)
    }
}
