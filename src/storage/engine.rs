//! Backend command interface.
//!
//! The proxy talks to a document store through five asynchronous commands on a
//! collection handle. Each command is a suspension point; the proxy issues
//! all commands of a batch without waiting for earlier ones to resolve.

use crate::document::Document;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A collection of documents in the backend store.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Insert a document and return it as stored.
    async fn insert(&self, doc: Document) -> Result<Document>;

    /// Find all documents whose fields equal every entry of `filter`.
    async fn find(&self, filter: Document) -> Result<Vec<Document>>;

    /// Apply `changes` to the document matched by `selector` and return it as stored.
    async fn update(&self, selector: Document, changes: Document) -> Result<Document>;

    /// Remove every document matched by `selector`; returns how many were removed.
    async fn remove(&self, selector: Document) -> Result<u64>;

    /// Ensure a secondary index on `field`. Repeated calls are harmless.
    async fn ensure_index(&self, field: &str) -> Result<()>;
}

/// Opens collection handles.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn collection(&self, database: &str, name: &str) -> Result<Arc<dyn Collection>>;
}
