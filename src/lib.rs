// PhotonDB Proxy - model CRUD operations over a document store
// Fans out per-record commands, reconciles their outcomes, reports partial failure

#![warn(rust_2018_idioms)]

pub mod config;
pub mod document;
pub mod metrics;
pub mod model;
pub mod operation;
pub mod proxy;
pub mod replay;
pub mod storage;

// Re-exports for convenience
pub use config::ProxyConfig;
pub use document::{Datum, Document};
pub use model::{Field, FieldType, IdentifierStrategy, Model, Record};
pub use operation::{Action, Filter, Operation, OperationException, ResultSet};
pub use proxy::{DocumentProxy, ExceptionListener, Outcome};
pub use storage::{Collection, DocumentStore, MemoryStore};

/// Proxy error types
pub mod error {
    use std::time::Duration;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Storage error: {0}")]
        Storage(String),

        #[error("Query error: {0}")]
        Query(String),

        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Invalid state: {0}")]
        InvalidState(String),

        #[error("Command timed out after {0:?}")]
        Timeout(Duration),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Serialization error: {0}")]
        Serialization(#[from] serde_json::Error),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
