//! Document proxy: runs model CRUD operations against a document store.
//!
//! # Architecture
//!
//! ```text
//! Operation ──▶ DocumentProxy ──create/update/destroy──▶ batch::execute_batch ──┐
//!                    │                                     (projector per record) │
//!                    └──read──▶ indices ──▶ query::plan ──▶ find ──▶ refine ──────┤
//!                                                                               ▼
//!                                      ResultSet + Operation::process + exception
//! ```
//!
//! Every public entry point resolves exactly once. Failures never escape as
//! errors; they are attached to the operation and reflected in the returned
//! [`Outcome`]. A processing rejection is also reported to every registered
//! [`ExceptionListener`].
//!
//! # Example
//!
//! ```rust
//! use photondb_proxy::config::ProxyConfig;
//! use photondb_proxy::model::{Field, IdentifierStrategy, Model, Record};
//! use photondb_proxy::operation::Operation;
//! use photondb_proxy::proxy::{DocumentProxy, Outcome};
//! use photondb_proxy::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let model = Model::new("App.model.User")
//!     .with_field(Field::new("id"))
//!     .with_field(Field::new("name"))
//!     .with_identifier(IdentifierStrategy::Unique);
//! let proxy = DocumentProxy::new(ProxyConfig::default(), model, Arc::new(MemoryStore::new()));
//!
//! let mut create = Operation::create(vec![Record::from_pairs([("id", 1)])]);
//! assert_eq!(proxy.execute(&mut create).await, Outcome::Ok);
//!
//! let mut read = Operation::read().with_param("id", 1);
//! proxy.execute(&mut read).await;
//! assert_eq!(read.result().map(|r| r.count), Some(1));
//! # }
//! ```

pub mod batch;
pub mod indices;
pub mod projector;
pub mod query;

pub use batch::{BatchContext, BatchOutcome};

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::metrics::{COMMAND_TIMEOUTS_TOTAL, OPERATIONS_TOTAL, RECORD_FAILURES_TOTAL};
use crate::model::Model;
use crate::operation::{Action, Operation, OperationException, ProcessOutcome, ResultSet};
use crate::storage::{Collection, DocumentStore};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every record was processed.
    Ok,
    /// The store accepted the request but the processing step rejected the result.
    ProcessingRejected(String),
    /// The operation carries an exception: the query failed or some records did.
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::ProcessingRejected(_) => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

/// Observer notified when the processing step rejects a result.
pub trait ExceptionListener: Send + Sync {
    fn on_exception(&self, operation: &Operation, reason: &str);
}

/// Adapter from model operations to a document store collection.
pub struct DocumentProxy {
    config: ProxyConfig,
    model: Model,
    store: Arc<dyn DocumentStore>,
    collection: OnceCell<Arc<dyn Collection>>,
    listeners: RwLock<Vec<Arc<dyn ExceptionListener>>>,
}

impl fmt::Debug for DocumentProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProxy")
            .field("config", &self.config)
            .field("model", &self.model.name)
            .field("connected", &self.collection.initialized())
            .finish()
    }
}

impl DocumentProxy {
    /// Bind `model` to `store`. Date fields without a format get the
    /// configured default.
    pub fn new(config: ProxyConfig, mut model: Model, store: Arc<dyn DocumentStore>) -> Self {
        model.apply_date_format(&config.default_date_format);
        Self {
            config,
            model,
            store,
            collection: OnceCell::new(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Whether the caller assigns identifiers.
    pub fn unique_ids(&self) -> bool {
        self.model.identifier.is_unique()
    }

    /// Configured table, or the name derived from the model.
    pub fn collection_name(&self) -> &str {
        self.config
            .table
            .as_deref()
            .unwrap_or_else(|| self.model.collection_name())
    }

    /// Replace the configuration; the collection is reopened on next use.
    pub fn reconfigure(&mut self, config: ProxyConfig) {
        info!(connection = %config.connection_string(), "reconfiguring proxy");
        self.model.apply_date_format(&config.default_date_format);
        self.config = config;
        self.collection = OnceCell::new();
    }

    pub fn add_listener(&self, listener: Arc<dyn ExceptionListener>) {
        self.listeners.write().push(listener);
    }

    /// Collection handle, opened on first use and reused afterwards.
    ///
    /// Opening is bounded by the command timeout; an expired attempt leaves
    /// the handle unset so the next operation tries again.
    pub async fn collection(&self) -> Result<Arc<dyn Collection>> {
        self.collection
            .get_or_try_init(|| async {
                let name = self.collection_name();
                info!(
                    connection = %self.config.connection_string(),
                    collection = name,
                    "opening collection"
                );
                let limit = self.config.command_timeout();
                tokio::time::timeout(limit, self.store.collection(&self.config.database, name))
                    .await
                    .map_err(|_| {
                        COMMAND_TIMEOUTS_TOTAL.inc();
                        Error::Timeout(limit)
                    })
                    .and_then(|opened| opened)
            })
            .await
            .cloned()
    }

    pub async fn create(&self, operation: &mut Operation) -> Outcome {
        self.expect_action(Action::Create, operation).await
    }

    pub async fn read(&self, operation: &mut Operation) -> Outcome {
        self.expect_action(Action::Read, operation).await
    }

    pub async fn update(&self, operation: &mut Operation) -> Outcome {
        self.expect_action(Action::Update, operation).await
    }

    pub async fn destroy(&self, operation: &mut Operation) -> Outcome {
        self.expect_action(Action::Destroy, operation).await
    }

    /// Run `operation` in the background and hand it to `on_done` when finished.
    pub fn spawn<F>(self: &Arc<Self>, mut operation: Operation, on_done: F) -> JoinHandle<()>
    where
        F: FnOnce(Operation, Outcome) + Send + 'static,
    {
        let proxy = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = proxy.execute(&mut operation).await;
            on_done(operation, outcome);
        })
    }

    /// Run an operation of any action to completion.
    #[instrument(skip_all, fields(action = %operation.action(), model = %self.model.name))]
    pub async fn execute(&self, operation: &mut Operation) -> Outcome {
        let action = operation.action();
        if let Err(e) = operation.set_started() {
            warn!(error = %e, "operation cannot be started");
            return Outcome::Failed;
        }

        let run = match action {
            Action::Read => self.run_read(operation).await,
            _ => self.run_batch(action, operation).await,
        };

        let rejection = match run {
            Ok(rejection) => rejection,
            Err(e) => {
                error!(error = %e, "operation failed");
                self.fail(operation, e);
                None
            }
        };

        if let Err(e) = operation.complete() {
            warn!(error = %e, "operation already completed");
        }

        let outcome = match rejection {
            _ if operation.has_exception() => Outcome::Failed,
            Some(reason) => Outcome::ProcessingRejected(reason),
            None => Outcome::Ok,
        };
        OPERATIONS_TOTAL
            .with_label_values(&[action.as_str(), outcome.as_str()])
            .inc();
        debug!(outcome = outcome.as_str(), "operation finished");
        outcome
    }

    async fn expect_action(&self, action: Action, operation: &mut Operation) -> Outcome {
        if operation.action() != action {
            warn!(
                expected = %action,
                actual = %operation.action(),
                "operation passed to the wrong entry point"
            );
            let error = Error::InvalidArgument(format!(
                "{} operation passed to {}",
                operation.action(),
                action
            ));
            if operation.set_started().is_ok() {
                self.fail(operation, error);
                if let Err(e) = operation.complete() {
                    warn!(error = %e, "operation already completed");
                }
            }
            return Outcome::Failed;
        }
        self.execute(operation).await
    }

    /// Attach a query-level failure: unsuccessful envelope, no records.
    fn fail(&self, operation: &mut Operation, error: Error) {
        let attached = operation
            .set_result(ResultSet::failed())
            .and_then(|_| operation.set_exception(OperationException::Query(error.to_string())));
        if let Err(e) = attached {
            warn!(error = %e, "could not attach failure to operation");
        }
    }

    /// Run the processing step, notifying listeners on rejection.
    fn process(&self, operation: &mut Operation, result: &ResultSet) -> Option<String> {
        match operation.process(operation.action(), result, &self.model.id_property) {
            ProcessOutcome::Accepted => None,
            ProcessOutcome::Rejected(reason) => {
                warn!(reason = %reason, "result rejected by processing step");
                for listener in self.listeners.read().iter() {
                    listener.on_exception(operation, &reason);
                }
                Some(reason)
            }
        }
    }

    async fn run_batch(&self, action: Action, operation: &mut Operation) -> Result<Option<String>> {
        let collection = self.collection().await?;
        let ctx = BatchContext {
            model: &self.model,
            unique_ids: self.unique_ids(),
            command_timeout: self.config.command_timeout(),
        };

        let outcome = batch::execute_batch(action, collection, ctx, operation.records()).await?;

        let result = ResultSet::new(outcome.succeeded);
        let rejection = self.process(operation, &result);
        operation.set_result(result)?;

        if !outcome.failed.is_empty() {
            RECORD_FAILURES_TOTAL
                .with_label_values(&[action.as_str()])
                .inc_by(outcome.failed.len() as u64);
            operation.set_exception(OperationException::Records(outcome.failed))?;
        }
        Ok(rejection)
    }

    async fn run_read(&self, operation: &mut Operation) -> Result<Option<String>> {
        let collection = self.collection().await?;
        let limit = self.config.command_timeout();
        indices::ensure_indices(collection.as_ref(), &self.model, limit).await;

        let plan = query::plan(operation, &self.model);
        debug!(selector = ?plan.selector, residual = plan.residual.len(), "querying");

        let docs = tokio::time::timeout(limit, collection.find(plan.selector))
            .await
            .map_err(|_| Error::Timeout(limit))??;

        let id_property = self.model.id_property.as_str();
        let mut result = ResultSet::new(query::reshape(docs, id_property));
        let rejection = self.process(operation, &result);

        if rejection.is_none() && query::needs_refinement(operation) {
            let (records, total) = query::refine(
                operation.records(),
                &plan.residual,
                operation.sorters(),
                operation.start(),
                operation.limit(),
                id_property,
            );
            result.records = records.iter().map(|r| query::entry_for(r, id_property)).collect();
            result.count = records.len();
            result.total = total;
            operation.set_records(records);
        }

        operation.set_result(result)?;
        Ok(rejection)
    }
}
