//! Operation scripts run against the in-memory store.
//!
//! A script names a model, optional faults to inject into its collection,
//! and a list of operations. Each operation runs to completion before the
//! next one starts; the report lists the envelope and exception of each.
//!
//! ```json
//! {
//!   "model": {"name": "App.model.User", "identifier": "unique",
//!             "fields": [{"name": "id"}, {"name": "name", "index": true}]},
//!   "faults": [{"kind": "fail", "field": "name", "value": "Bob", "message": "duplicate key"}],
//!   "operations": [
//!     {"action": "create", "records": [{"data": {"id": 1, "name": "Ann"}}]},
//!     {"action": "read", "filters": [{"property": "name", "value": "Ann"}]}
//!   ]
//! }
//! ```

use crate::config::ProxyConfig;
use crate::document::{Datum, Document};
use crate::error::{Error, Result};
use crate::model::{Model, Record};
use crate::operation::{Action, Filter, Operation, OperationException, ResultSet, Sorter};
use crate::proxy::{DocumentProxy, Outcome};
use crate::storage::MemoryStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// A replayable list of operations.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub model: Model,
    /// Let the store assign identifiers under the model's id property.
    #[serde(default)]
    pub generated_ids: bool,
    #[serde(default)]
    pub faults: Vec<Fault>,
    pub operations: Vec<Step>,
}

/// Backend misbehaviour injected before the first operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    Fail {
        field: String,
        value: Datum,
        message: String,
    },
    Delay {
        field: String,
        value: Datum,
        delay_ms: u64,
    },
    FailQueries {
        message: String,
    },
    FailIndexBuilds {
        message: String,
    },
}

/// One operation of a script.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub action: Action,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub params: Document,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorters: Vec<Sorter>,
    pub start: Option<usize>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

impl Step {
    pub fn into_operation(self) -> Operation {
        let mut operation = Operation::new(self.action).with_records(self.records);
        for (name, value) in self.params {
            operation = operation.with_param(name, value);
        }
        for filter in self.filters {
            operation = operation.with_filter(filter);
        }
        for sorter in self.sorters {
            operation = operation.with_sorter(sorter);
        }
        if self.start.is_some() || self.limit.is_some() {
            operation = operation.with_window(self.start.unwrap_or(0), self.limit.unwrap_or(usize::MAX));
        }
        if let Some(page) = self.page {
            operation = operation.with_page(page);
        }
        operation
    }
}

/// What one step produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub action: Action,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    pub result: Option<ResultSet>,
    pub exception: Option<OperationException>,
    pub records: Vec<Record>,
}

impl StepReport {
    fn new(operation: Operation, outcome: Outcome) -> Self {
        let rejection = match &outcome {
            Outcome::ProcessingRejected(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            action: operation.action(),
            outcome: outcome.as_str(),
            rejection,
            result: operation.result().cloned(),
            exception: operation.exception().cloned(),
            records: operation.records().to_vec(),
        }
    }
}

impl Script {
    /// Read a script from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidArgument(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Run every step of `script` in order against a fresh in-memory store.
#[instrument(skip_all, fields(model = %script.model.name, steps = script.operations.len()))]
pub async fn replay(script: Script, config: ProxyConfig) -> Result<Vec<StepReport>> {
    let mut store = MemoryStore::new();
    if script.generated_ids {
        store = store.with_generated_ids(script.model.id_property.clone());
    }
    let store = Arc::new(store);
    let proxy = DocumentProxy::new(config, script.model, store.clone());

    let collection = store.handle(&proxy.config().database, proxy.collection_name());
    for fault in script.faults {
        match fault {
            Fault::Fail { field, value, message } => collection.fail_when(&field, value, &message),
            Fault::Delay { field, value, delay_ms } => {
                collection.delay_when(&field, value, Duration::from_millis(delay_ms))
            }
            Fault::FailQueries { message } => collection.fail_queries(&message),
            Fault::FailIndexBuilds { message } => collection.fail_index_builds(&message),
        }
    }

    let mut reports = Vec::with_capacity(script.operations.len());
    for step in script.operations {
        let mut operation = step.into_operation();
        let outcome = proxy.execute(&mut operation).await;
        info!(action = %operation.action(), outcome = outcome.as_str(), "step finished");
        reports.push(StepReport::new(operation, outcome));
    }
    Ok(reports)
}
