//! Operations: one logical CRUD request spanning any number of records.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted ──set_started()──▶ Started ──complete()──▶ Completed
//!                                  │
//!                      set_result() / set_exception()
//! ```
//!
//! A result and an exception may both be attached while the operation is
//! running (a batch with partial failures has both). The transition to
//! `Completed` happens exactly once; after it the operation is frozen.

pub mod filter;
pub mod result;

pub use filter::{Filter, FilterOperator, Predicate, SortDirection, Sorter};
pub use result::{OperationException, RecordEntry, RecordFailure, ResultSet};

use crate::document::{Datum, Document};
use crate::error::{Error, Result};
use crate::model::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CRUD action of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperationState {
    #[default]
    NotStarted,
    Started,
    Completed,
}

/// Verdict of the record-processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Accepted,
    Rejected(String),
}

/// A single CRUD request.
#[derive(Debug, Clone)]
pub struct Operation {
    action: Action,
    records: Vec<Record>,
    params: Document,
    filters: Vec<Filter>,
    sorters: Vec<Sorter>,
    page: Option<usize>,
    start: Option<usize>,
    limit: Option<usize>,
    state: OperationState,
    result: Option<ResultSet>,
    exception: Option<OperationException>,
}

impl Operation {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            records: Vec::new(),
            params: Document::new(),
            filters: Vec::new(),
            sorters: Vec::new(),
            page: None,
            start: None,
            limit: None,
            state: OperationState::NotStarted,
            result: None,
            exception: None,
        }
    }

    pub fn create(records: Vec<Record>) -> Self {
        Self::new(Action::Create).with_records(records)
    }

    pub fn read() -> Self {
        Self::new(Action::Read)
    }

    pub fn update(records: Vec<Record>) -> Self {
        Self::new(Action::Update).with_records(records)
    }

    pub fn destroy(records: Vec<Record>) -> Self {
        Self::new(Action::Destroy).with_records(records)
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    /// Add a request parameter; a parameter named after the id property is a
    /// direct identifier lookup.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Datum>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sorter(mut self, sorter: Sorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    /// Page window; `start` is the offset of the first record.
    pub fn with_window(mut self, start: usize, limit: usize) -> Self {
        self.start = Some(start);
        self.limit = Some(limit);
        self
    }

    /// Page number (1-based) informational only; paging uses start/limit.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    pub fn params(&self) -> &Document {
        &self.params
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sorters(&self) -> &[Sorter] {
        &self.sorters
    }

    pub fn page(&self) -> Option<usize> {
        self.page
    }

    pub fn start(&self) -> Option<usize> {
        self.start
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == OperationState::Started
    }

    pub fn is_complete(&self) -> bool {
        self.state == OperationState::Completed
    }

    pub fn result(&self) -> Option<&ResultSet> {
        self.result.as_ref()
    }

    pub fn exception(&self) -> Option<&OperationException> {
        self.exception.as_ref()
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Completed with a successful result and no exception.
    pub fn was_successful(&self) -> bool {
        self.is_complete()
            && self.exception.is_none()
            && self.result.as_ref().is_some_and(|r| r.success)
    }

    pub fn set_started(&mut self) -> Result<()> {
        if self.state != OperationState::NotStarted {
            return Err(Error::InvalidState(format!(
                "{} operation already started",
                self.action
            )));
        }
        self.state = OperationState::Started;
        Ok(())
    }

    pub fn set_result(&mut self, result: ResultSet) -> Result<()> {
        self.ensure_running()?;
        self.result = Some(result);
        Ok(())
    }

    pub fn set_exception(&mut self, exception: OperationException) -> Result<()> {
        self.ensure_running()?;
        self.exception = Some(exception);
        Ok(())
    }

    /// The single terminal transition.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_running()?;
        self.state = OperationState::Completed;
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state {
            OperationState::Started => Ok(()),
            state => Err(Error::InvalidState(format!(
                "{} operation is {:?}, expected Started",
                self.action, state
            ))),
        }
    }

    /// Merge a result set into the operation's records.
    ///
    /// Create and update commit persisted identifiers into the matching client
    /// records, read materializes fresh records, destroy marks records erased.
    /// Nothing is modified when the result is rejected.
    pub fn process(&mut self, action: Action, result: &ResultSet, id_property: &str) -> ProcessOutcome {
        if action != self.action {
            return ProcessOutcome::Rejected(format!(
                "cannot process a {} result for a {} operation",
                action, self.action
            ));
        }
        if !self.is_started() {
            return ProcessOutcome::Rejected(format!("operation is {:?}", self.state));
        }
        if !result.success {
            return ProcessOutcome::Rejected("result set is unsuccessful".to_string());
        }

        if action == Action::Read {
            self.records = result
                .records
                .iter()
                .map(|entry| Record::persisted(entry.data.clone()))
                .collect();
            self.result = Some(result.clone());
            return ProcessOutcome::Accepted;
        }

        // Validate before touching any record.
        let mut targets = Vec::with_capacity(result.records.len());
        for entry in &result.records {
            let Some(client_id) = entry.client_id.as_deref() else {
                return ProcessOutcome::Rejected("result entry has no client id".to_string());
            };
            match self.records.iter().position(|r| r.client_id == client_id) {
                Some(index) if targets.iter().any(|(seen, _)| *seen == index) => {
                    return ProcessOutcome::Rejected(format!(
                        "record with client id {} reported twice",
                        client_id
                    ))
                }
                Some(index) => targets.push((index, entry)),
                None => {
                    return ProcessOutcome::Rejected(format!(
                        "no record with client id {}",
                        client_id
                    ))
                }
            }
        }

        for (index, entry) in targets {
            let record = &mut self.records[index];
            match action {
                Action::Destroy => record.erased = true,
                _ => {
                    if let Some(id) = &entry.id {
                        record.set(id_property, id.clone());
                    }
                    record.commit();
                }
            }
        }

        self.result = Some(result.clone());
        ProcessOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(client_id: Option<&str>, id: i32) -> RecordEntry {
        RecordEntry {
            client_id: client_id.map(str::to_string),
            id: Some(Datum::from(id)),
            data: Document::new(),
        }
    }

    #[test]
    fn test_lifecycle_allows_one_terminal_transition() {
        let mut op = Operation::read();
        assert!(op.set_result(ResultSet::failed()).is_err());

        op.set_started().unwrap();
        assert!(op.set_started().is_err());

        op.set_result(ResultSet::new(vec![])).unwrap();
        op.complete().unwrap();
        assert!(op.is_complete());
        assert!(op.was_successful());

        assert!(op.complete().is_err());
        assert!(op
            .set_exception(OperationException::Query("late".into()))
            .is_err());
    }

    #[test]
    fn test_process_commits_ids_for_create() {
        let record = Record::from_pairs([("name", "Ann")]).with_client_id("c1");
        let mut op = Operation::create(vec![record]);
        op.set_started().unwrap();

        let result = ResultSet::new(vec![entry(Some("c1"), 10)]);
        assert_eq!(op.process(Action::Create, &result, "id"), ProcessOutcome::Accepted);
        assert_eq!(op.records()[0].get("id"), Some(&Datum::from(10)));
        assert!(!op.records()[0].phantom);
        assert_eq!(op.result(), Some(&result));
    }

    #[test]
    fn test_process_rejects_unknown_client_id_without_side_effects() {
        let records = vec![
            Record::new(Document::new()).with_client_id("c1"),
            Record::new(Document::new()).with_client_id("c2"),
        ];
        let mut op = Operation::update(records);
        op.set_started().unwrap();

        let result = ResultSet::new(vec![entry(Some("c1"), 1), entry(Some("zz"), 2)]);
        assert!(matches!(
            op.process(Action::Update, &result, "id"),
            ProcessOutcome::Rejected(_)
        ));
        assert_eq!(op.records()[0].get("id"), None);
        assert!(op.result().is_none());
    }

    #[test]
    fn test_process_rejects_duplicate_client_ids() {
        let mut op = Operation::create(vec![Record::new(Document::new()).with_client_id("c1")]);
        op.set_started().unwrap();

        let result = ResultSet::new(vec![entry(Some("c1"), 1), entry(Some("c1"), 2)]);
        assert!(matches!(
            op.process(Action::Create, &result, "id"),
            ProcessOutcome::Rejected(_)
        ));
        assert_eq!(op.records()[0].get("id"), None);
    }

    #[test]
    fn test_process_rejects_unsuccessful_and_mismatched_results() {
        let mut op = Operation::read();
        op.set_started().unwrap();

        assert!(matches!(
            op.process(Action::Read, &ResultSet::failed(), "id"),
            ProcessOutcome::Rejected(_)
        ));
        assert!(matches!(
            op.process(Action::Create, &ResultSet::new(vec![]), "id"),
            ProcessOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_process_read_and_destroy() {
        let mut read = Operation::read();
        read.set_started().unwrap();
        let mut data = Document::new();
        data.insert("id".into(), Datum::from(5));
        let result = ResultSet::new(vec![RecordEntry {
            client_id: None,
            id: Some(Datum::from(5)),
            data,
        }]);
        assert_eq!(read.process(Action::Read, &result, "id"), ProcessOutcome::Accepted);
        assert_eq!(read.records().len(), 1);
        assert_eq!(read.records()[0].id("id"), Some(&Datum::from(5)));
        assert!(!read.records()[0].phantom);

        let mut destroy = Operation::destroy(vec![Record::new(Document::new()).with_client_id("d1")]);
        destroy.set_started().unwrap();
        let result = ResultSet::new(vec![entry(Some("d1"), 1)]);
        assert_eq!(destroy.process(Action::Destroy, &result, "id"), ProcessOutcome::Accepted);
        assert!(destroy.records()[0].erased);
    }
}
