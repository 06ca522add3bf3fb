//! Read translation.
//!
//! A read runs in two stages. Equality filters on a property are pushed down
//! into the backend filter; the remaining filters (custom predicates and
//! non-equality operators) are applied client-side to the records the query
//! returned, followed by sorting and the page window. A filter pushed down is
//! never applied a second time on the client.

use crate::document::{strip_internal_id, Document};
use crate::model::{Model, Record};
use crate::operation::{Filter, Operation, RecordEntry, Sorter};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Backend filter plus the filters left for client-side evaluation.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub selector: Document,
    pub residual: Vec<Filter>,
}

/// Translate an operation into a query plan.
///
/// A direct identifier lookup (a param named after the id property) wins
/// over every filter on the operation.
pub fn plan(operation: &Operation, model: &Model) -> QueryPlan {
    let id_property = &model.id_property;
    if let Some(id) = operation.params().get(id_property).filter(|id| !id.is_null()) {
        return QueryPlan {
            selector: Document::from([(id_property.clone(), id.clone())]),
            residual: Vec::new(),
        };
    }

    let mut plan = QueryPlan::default();
    for filter in operation.filters() {
        match &filter.property {
            Some(property) if filter.is_push_down() => {
                plan.selector.insert(property.clone(), filter.value.clone());
            }
            _ => plan.residual.push(filter.clone()),
        }
    }
    plan
}

/// Turn stored documents into record entries, dropping internal ids.
pub fn reshape(docs: Vec<Document>, id_property: &str) -> Vec<RecordEntry> {
    docs.into_iter()
        .map(|mut data| {
            strip_internal_id(&mut data);
            RecordEntry {
                client_id: None,
                id: data.get(id_property).cloned(),
                data,
            }
        })
        .collect()
}

/// Entry describing a record already materialized on the client.
pub fn entry_for(record: &Record, id_property: &str) -> RecordEntry {
    RecordEntry {
        client_id: None,
        id: record.id(id_property).cloned(),
        data: record.data.clone(),
    }
}

/// Whether the client-side pass has anything to do.
pub fn needs_refinement(operation: &Operation) -> bool {
    !operation.filters().is_empty()
        || !operation.sorters().is_empty()
        || operation.start().is_some()
        || operation.limit().is_some()
}

/// Client-side pass over read records.
///
/// De-duplicates by identifier (first occurrence wins), applies `residual`,
/// sorts, then cuts the page window. Returns the page and the number of
/// records that matched before paging.
pub fn refine(
    records: &[Record],
    residual: &[Filter],
    sorters: &[Sorter],
    start: Option<usize>,
    limit: Option<usize>,
    id_property: &str,
) -> (Vec<Record>, usize) {
    let mut seen = HashSet::new();
    let mut matched: Vec<Record> = records
        .iter()
        .filter(|record| {
            let key = match record.id(id_property) {
                Some(id) => format!("id:{}", id),
                None => format!("client:{}", record.client_id),
            };
            seen.insert(key)
        })
        .filter(|record| residual.iter().all(|filter| filter.matches(record)))
        .cloned()
        .collect();

    if !sorters.is_empty() {
        matched.sort_by(|a, b| {
            sorters
                .iter()
                .map(|sorter| sorter.compare(a, b))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let total = matched.len();
    let page = matched
        .into_iter()
        .skip(start.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    (page, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Datum, INTERNAL_ID_FIELD};
    use crate::model::Field;
    use crate::operation::FilterOperator;

    fn model() -> Model {
        Model::new("Task")
            .with_field(Field::new("id"))
            .with_field(Field::new("status"))
    }

    fn task(id: i32, status: &str, priority: i32) -> Record {
        Record::from_pairs([
            ("id", Datum::from(id)),
            ("status", Datum::from(status)),
            ("priority", Datum::from(priority)),
        ])
    }

    #[test]
    fn test_identifier_lookup_ignores_filters() {
        let op = Operation::read()
            .with_param("id", 42)
            .with_filter(Filter::eq("status", "active"))
            .with_filter(Filter::new("priority", FilterOperator::Gt, 1));

        let plan = plan(&op, &model());
        assert_eq!(plan.selector, Document::from([("id".to_string(), Datum::from(42))]));
        assert!(plan.residual.is_empty());
    }

    #[test]
    fn test_equality_filters_are_pushed_down() {
        let op = Operation::read()
            .with_filter(Filter::eq("status", "active"))
            .with_filter(Filter::new("priority", FilterOperator::Ge, 2))
            .with_filter(Filter::predicate(|_| true));

        let plan = plan(&op, &model());
        assert_eq!(
            plan.selector,
            Document::from([("status".to_string(), Datum::from("active"))])
        );
        assert_eq!(plan.residual.len(), 2);
        assert!(plan.residual.iter().all(|f| !f.is_push_down()));
    }

    #[test]
    fn test_reshape_strips_internal_id() {
        let mut doc = Document::from([("id".to_string(), Datum::from(1))]);
        doc.insert(INTERNAL_ID_FIELD.to_string(), Datum::from("abc"));

        let entries = reshape(vec![doc], "id");
        assert_eq!(entries[0].client_id, None);
        assert_eq!(entries[0].id, Some(Datum::from(1)));
        assert!(!entries[0].data.contains_key(INTERNAL_ID_FIELD));
    }

    #[test]
    fn test_refine_dedupes_filters_sorts_and_pages() {
        let records = vec![
            task(1, "open", 3),
            task(2, "open", 1),
            task(1, "open", 3),
            task(3, "open", 2),
            task(4, "open", 0),
        ];
        let residual = vec![Filter::new("priority", FilterOperator::Ge, 1)];

        let (page, total) = refine(&records, &residual, &[Sorter::desc("priority")], Some(1), Some(1), "id");
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].get("id"), Some(&Datum::from(3)));
    }
}
