//! Filters and sorters attached to a read operation.
//!
//! Property filters using [`FilterOperator::Eq`] are pushed down into the
//! backend query. Everything else (non-equality operators and custom
//! predicates) stays client-side and is evaluated against record data after
//! the query returns.

use crate::document::Datum;
use crate::model::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Client-side predicate over a record.
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Comparison applied by a property filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Value is an array containing the field value.
    In,
    /// Case-insensitive substring match on strings.
    Like,
}

/// A read filter.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Datum,
    #[serde(skip)]
    predicate: Option<Predicate>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("property", &self.property)
            .field("operator", &self.operator)
            .field("value", &self.value)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Filter {
    pub fn new(property: impl Into<String>, operator: FilterOperator, value: impl Into<Datum>) -> Self {
        Self {
            property: Some(property.into()),
            operator,
            value: value.into(),
            predicate: None,
        }
    }

    /// Equality filter, eligible for push-down.
    pub fn eq(property: impl Into<String>, value: impl Into<Datum>) -> Self {
        Self::new(property, FilterOperator::Eq, value)
    }

    /// Property-less filter evaluated by a custom predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// Whether this filter can be expressed as a backend equality filter.
    pub fn is_push_down(&self) -> bool {
        self.predicate.is_none() && self.property.is_some() && self.operator == FilterOperator::Eq
    }

    /// Evaluate the filter against a record's data.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(predicate) = &self.predicate {
            return predicate(record);
        }

        let Some(property) = &self.property else {
            return true;
        };

        let field = record.get(property).unwrap_or(&Datum::Null);
        let ordering = || field.compare(&self.value);

        match self.operator {
            FilterOperator::Eq => *field == self.value,
            FilterOperator::Ne => *field != self.value,
            FilterOperator::Lt => ordering() == Some(Ordering::Less),
            FilterOperator::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            FilterOperator::Gt => ordering() == Some(Ordering::Greater),
            FilterOperator::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            FilterOperator::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.contains(field)),
            FilterOperator::Like => match (field.as_string(), self.value.as_string()) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort key for read results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub property: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sorter {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Missing and null values sort first; incomparable values keep their order.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let left = a.get(&self.property).filter(|v| !v.is_null());
        let right = b.get(&self.property).filter(|v| !v.is_null());

        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => l.compare(r).unwrap_or(Ordering::Equal),
        };

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}
