//! Exact-match predicates for `query`, `count` and `count_with_tag`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ValidationError;

/// Field → value exact-match predicate over an entity's stored document.
///
/// Field paths are dotted (`tags.highway`, `location.1`) and address the
/// persisted JSON layout. Every predicate must match; an empty filter matches
/// everything. Numbers compare by value, so `5` matches a stored `5.0`.
///
/// # Examples
/// ```
/// use wayfarer_core::Filter;
///
/// let filter = Filter::new().field("tags.highway", "primary").field("speed", 12.5);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: BTreeMap<String, Value>,
}

impl Filter {
    /// A filter matching every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the field at `path` to equal `value`.
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.insert(path.into(), value.into());
        self
    }

    /// Whether the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self
            .predicates
            .keys()
            .any(|path| path.split('.').any(str::is_empty))
        {
            return Err(ValidationError::EmptyFilterField);
        }
        Ok(())
    }

    pub(crate) fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().all(|(path, expected)| {
            document
                .pointer(&json_pointer(path))
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }
}

/// Tag presence or key/value predicate evaluated inside SQLite.
///
/// # Examples
/// ```
/// use wayfarer_core::TagFilter;
///
/// let filter = TagFilter::new().tag("highway", "primary").key("maxspeed");
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    predicates: BTreeMap<String, Option<String>>,
}

impl TagFilter {
    /// A filter matching every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the tag `key` to be present with any value.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.predicates.insert(key.into(), None);
        self
    }

    /// Require the tag `key` to equal `value`.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.insert(key.into(), Some(value.into()));
        self
    }

    /// Whether the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// SQL `WHERE` clause over alias `e` plus its bound parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<String>) {
        if self.predicates.is_empty() {
            return ("1".to_owned(), Vec::new());
        }
        let mut clauses = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();
        for (key, value) in &self.predicates {
            params.push(key.clone());
            match value {
                Some(value) => {
                    clauses.push(
                        "EXISTS (SELECT 1 FROM json_each(e.document, '$.tags') AS t \
                         WHERE t.key = ? AND t.value = ?)",
                    );
                    params.push(value.clone());
                }
                None => clauses.push(
                    "EXISTS (SELECT 1 FROM json_each(e.document, '$.tags') AS t WHERE t.key = ?)",
                ),
            }
        }
        (clauses.join(" AND "), params)
    }
}

fn json_pointer(path: &str) -> String {
    path.split('.').fold(String::new(), |mut pointer, segment| {
        pointer.push('/');
        pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        pointer
    })
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}
