use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Closed time interval `[start, stop]` a read or delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self { start, stop }
    }

    /// Everything written from the Unix epoch up to `now`.
    pub fn up_to(now: DateTime<Utc>) -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH,
            stop: now,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.stop
    }
}

/// A single row filter. Conditions on one query are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Indexed tag equals value.
    Tag { key: String, value: String },
    /// Row carries `field` and its value equals `value`.
    Field { field: String, value: String },
}

impl Condition {
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Condition::Tag { key, value } => row.tag(key) == Some(value.as_str()),
            Condition::Field { field, value } => row.field == *field && row.value == *value,
        }
    }
}

/// Row limit/offset applied after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    pub limit: usize,
    pub offset: usize,
}

/// A range-filtered read against one measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub measurement: String,
    pub range: TimeRange,
    pub conditions: Vec<Condition>,
    /// Merge all series and sort rows by this tag, descending.
    pub sort_desc_by_tag: Option<String>,
    pub window: Option<RowWindow>,
}

impl RowQuery {
    pub fn new(measurement: impl Into<String>, range: TimeRange) -> Self {
        Self {
            measurement: measurement.into(),
            range,
            conditions: Vec::new(),
            sort_desc_by_tag: None,
            window: None,
        }
    }

    pub fn tag_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Field {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn sort_desc_by(mut self, tag: impl Into<String>) -> Self {
        self.sort_desc_by_tag = Some(tag.into());
        self
    }

    pub fn window(mut self, limit: usize, offset: usize) -> Self {
        self.window = Some(RowWindow { limit, offset });
        self
    }
}

/// One stored `(timestamp, field)` pair with the tags of its series.
///
/// The store is row-per-field: an entity written as one point comes back as one row
/// per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub time: DateTime<Utc>,
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub field: String,
    pub value: String,
}

impl Row {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// One append-only write: tags and string fields sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: Vec<(String, String)>,
    pub time: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            time,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Expand into the rows a store returns for this point.
    pub fn into_rows(self) -> Vec<Row> {
        let Point {
            measurement,
            tags,
            fields,
            time,
        } = self;
        fields
            .into_iter()
            .map(|(field, value)| Row {
                time,
                measurement: measurement.clone(),
                tags: tags.clone(),
                field,
                value,
            })
            .collect()
    }
}

/// Predicate for a purge: measurement plus tag equalities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePredicate {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
}

impl DeletePredicate {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
        }
    }

    pub fn tag_eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.measurement == self.measurement
            && self.tags.iter().all(|(k, v)| row.tag(k) == Some(v.as_str()))
    }
}

/// Column-store operation error.
///
/// These are infrastructure errors. The directory service logs them and re-classifies
/// them as a generic backend failure; their text never reaches a caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport failure: {0}")]
    Transport(String),

    #[error("store rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("invalid store request: {0}")]
    InvalidRequest(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Append-only tag/field store.
///
/// ## Read semantics
/// - Rows outside `range` or failing any condition are excluded.
/// - Without a sort, rows come back in write order.
/// - With `sort_desc_by_tag`, rows are ordered by that tag descending; rows sharing the
///   tag keep write order. `window` is applied afterwards.
///
/// ## Write semantics
/// - `write` appends; nothing is updated in place.
///
/// ## Delete semantics
/// - `delete` purges every row inside `range` that matches the predicate.
#[async_trait]
pub trait ColumnStore: Send + Sync {
    async fn query(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError>;

    async fn write(&self, point: Point) -> Result<(), StoreError>;

    async fn delete(&self, range: TimeRange, predicate: &DeletePredicate) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ColumnStore for Arc<S>
where
    S: ColumnStore + ?Sized,
{
    async fn query(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        (**self).query(query).await
    }

    async fn write(&self, point: Point) -> Result<(), StoreError> {
        (**self).write(point).await
    }

    async fn delete(&self, range: TimeRange, predicate: &DeletePredicate) -> Result<(), StoreError> {
        (**self).delete(range, predicate).await
    }
}
