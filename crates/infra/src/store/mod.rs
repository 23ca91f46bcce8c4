//! Column-store boundary.
//!
//! The directory is persisted in a tag/field time-series store that only offers
//! range-filtered reads, point appends, and predicate deletes. This module defines that
//! boundary without assuming a particular backend.

mod flux;
pub mod in_memory;
pub mod influx;
pub mod r#trait;

pub use in_memory::InMemoryColumnStore;
pub use influx::{InfluxColumnStore, InfluxSettings};
pub use r#trait::{
    ColumnStore, Condition, DeletePredicate, Point, Row, RowQuery, RowWindow, StoreError, TimeRange,
};
