use std::sync::RwLock;

use async_trait::async_trait;

use super::r#trait::{ColumnStore, DeletePredicate, Point, Row, RowQuery, StoreError, TimeRange};

/// In-memory row-per-field column store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryColumnStore {
    rows: RwLock<Vec<Row>>,
}

impl InMemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all measurements.
    pub fn row_count(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    /// Append a point synchronously (seeding fixtures).
    pub fn insert(&self, point: Point) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        rows.extend(point.into_rows());
        Ok(())
    }
}

#[async_trait]
impl ColumnStore for InMemoryColumnStore {
    async fn query(&self, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;

        let mut matched: Vec<Row> = rows
            .iter()
            .filter(|r| r.measurement == query.measurement)
            .filter(|r| query.range.contains(r.time))
            .filter(|r| query.conditions.iter().all(|c| c.matches(r)))
            .cloned()
            .collect();
        drop(rows);

        if let Some(tag) = &query.sort_desc_by_tag {
            // Stable: rows sharing the tag keep write order.
            matched.sort_by(|a, b| b.tag(tag).cmp(&a.tag(tag)));
        }

        if let Some(window) = query.window {
            matched = matched
                .into_iter()
                .skip(window.offset)
                .take(window.limit)
                .collect();
        }

        Ok(matched)
    }

    async fn write(&self, point: Point) -> Result<(), StoreError> {
        if point.fields.is_empty() {
            return Err(StoreError::InvalidRequest("point has no fields".to_string()));
        }
        self.insert(point)
    }

    async fn delete(&self, range: TimeRange, predicate: &DeletePredicate) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        rows.retain(|r| !(range.contains(r.time) && predicate.matches(r)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user_point(id: &str, kind: &str, email: &str, at: chrono::DateTime<Utc>) -> Point {
        Point::new("Users", at)
            .tag("UserId", id)
            .tag("Type", kind)
            .field("Name", "n")
            .field("Email", email)
    }

    #[tokio::test]
    async fn query_returns_one_row_per_field() {
        let store = InMemoryColumnStore::new();
        let now = Utc::now();
        store.write(user_point("a", "Admin", "a@x.com", now)).await.unwrap();

        let rows = store
            .query(&RowQuery::new("Users", TimeRange::up_to(now)).tag_eq("UserId", "a"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.tag("Type") == Some("Admin")));
    }

    #[tokio::test]
    async fn field_condition_filters_rows() {
        let store = InMemoryColumnStore::new();
        let now = Utc::now();
        store.write(user_point("a", "Admin", "a@x.com", now)).await.unwrap();
        store.write(user_point("b", "Admin", "b@x.com", now)).await.unwrap();

        let rows = store
            .query(&RowQuery::new("Users", TimeRange::up_to(now)).field_eq("Email", "b@x.com"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tag("UserId"), Some("b"));
    }

    #[tokio::test]
    async fn sorted_window_is_applied_after_sort() {
        let store = InMemoryColumnStore::new();
        let now = Utc::now();
        for id in ["1", "3", "2"] {
            store.write(user_point(id, "Employee", "e@x.com", now)).await.unwrap();
        }

        let q = RowQuery::new("Users", TimeRange::up_to(now))
            .tag_eq("Type", "Employee")
            .sort_desc_by("UserId")
            .window(3, 1);
        let ids: Vec<_> = store
            .query(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.tags["UserId"].clone())
            .collect();
        assert_eq!(ids, vec!["3", "2", "2"]);
    }

    #[tokio::test]
    async fn delete_respects_range_and_predicate() {
        let store = InMemoryColumnStore::new();
        let now = Utc::now();
        let old = now - Duration::days(400);
        store.write(user_point("a", "Admin", "a@x.com", old)).await.unwrap();
        store.write(user_point("a", "Admin", "a@x.com", now)).await.unwrap();
        store.write(user_point("b", "Admin", "b@x.com", now)).await.unwrap();

        let predicate = DeletePredicate::new("Users").tag_eq("UserId", "a");
        store
            .delete(TimeRange::new(now - Duration::days(365), now), &predicate)
            .await
            .unwrap();

        let remaining = store
            .query(&RowQuery::new("Users", TimeRange::up_to(now)).tag_eq("UserId", "a"))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r.time == old));
        assert_eq!(store.row_count(), 4);
    }

    #[tokio::test]
    async fn rows_outside_range_are_invisible() {
        let store = InMemoryColumnStore::new();
        let now = Utc::now();
        store
            .write(user_point("a", "Admin", "a@x.com", now + Duration::seconds(5)))
            .await
            .unwrap();
        let rows = store
            .query(&RowQuery::new("Users", TimeRange::up_to(now)))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
