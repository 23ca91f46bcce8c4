//! Reference resolver: human-facing company/site/zone identifiers to their canonical
//! short ids, read from the auxiliary measurements.

use chrono::{DateTime, Utc};

use crate::store::{ColumnStore, Row, RowQuery, StoreError, TimeRange};

const SHORT_ID: &str = "ShortId";
const TOPIC: &str = "Topic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Company,
    Site,
    Zone,
}

impl ReferenceKind {
    pub fn measurement(&self) -> &'static str {
        match self {
            ReferenceKind::Company => "Companies",
            ReferenceKind::Site => "Sites",
            ReferenceKind::Zone => "Zones",
        }
    }

    /// Tag holding the human-facing identifier.
    pub fn key_tag(&self) -> &'static str {
        match self {
            ReferenceKind::Company => "CompanyId",
            ReferenceKind::Site => "SiteId",
            ReferenceKind::Zone => "ZoneId",
        }
    }
}

impl core::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ReferenceKind::Company => "company",
            ReferenceKind::Site => "site",
            ReferenceKind::Zone => "zone",
        };
        f.write_str(s)
    }
}

/// Canonical form of an organizational reference. `topic` is only carried by companies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalReference {
    pub short_id: String,
    pub topic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReferenceResolver<S> {
    store: S,
}

impl<S: ColumnStore> ReferenceResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Look up `human_id` in the measurement for `kind`.
    ///
    /// `Ok(None)` when no row carries that identifier. Whether that is fatal is the
    /// caller's decision.
    pub async fn resolve(
        &self,
        kind: ReferenceKind,
        human_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CanonicalReference>, StoreError> {
        let query = RowQuery::new(kind.measurement(), TimeRange::up_to(now))
            .tag_eq(kind.key_tag(), human_id);
        let rows = self.store.query(&query).await?;

        let resolved = fold_reference(kind, human_id, &rows);
        tracing::debug!(%kind, human_id, found = resolved.is_some(), "reference lookup");
        Ok(resolved)
    }
}

fn fold_reference(kind: ReferenceKind, human_id: &str, rows: &[Row]) -> Option<CanonicalReference> {
    let mut own = rows
        .iter()
        .filter(|r| r.tag(kind.key_tag()) == Some(human_id))
        .peekable();
    own.peek()?;

    let mut reference = CanonicalReference::default();
    let mut short_id_at: Option<DateTime<Utc>> = None;
    let mut topic_at: Option<DateTime<Utc>> = None;
    for row in own {
        match row.field.as_str() {
            SHORT_ID if short_id_at.is_none_or(|t| row.time >= t) => {
                reference.short_id = row.value.clone();
                short_id_at = Some(row.time);
            }
            TOPIC if kind == ReferenceKind::Company && topic_at.is_none_or(|t| row.time >= t) => {
                reference.topic = Some(row.value.clone());
                topic_at = Some(row.time);
            }
            _ => {}
        }
    }
    Some(reference)
}
