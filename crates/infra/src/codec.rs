//! Record codec: projects a [`UserEntity`] onto one tag/field point and folds
//! row-per-field query results back into entities.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use warden_auth::{PasswordSecret, Role, UserEntity, unset_timestamp};
use warden_core::UserId;

use crate::store::{Point, Row};

pub const USERS: &str = "Users";

/// Stored in place of any attribute that is empty or does not apply to the role, so
/// every entity has the same column shape.
pub const BLANK: &str = " ";

pub mod tag {
    pub const USER_ID: &str = "UserId";
    pub const TYPE: &str = "Type";
}

pub mod field {
    pub const NAME: &str = "Name";
    pub const EMAIL: &str = "Email";
    pub const PASSWORD: &str = "Password";
    pub const SERVICE_TYPE: &str = "serviceType";
    pub const CREATED_AT: &str = "CreatedAt";
    pub const UPDATED_AT: &str = "UpdatedAt";
    pub const COMPANY: &str = "Company";
    pub const COMPANY_ID: &str = "CompanyId";
    pub const BUCKET: &str = "Bucket";
    pub const ROLE_DETAIL: &str = "Role";
    pub const ZONE: &str = "Zone";
    pub const ZONE_ID: &str = "ZoneId";
    pub const SITE: &str = "Site";
    pub const SITE_ID: &str = "SiteId";
}

/// One generation of an entity: its key and the point to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSet {
    pub id: UserId,
    pub point: Point,
}

fn stored(value: &str) -> &str {
    if value.is_empty() { BLANK } else { value }
}

fn loaded(value: &str) -> String {
    if value == BLANK {
        String::new()
    } else {
        value.to_string()
    }
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Lenient timestamp parse: anything unreadable becomes [`unset_timestamp`].
fn parse_time(value: &str) -> DateTime<Utc> {
    let value = value.trim();
    if value.is_empty() {
        return unset_timestamp();
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return t.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return naive.and_utc();
        }
    }
    tracing::debug!(value, "unparseable timestamp, using unset");
    unset_timestamp()
}

/// Encode an entity into a single point.
///
/// A fresh id is generated unless `is_update`, in which case `entity.id` is reused and
/// the caller must already have purged the previous generation. `created_at` falls back
/// to `now` when unset; `updated_at` is always `now`.
pub fn encode(entity: &UserEntity, is_update: bool, now: DateTime<Utc>) -> WriteSet {
    let id = if is_update { entity.id } else { UserId::new() };
    let created_at = if entity.created_at == unset_timestamp() {
        now
    } else {
        entity.created_at
    };

    let mut e = entity.clone();
    e.blank_inapplicable();

    let point = Point::new(USERS, now)
        .tag(tag::USER_ID, id.to_string())
        .tag(tag::TYPE, e.role.as_str())
        .field(field::NAME, stored(&e.name))
        .field(field::EMAIL, stored(&e.email))
        .field(field::PASSWORD, stored(e.password.expose()))
        .field(field::SERVICE_TYPE, stored(&e.service_type))
        .field(field::CREATED_AT, format_time(created_at))
        .field(field::UPDATED_AT, format_time(now))
        .field(field::COMPANY, stored(&e.company.name))
        .field(field::COMPANY_ID, stored(&e.company.id))
        .field(field::BUCKET, stored(&e.bucket_topic))
        .field(field::ROLE_DETAIL, stored(&e.role_detail))
        .field(field::ZONE, stored(&e.zone.name))
        .field(field::ZONE_ID, stored(&e.zone.id))
        .field(field::SITE, stored(&e.site.name))
        .field(field::SITE_ID, stored(&e.site.id));

    WriteSet { id, point }
}

fn apply_field(user: &mut UserEntity, name: &str, value: &str) {
    match name {
        field::NAME => user.name = loaded(value),
        field::EMAIL => user.email = loaded(value),
        field::PASSWORD => user.password = PasswordSecret::new(loaded(value)),
        field::SERVICE_TYPE => user.service_type = loaded(value),
        field::CREATED_AT => user.created_at = parse_time(value),
        field::UPDATED_AT => user.updated_at = parse_time(value),
        field::COMPANY => user.company.name = loaded(value),
        field::COMPANY_ID => user.company.id = loaded(value),
        field::BUCKET => user.bucket_topic = loaded(value),
        field::ROLE_DETAIL => user.role_detail = loaded(value),
        field::ZONE => user.zone.name = loaded(value),
        field::ZONE_ID => user.zone.id = loaded(value),
        field::SITE => user.site.name = loaded(value),
        field::SITE_ID => user.site.id = loaded(value),
        _ => {}
    }
}

#[derive(Debug)]
struct Fold<'a> {
    id: UserId,
    role: Option<(DateTime<Utc>, Role)>,
    fields: HashMap<&'a str, (DateTime<Utc>, &'a str)>,
}

impl<'a> Fold<'a> {
    /// Later timestamps win; on a tie the row seen last wins.
    fn absorb(&mut self, row: &'a Row) {
        if let Some(role) = row.tag(tag::TYPE).and_then(|t| t.parse::<Role>().ok()) {
            if self.role.is_none_or(|(t, _)| row.time >= t) {
                self.role = Some((row.time, role));
            }
        }
        let slot = self
            .fields
            .entry(row.field.as_str())
            .or_insert((row.time, row.value.as_str()));
        if row.time >= slot.0 {
            *slot = (row.time, row.value.as_str());
        }
    }

    fn finish(self) -> Option<UserEntity> {
        let Some((_, role)) = self.role else {
            tracing::warn!(user_id = %self.id, "rows without a recognised Type tag, skipping");
            return None;
        };
        let mut user = UserEntity::empty(self.id, role);
        for (name, (_, value)) in self.fields {
            apply_field(&mut user, name, value);
        }
        Some(user)
    }
}

/// Fold rows into entities, grouped by the `UserId` tag, in first-seen order.
///
/// Rows whose id tag is missing or not a valid identifier are skipped, as are groups
/// without a recognised role.
pub fn decode_many(rows: &[Row]) -> Vec<UserEntity> {
    let mut index: HashMap<UserId, usize> = HashMap::new();
    let mut folds: Vec<Fold<'_>> = Vec::new();

    for row in rows {
        let Some(id) = row.tag(tag::USER_ID).and_then(|v| v.parse::<UserId>().ok()) else {
            tracing::debug!(tag = ?row.tag(tag::USER_ID), "row with unreadable UserId skipped");
            continue;
        };
        let slot = *index.entry(id).or_insert_with(|| {
            folds.push(Fold {
                id,
                role: None,
                fields: HashMap::new(),
            });
            folds.len() - 1
        });
        folds[slot].absorb(row);
    }

    folds.into_iter().filter_map(Fold::finish).collect()
}

/// Decode the single entity `target` from `rows`, ignoring any other ids present.
pub fn decode(rows: &[Row], target: UserId) -> Option<UserEntity> {
    let target_tag = target.to_string();
    let own: Vec<Row> = rows
        .iter()
        .filter(|r| r.tag(tag::USER_ID).map(str::trim) == Some(target_tag.as_str()))
        .cloned()
        .collect();
    decode_many(&own).into_iter().next()
}
