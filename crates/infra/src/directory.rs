//! Directory service: create/read/update/delete of users over the append-only store.
//!
//! Updates are delete-then-recreate under the same id. Writers sharing an email or id
//! are serialized in-process by a [`WriteSequencer`]; a concurrent reader can still see
//! a user as absent between the purge and the re-write of an update.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};

use warden_auth::{Caller, Role, UserEntity, decide_for};
use warden_core::{DomainError, DomainResult, UserId};

use crate::codec::{self, USERS, field, tag};
use crate::resolver::{ReferenceKind, ReferenceResolver};
use crate::sequencer::WriteSequencer;
use crate::store::{ColumnStore, DeletePredicate, RowQuery, TimeRange};

/// Logical users per page.
pub const PAGE_SIZE: usize = 50;

/// Initial physical-row window per requested user when listing.
pub const ROW_WINDOW_FACTOR: usize = 13;

/// Largest row window a query may ask for; the store takes a signed 64-bit limit.
pub const MAX_ROW_WINDOW: usize = i64::MAX as usize;

/// How far back a purge reaches.
pub const DELETE_LOOKBACK_MONTHS: u32 = 12;

fn email_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

fn id_key(id: UserId) -> String {
    format!("id:{id}")
}

pub struct DirectoryService<S = Arc<dyn ColumnStore>> {
    store: S,
    resolver: ReferenceResolver<S>,
    sequencer: WriteSequencer,
}

impl<S> core::fmt::Debug for DirectoryService<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirectoryService").finish_non_exhaustive()
    }
}

impl<S: ColumnStore + Clone> DirectoryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            resolver: ReferenceResolver::new(store.clone()),
            store,
            sequencer: WriteSequencer::new(),
        }
    }

    /// Create a user and return its id.
    ///
    /// Unless `is_update`, a user with the same email must not exist (exact match). The
    /// company must resolve for every role but SuperAdmin; site and zone are resolved
    /// when given and left without a canonical id otherwise.
    pub async fn create(&self, mut entity: UserEntity, is_update: bool) -> DomainResult<UserId> {
        entity.validate_required().map_err(DomainError::validation)?;
        let _write = self.sequencer.acquire(email_key(&entity.email)).await;
        let now = Utc::now();

        if !is_update && self.email_exists(&entity.email, now, "user creation failed").await? {
            return Err(DomainError::conflict("email already exists"));
        }

        self.resolve_scope(&mut entity, now, "user creation failed").await?;
        let id = self
            .write_generation(&entity, is_update, now, "user creation failed")
            .await?;

        tracing::info!(user_id = %id, role = %entity.role, "user created");
        Ok(id)
    }

    /// One page (1-based) of users with `role`, newest id first. Empty when nothing
    /// matches.
    ///
    /// Each user spans several rows, so the row window starts at
    /// `ROW_WINDOW_FACTOR × PAGE_SIZE × page` and doubles until enough complete users are
    /// known or the store runs out of rows.
    pub async fn get_all_users(&self, role: Role, page: usize) -> DomainResult<Vec<UserEntity>> {
        if page == 0 {
            return Err(DomainError::validation("page number must be at least 1"));
        }
        let needed = page.saturating_mul(PAGE_SIZE);
        let mut limit = needed.saturating_mul(ROW_WINDOW_FACTOR).min(MAX_ROW_WINDOW);
        let now = Utc::now();

        loop {
            let query = RowQuery::new(USERS, TimeRange::up_to(now))
                .tag_eq(tag::TYPE, role.as_str())
                .sort_desc_by(tag::USER_ID)
                .window(limit, 0);
            let rows = self
                .store
                .query(&query)
                .await
                .map_err(|e| DomainError::backend("user listing failed", &e))?;

            let exhausted = rows.len() < limit || limit == MAX_ROW_WINDOW;
            let mut users = codec::decode_many(&rows);
            if !exhausted {
                // The window may have cut the last user's rows short.
                let cut = rows
                    .last()
                    .and_then(|r| r.tag(tag::USER_ID))
                    .and_then(|v| v.parse::<UserId>().ok());
                if let Some(cut) = cut {
                    users.retain(|u| u.id != cut);
                }
            }

            if exhausted || users.len() >= needed {
                tracing::debug!(%role, page, rows = rows.len(), users = users.len(), "listed users");
                return Ok(users
                    .into_iter()
                    .skip(needed - PAGE_SIZE)
                    .take(PAGE_SIZE)
                    .collect());
            }
            limit = limit.saturating_mul(2).min(MAX_ROW_WINDOW);
        }
    }

    pub async fn get_user_by_id(&self, id: UserId) -> DomainResult<Option<UserEntity>> {
        self.fetch(id, Utc::now(), "user lookup failed").await
    }

    /// The user whose stored email equals `email` exactly.
    pub async fn find_by_email(&self, email: &str) -> DomainResult<Option<UserEntity>> {
        let now = Utc::now();
        let query = RowQuery::new(USERS, TimeRange::up_to(now)).field_eq(field::EMAIL, email);
        let rows = self
            .store
            .query(&query)
            .await
            .map_err(|e| DomainError::backend("user lookup failed", &e))?;

        let Some(id) = rows
            .iter()
            .filter_map(|r| r.tag(tag::USER_ID))
            .find_map(|v| v.parse::<UserId>().ok())
        else {
            return Ok(None);
        };
        self.fetch(id, now, "user lookup failed").await
    }

    pub async fn check_email_exists(&self, email: &str) -> DomainResult<bool> {
        self.email_exists(email, Utc::now(), "email lookup failed").await
    }

    /// Replace the user `id` with `entity`.
    ///
    /// The caller must be allowed to act on both the current and the new role.
    /// `created_at` is carried over, and references are resolved before the current
    /// generation is purged so a failed resolution leaves the user untouched.
    pub async fn update_user(&self, mut entity: UserEntity, id: UserId, caller: &Caller) -> DomainResult<()> {
        entity.validate_required().map_err(DomainError::validation)?;
        let _by_id = self.sequencer.acquire(id_key(id)).await;

        let current = self
            .fetch(id, Utc::now(), "user update failed")
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;

        authorize(caller, current.role)?;
        authorize(caller, entity.role)?;

        // Both emails stay locked until the new generation is written, so no create can
        // claim either one while the user is briefly absent.
        let _by_email = self
            .sequencer
            .acquire_all([email_key(&current.email), email_key(&entity.email)])
            .await;
        // Read after the locks so writes by the previous holders are in range.
        let now = Utc::now();

        let email_changed = !current.email.eq_ignore_ascii_case(&entity.email);
        if email_changed && self.email_exists(&entity.email, now, "user update failed").await? {
            return Err(DomainError::conflict("email already exists"));
        }

        entity.id = id;
        entity.created_at = current.created_at;
        self.resolve_scope(&mut entity, now, "user update failed").await?;

        self.purge(id, now, "user update failed").await?;
        self.write_generation(&entity, true, now, "user update failed").await?;

        tracing::info!(user_id = %id, role = %entity.role, "user updated");
        Ok(())
    }

    /// Purge every write for `id` from the last twelve months, if `caller` may act on it.
    pub async fn delete_user(&self, id: UserId, caller: &Caller) -> DomainResult<()> {
        let _write = self.sequencer.acquire(id_key(id)).await;

        let current = self
            .fetch(id, Utc::now(), "user deletion failed")
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;

        authorize(caller, current.role)?;
        let _by_email = self.sequencer.acquire(email_key(&current.email)).await;
        let now = Utc::now();
        self.purge(id, now, "user deletion failed").await?;

        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn fetch(
        &self,
        id: UserId,
        now: DateTime<Utc>,
        context: &'static str,
    ) -> DomainResult<Option<UserEntity>> {
        let query = RowQuery::new(USERS, TimeRange::up_to(now)).tag_eq(tag::USER_ID, id.to_string());
        let rows = self
            .store
            .query(&query)
            .await
            .map_err(|e| DomainError::backend(context, &e))?;
        Ok(codec::decode(&rows, id))
    }

    async fn email_exists(&self, email: &str, now: DateTime<Utc>, context: &'static str) -> DomainResult<bool> {
        let query = RowQuery::new(USERS, TimeRange::up_to(now))
            .field_eq(field::EMAIL, email)
            .window(1, 0);
        let rows = self
            .store
            .query(&query)
            .await
            .map_err(|e| DomainError::backend(context, &e))?;
        Ok(!rows.is_empty())
    }

    async fn resolve_scope(
        &self,
        entity: &mut UserEntity,
        now: DateTime<Utc>,
        context: &'static str,
    ) -> DomainResult<()> {
        entity.blank_inapplicable();
        if !entity.role.has_company() {
            return Ok(());
        }

        let company = self
            .resolver
            .resolve(ReferenceKind::Company, &entity.company.name, now)
            .await
            .map_err(|e| DomainError::backend(context, &e))?
            .ok_or_else(|| DomainError::not_found("company not found"))?;
        entity.company.id = company.short_id;
        entity.bucket_topic = company.topic.unwrap_or_default();

        if !entity.role.has_site_scope() {
            return Ok(());
        }
        for (kind, scope) in [
            (ReferenceKind::Site, &mut entity.site),
            (ReferenceKind::Zone, &mut entity.zone),
        ] {
            scope.id.clear();
            if scope.is_blank() {
                continue;
            }
            let resolved = self
                .resolver
                .resolve(kind, &scope.name, now)
                .await
                .map_err(|e| DomainError::backend(context, &e))?;
            match resolved {
                Some(r) => scope.id = r.short_id,
                None => tracing::debug!(%kind, name = %scope.name, "reference not found, left blank"),
            }
        }
        Ok(())
    }

    async fn write_generation(
        &self,
        entity: &UserEntity,
        is_update: bool,
        now: DateTime<Utc>,
        context: &'static str,
    ) -> DomainResult<UserId> {
        let write_set = codec::encode(entity, is_update, now);
        self.store
            .write(write_set.point)
            .await
            .map_err(|e| DomainError::backend(context, &e))?;
        Ok(write_set.id)
    }

    async fn purge(&self, id: UserId, now: DateTime<Utc>, context: &'static str) -> DomainResult<()> {
        let start = now
            .checked_sub_months(Months::new(DELETE_LOOKBACK_MONTHS))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let predicate = DeletePredicate::new(USERS).tag_eq(tag::USER_ID, id.to_string());
        self.store
            .delete(TimeRange::new(start, now), &predicate)
            .await
            .map_err(|e| DomainError::backend(context, &e))
    }
}

fn authorize(caller: &Caller, target: Role) -> DomainResult<()> {
    decide_for(caller, target).into_result().map_err(|reason| {
        tracing::warn!(reason = reason.code(), %target, "authorization denied");
        DomainError::unauthorized(reason.code())
    })
}
