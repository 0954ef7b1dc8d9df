//! Repository contracts for the credential core.
//!
//! The core is written against these narrow traits, not an ORM surface. The
//! in-memory implementations back the test suite and double as reference
//! semantics for a relational adapter, in particular the conditional
//! revocation that closes the concurrent double-refresh race.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{OtpPurpose, OtpRecord, PermissionSet, RefreshToken};

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: &RefreshToken) -> Result<(), CoreError>;

    /// Look up a row by token hash regardless of state, so the caller can
    /// distinguish unknown, revoked and expired presentations for audit.
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, CoreError>;

    /// Conditionally revoke: set `revoked_at` only where it is still null.
    /// Returns whether this call performed the revocation. Under two
    /// concurrent refreshes of the same raw token exactly one caller sees
    /// `true`.
    async fn revoke_active_by_hash(&self, token_hash: &str) -> Result<bool, CoreError>;

    /// Revoke every active row for a user. Returns the number revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, CoreError>;

    /// Garbage-collect rows that are expired or revoked.
    async fn delete_expired(&self) -> Result<u64, CoreError>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Persist a new record, deleting prior pending records for the same
    /// `(target, purpose)` so the new code supersedes them.
    async fn create_superseding(&self, record: &OtpRecord) -> Result<(), CoreError>;

    /// Newest unverified record for `(target, purpose)`, expired or not;
    /// expiry classification belongs to the engine so it can report
    /// `OtpExpired` distinctly from `OtpNotFound`.
    async fn find_newest_pending(
        &self,
        target: &str,
        purpose: &OtpPurpose,
    ) -> Result<Option<OtpRecord>, CoreError>;

    /// Atomically increment the attempt counter and, when `matched` is true
    /// and the record is still unverified, set `verified_at`. Returns the
    /// updated record, or `None` if the record no longer exists.
    async fn record_attempt(
        &self,
        id: Uuid,
        matched: bool,
    ) -> Result<Option<OtpRecord>, CoreError>;

    /// Delete expired, unverified records. Returns the number deleted.
    async fn delete_expired(&self) -> Result<u64, CoreError>;
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Union of permission codes reachable from the user's assigned roles,
    /// recomputed on every call.
    async fn permissions_for_user(&self, user_id: Uuid) -> Result<PermissionSet, CoreError>;
}

/// In-memory refresh token store keyed by row id.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    rows: DashMap<Uuid, RefreshToken>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(&self, token: &RefreshToken) -> Result<(), CoreError> {
        self.rows.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, CoreError> {
        Ok(self
            .rows
            .iter()
            .find(|entry| entry.token_hash == token_hash)
            .map(|entry| entry.value().clone()))
    }

    async fn revoke_active_by_hash(&self, token_hash: &str) -> Result<bool, CoreError> {
        for mut entry in self.rows.iter_mut() {
            if entry.token_hash == token_hash {
                // Compare-and-set: only the caller that finds revoked_at
                // still unset wins.
                if entry.revoked_at.is_none() {
                    entry.revoked_at = Some(Utc::now());
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        Ok(false)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, CoreError> {
        let mut revoked = 0;
        for mut entry in self.rows.iter_mut() {
            if entry.user_id == user_id && entry.revoked_at.is_none() {
                entry.revoked_at = Some(Utc::now());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_expired(&self) -> Result<u64, CoreError> {
        let before = self.rows.len();
        self.rows.retain(|_, row| row.is_active());
        Ok((before - self.rows.len()) as u64)
    }
}

/// In-memory OTP store keyed by record id.
#[derive(Default)]
pub struct InMemoryOtpStore {
    rows: DashMap<Uuid, OtpRecord>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn create_superseding(&self, record: &OtpRecord) -> Result<(), CoreError> {
        self.rows.retain(|_, row| {
            !(row.target == record.target && row.purpose == record.purpose && row.is_pending())
        });
        self.rows.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_newest_pending(
        &self,
        target: &str,
        purpose: &OtpPurpose,
    ) -> Result<Option<OtpRecord>, CoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| {
                entry.target == target && &entry.purpose == purpose && !entry.is_verified()
            })
            .max_by_key(|entry| entry.created_at)
            .map(|entry| entry.value().clone()))
    }

    async fn record_attempt(
        &self,
        id: Uuid,
        matched: bool,
    ) -> Result<Option<OtpRecord>, CoreError> {
        match self.rows.get_mut(&id) {
            Some(mut entry) => {
                entry.attempts += 1;
                if matched && entry.verified_at.is_none() {
                    entry.verified_at = Some(Utc::now());
                }
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_expired(&self) -> Result<u64, CoreError> {
        let before = self.rows.len();
        self.rows
            .retain(|_, row| !(row.is_expired() && !row.is_verified()));
        Ok((before - self.rows.len()) as u64)
    }
}

/// In-memory role directory for tests and local wiring.
#[derive(Default)]
pub struct InMemoryRoleDirectory {
    user_roles: DashMap<Uuid, Vec<Uuid>>,
    role_grants: DashMap<Uuid, PermissionSet>,
}

impl InMemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, role_id: Uuid, permissions: PermissionSet) {
        self.role_grants.insert(role_id, permissions);
    }

    pub fn assign(&self, user_id: Uuid, role_id: Uuid) {
        self.user_roles.entry(user_id).or_default().push(role_id);
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleDirectory {
    async fn permissions_for_user(&self, user_id: Uuid) -> Result<PermissionSet, CoreError> {
        let mut effective = PermissionSet::new();
        if let Some(roles) = self.user_roles.get(&user_id) {
            for role_id in roles.iter() {
                if let Some(grants) = self.role_grants.get(role_id) {
                    for permission in grants.iter() {
                        effective.insert(permission);
                    }
                }
            }
        }
        Ok(effective)
    }
}
