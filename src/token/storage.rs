//! Token Storage
//!
//! Keyed storage of refresh token records plus a family index.
//!
//! The store is pure bookkeeping. The two mutations that must be atomic with
//! respect to concurrent use of the same token (`mark_rotated` and
//! `record_use`) are compare-and-set operations: they only apply while the
//! record is still `Active` and unexpired, and report a [`StoreConflict`]
//! otherwise.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::{TokenRecord, TokenState};

/// Why a compare-and-set store operation did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreConflict {
    /// No record for the token.
    Missing,
    /// Record exists but is no longer active.
    NotActive(TokenState),
    /// Record is active but expired before the update applied.
    Expired { expires_at: DateTime<Utc> },
    /// Record is active but its reuse allowance is spent.
    ReuseLimit { uses: u32 },
}

/// Bounds checked by [`TokenStore::record_use`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReuseAllowance {
    /// Total uses allowed.
    pub max_uses: u32,
    /// Every use must happen no later than this.
    pub window_ends_at: DateTime<Utc>,
}

/// Token store interface.
pub trait TokenStore: Send + Sync {
    /// Get a copy of a record.
    fn get(&self, token_id: &str) -> Option<TokenRecord>;

    /// True if the token is absent or revoked.
    fn is_revoked(&self, token_id: &str) -> bool {
        self.get(token_id)
            .map_or(true, |record| record.state == TokenState::Revoked)
    }

    /// Insert a record, indexing it under its family.
    fn insert(&self, record: TokenRecord);

    /// Atomically move an active, unexpired token to `Rotated` and insert its child.
    fn mark_rotated(
        &self,
        token_id: &str,
        child: TokenRecord,
        now: DateTime<Utc>,
    ) -> Result<(), StoreConflict>;

    /// Atomically count one use of an active, unexpired token; returns the new count.
    fn record_use(
        &self,
        token_id: &str,
        allowance: ReuseAllowance,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreConflict>;

    /// Revoke a single token. Returns false if it was missing or already revoked.
    fn mark_revoked(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> bool;

    /// Revoke every member of a family. Returns how many changed state.
    fn revoke_family(&self, family: &str, reason: &str, at: DateTime<Utc>) -> usize;

    /// Current members of a family.
    fn family_members(&self, family: &str) -> Vec<String>;

    /// Number of stored records.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record with `expires_at < now`, whatever its state.
    fn evict_expired(&self, now: DateTime<Utc>) -> usize;

    /// Remove everything. Returns how many records were dropped.
    fn destroy_all(&self) -> usize;
}

#[derive(Default)]
struct StoreState {
    records: HashMap<String, TokenRecord>,
    families: HashMap<String, HashSet<String>>,
}

impl StoreState {
    fn index(&mut self, record: &TokenRecord) {
        if let Some(family) = &record.family {
            self.families
                .entry(family.clone())
                .or_default()
                .insert(record.token_id.clone());
        }
    }

    fn unindex(&mut self, record: &TokenRecord) {
        if let Some(family) = &record.family {
            if let Some(members) = self.families.get_mut(family) {
                members.remove(&record.token_id);
                if members.is_empty() {
                    self.families.remove(family);
                }
            }
        }
    }

    fn usable_mut(
        &mut self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<&mut TokenRecord, StoreConflict> {
        let record = self
            .records
            .get_mut(token_id)
            .ok_or(StoreConflict::Missing)?;
        match record.state {
            TokenState::Active if record.is_expired_at(now) => Err(StoreConflict::Expired {
                expires_at: record.expires_at,
            }),
            TokenState::Active => Ok(record),
            state => Err(StoreConflict::NotActive(state)),
        }
    }
}

fn revoke_record(record: &mut TokenRecord, reason: &str, at: DateTime<Utc>) -> bool {
    if !record.state.can_transition_to(TokenState::Revoked) {
        return false;
    }
    record.state = TokenState::Revoked;
    record.revoked_at = Some(at);
    record.revoked_reason = Some(reason.to_string());
    true
}

/// In-memory token store.
///
/// A single lock guards records and the family index together, so a family
/// cascade is never observed half-applied.
#[derive(Default)]
pub struct InMemoryTokenStore {
    state: RwLock<StoreState>,
}

impl InMemoryTokenStore {
    /// Create new in-memory token store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, token_id: &str) -> Option<TokenRecord> {
        self.read().records.get(token_id).cloned()
    }

    fn is_revoked(&self, token_id: &str) -> bool {
        self.read()
            .records
            .get(token_id)
            .map_or(true, |record| record.state == TokenState::Revoked)
    }

    fn insert(&self, record: TokenRecord) {
        let mut state = self.write();
        if let Some(previous) = state.records.remove(&record.token_id) {
            state.unindex(&previous);
        }
        state.index(&record);
        state.records.insert(record.token_id.clone(), record);
    }

    fn mark_rotated(
        &self,
        token_id: &str,
        child: TokenRecord,
        now: DateTime<Utc>,
    ) -> Result<(), StoreConflict> {
        let mut state = self.write();
        let parent = state.usable_mut(token_id, now)?;
        parent.state = TokenState::Rotated;
        parent.child = Some(child.token_id.clone());

        state.index(&child);
        state.records.insert(child.token_id.clone(), child);
        Ok(())
    }

    fn record_use(
        &self,
        token_id: &str,
        allowance: ReuseAllowance,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreConflict> {
        let mut state = self.write();
        let record = state.usable_mut(token_id, now)?;

        let uses = record.reuse_count;
        if uses >= allowance.max_uses || now > allowance.window_ends_at {
            return Err(StoreConflict::ReuseLimit { uses });
        }

        record.reuse_count = uses + 1;
        record.last_used_at = Some(now);
        Ok(record.reuse_count)
    }

    fn mark_revoked(&self, token_id: &str, reason: &str, at: DateTime<Utc>) -> bool {
        self.write()
            .records
            .get_mut(token_id)
            .map_or(false, |record| revoke_record(record, reason, at))
    }

    fn revoke_family(&self, family: &str, reason: &str, at: DateTime<Utc>) -> usize {
        let mut state = self.write();
        let StoreState { records, families } = &mut *state;

        let Some(members) = families.get(family) else {
            return 0;
        };

        let mut revoked = 0;
        for token_id in members {
            if let Some(record) = records.get_mut(token_id) {
                if revoke_record(record, reason, at) {
                    revoked += 1;
                }
            }
        }
        revoked
    }

    fn family_members(&self, family: &str) -> Vec<String> {
        self.read()
            .families
            .get(family)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.read().records.len()
    }

    fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.write();
        let expired: Vec<TokenRecord> = state
            .records
            .values()
            .filter(|record| record.expires_at < now)
            .cloned()
            .collect();

        for record in &expired {
            state.records.remove(&record.token_id);
            state.unindex(record);
        }

        expired.len()
    }

    fn destroy_all(&self) -> usize {
        let mut state = self.write();
        let count = state.records.len();
        state.records.clear();
        state.families.clear();
        count
    }
}

/// Create in-memory token store.
pub fn create_in_memory_token_store() -> InMemoryTokenStore {
    InMemoryTokenStore::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn record(token_id: &str, family: Option<&str>, ttl_secs: i64) -> TokenRecord {
        let now = Utc::now();
        TokenRecord {
            token_id: token_id.to_string(),
            user_id: "user-1".to_string(),
            client_id: "client-1".to_string(),
            scopes: BTreeSet::new(),
            family: family.map(String::from),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            state: TokenState::Active,
            parent: None,
            child: None,
            reuse_count: 0,
            last_used_at: None,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    fn allowance(max_uses: u32) -> ReuseAllowance {
        ReuseAllowance {
            max_uses,
            window_ends_at: Utc::now() + Duration::seconds(60),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", Some("f"), 60));

        assert_eq!(store.get("a").unwrap().user_id, "user-1");
        assert_eq!(store.family_members("f"), vec!["a".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_is_revoked() {
        let store = InMemoryTokenStore::new();
        assert!(store.is_revoked("missing"));

        store.insert(record("a", None, 60));
        assert!(!store.is_revoked("a"));
    }

    #[test]
    fn test_mark_rotated_is_compare_and_set() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", Some("f"), 60));

        let mut child = record("b", Some("f"), 60);
        child.parent = Some("a".to_string());
        store.mark_rotated("a", child, Utc::now()).unwrap();

        let parent = store.get("a").unwrap();
        assert_eq!(parent.state, TokenState::Rotated);
        assert_eq!(parent.child.as_deref(), Some("b"));
        assert!(store.get("b").unwrap().is_active());
        assert_eq!(store.family_members("f").len(), 2);

        let again = store.mark_rotated("a", record("c", Some("f"), 60), Utc::now());
        assert_eq!(again, Err(StoreConflict::NotActive(TokenState::Rotated)));
        assert!(store.get("c").is_none());

        let missing = store.mark_rotated("zzz", record("d", None, 60), Utc::now());
        assert_eq!(missing, Err(StoreConflict::Missing));
    }

    #[test]
    fn test_record_use_limits() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", None, 60));

        assert_eq!(store.record_use("a", allowance(2), Utc::now()), Ok(1));
        assert_eq!(store.record_use("a", allowance(2), Utc::now()), Ok(2));
        assert_eq!(
            store.record_use("a", allowance(2), Utc::now()),
            Err(StoreConflict::ReuseLimit { uses: 2 })
        );
        // Failed use leaves the record untouched.
        assert_eq!(store.get("a").unwrap().reuse_count, 2);
        assert!(store.get("a").unwrap().is_active());
    }

    #[test]
    fn test_record_use_window() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", None, 600));

        let window_ends_at = Utc::now();
        let allowance = ReuseAllowance {
            max_uses: 5,
            window_ends_at,
        };

        assert_eq!(store.record_use("a", allowance, window_ends_at), Ok(1));
        assert_eq!(
            store.record_use("a", allowance, window_ends_at + Duration::seconds(1)),
            Err(StoreConflict::ReuseLimit { uses: 1 })
        );
    }

    #[test]
    fn test_record_use_first_use_after_window() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", None, 600));

        let closed = ReuseAllowance {
            max_uses: 5,
            window_ends_at: Utc::now() - Duration::seconds(1),
        };

        assert_eq!(
            store.record_use("a", closed, Utc::now()),
            Err(StoreConflict::ReuseLimit { uses: 0 })
        );
        assert_eq!(store.get("a").unwrap().reuse_count, 0);
    }

    #[test]
    fn test_compare_and_set_rejects_expired() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", Some("f"), 60));
        let expires_at = store.get("a").unwrap().expires_at;
        let later = expires_at + Duration::seconds(1);

        assert_eq!(
            store.record_use("a", allowance(5), later),
            Err(StoreConflict::Expired { expires_at })
        );
        assert_eq!(
            store.mark_rotated("a", record("b", Some("f"), 60), later),
            Err(StoreConflict::Expired { expires_at })
        );
        assert!(store.get("a").unwrap().is_active());
        assert!(store.get("b").is_none());

        // Expiry is exclusive: the final instant is still usable.
        assert_eq!(store.record_use("a", allowance(5), expires_at), Ok(1));
    }

    #[test]
    fn test_mark_revoked_idempotent() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", None, 60));

        assert!(store.mark_revoked("a", "logout", Utc::now()));
        assert!(!store.mark_revoked("a", "again", Utc::now()));
        assert!(!store.mark_revoked("missing", "logout", Utc::now()));

        let revoked = store.get("a").unwrap();
        assert_eq!(revoked.revoked_reason.as_deref(), Some("logout"));
        assert!(store.is_revoked("a"));
    }

    #[test]
    fn test_revoke_family() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", Some("f"), 60));
        store.insert(record("b", Some("f"), 60));
        store.insert(record("c", Some("g"), 60));
        store.mark_revoked("b", "logout", Utc::now());

        assert_eq!(store.revoke_family("f", "breach", Utc::now()), 1);
        assert!(store.is_revoked("a"));
        assert!(store.is_revoked("b"));
        assert!(!store.is_revoked("c"));
        // Earlier reason is preserved.
        assert_eq!(store.get("b").unwrap().revoked_reason.as_deref(), Some("logout"));

        assert_eq!(store.revoke_family("unknown", "breach", Utc::now()), 0);
    }

    #[test]
    fn test_evict_expired_ignores_state() {
        let store = InMemoryTokenStore::new();
        store.insert(record("old-active", Some("f"), -10));
        store.insert(record("old-revoked", Some("f"), -10));
        store.insert(record("fresh", Some("f"), 60));
        store.mark_revoked("old-revoked", "logout", Utc::now());

        assert_eq!(store.evict_expired(Utc::now()), 2);
        assert!(store.get("old-active").is_none());
        assert!(store.get("old-revoked").is_none());
        assert!(store.get("fresh").is_some());
        assert_eq!(store.family_members("f"), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_destroy_all() {
        let store = InMemoryTokenStore::new();
        store.insert(record("a", Some("f"), 60));
        store.insert(record("b", None, 60));

        assert_eq!(store.destroy_all(), 2);
        assert!(store.is_empty());
        assert!(store.family_members("f").is_empty());
        assert_eq!(store.destroy_all(), 0);
    }
}
