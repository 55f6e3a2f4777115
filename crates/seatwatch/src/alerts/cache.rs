//! Per-user state of the alert flow: resolved users and alert lists, both
//! expiring after a TTL, plus the locks that serialize user creation.

use crate::api::{Alert, User};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Cache key for an email address. Only the digest is kept so addresses never
/// end up in logs.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct UserKey(String);

impl UserKey {
    /// The email is hashed as given; callers normalize it first.
    pub fn from_email(email: &str) -> Self {
        let digest = format!("{:x}", Sha256::digest(email.as_bytes()));
        Self(digest[..32].to_string())
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}...", &self.0[..8])
    }
}

struct Stamped<V> {
    value: V,
    stored_at: Instant,
}

/// Values per user that are dropped once older than the TTL.
pub struct UserCache<V> {
    entries: DashMap<UserKey, Stamped<V>>,
    ttl: Duration,
}

impl<V: Clone> UserCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &UserKey) -> Option<V> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    /// Stores `value` and sweeps out every expired entry.
    pub fn insert(&self, key: UserKey, value: V) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.stored_at.elapsed() < ttl);
        self.entries.insert(
            key,
            Stamped {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &UserKey) {
        self.entries.remove(key);
    }
}

impl UserCache<Vec<Alert>> {
    /// Drops whichever cached list contains `alert_id`.
    pub fn invalidate_alert(&self, alert_id: i64) {
        self.entries
            .retain(|_, entry| !entry.value.iter().any(|a| a.id == alert_id));
    }
}

/// Shared state of an [`AlertService`](super::AlertService).
pub struct AlertCacheState {
    pub alerts: UserCache<Vec<Alert>>,
    /// Users looked up or created recently. A retry after a failed
    /// alert-create reuses the user instead of creating another one.
    pub users: UserCache<User>,
    user_locks: DashMap<UserKey, Arc<Mutex<()>>>,
}

impl AlertCacheState {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            alerts: UserCache::new(ttl),
            users: UserCache::new(ttl),
            user_locks: DashMap::new(),
        }
    }

    /// Lock held while a user is looked up or created, so two submissions for
    /// the same email cannot both create it.
    pub fn user_lock(&self, key: &UserKey) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forgets the lock of `key` once nobody holds or waits on it. Takes the
    /// caller's handle so it is counted out.
    pub fn release_user_lock(&self, key: &UserKey, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.user_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: i64) -> Alert {
        Alert {
            id,
            user_id: 1,
            course_id: 10,
            notification_interval_minutes: 30,
            last_notification_sent: None,
            is_active: Some(true),
            created_at: None,
        }
    }

    fn user(id: i64) -> User {
        User {
            id,
            email: "student@bracu.ac.bd".to_string(),
            full_name: None,
        }
    }

    #[test]
    fn test_user_key_hides_email() {
        let key = UserKey::from_email("student@bracu.ac.bd");

        assert_eq!(key, UserKey::from_email("student@bracu.ac.bd"));
        assert_ne!(key, UserKey::from_email(" student@bracu.ac.bd"));
        assert_eq!(key.0.len(), 32);
        assert!(!key.to_string().contains('@'));
        assert!(key.to_string().ends_with("..."));
    }

    #[test]
    fn test_expired_entries_are_swept() {
        let users = UserCache::new(Duration::ZERO);
        users.insert(UserKey::from_email("a@b.co"), user(1));
        users.insert(UserKey::from_email("c@d.co"), user(2));

        assert_eq!(users.entries.len(), 1);
        assert!(users.get(&UserKey::from_email("c@d.co")).is_none());
        assert!(users.entries.is_empty());
    }

    #[test]
    fn test_fresh_entries_are_served() {
        let users = UserCache::new(Duration::from_secs(60));
        let key = UserKey::from_email("a@b.co");
        users.insert(key.clone(), user(1));

        assert_eq!(users.get(&key).map(|u| u.id), Some(1));
        users.invalidate(&key);
        assert!(users.get(&key).is_none());
    }

    #[test]
    fn test_invalidate_by_alert_id() {
        let alerts = UserCache::new(Duration::from_secs(60));
        let owner = UserKey::from_email("a@b.co");
        let other = UserKey::from_email("c@d.co");
        alerts.insert(owner.clone(), vec![alert(1), alert(2)]);
        alerts.insert(other.clone(), vec![alert(3)]);

        alerts.invalidate_alert(2);
        assert!(alerts.get(&owner).is_none());
        assert!(alerts.get(&other).is_some());
    }

    #[test]
    fn test_user_lock_is_shared_then_released() {
        let state = AlertCacheState::with_ttl(Duration::from_secs(60));
        let key = UserKey::from_email("a@b.co");
        let first = state.user_lock(&key);
        let second = state.user_lock(&key);
        assert!(Arc::ptr_eq(&first, &second));

        state.release_user_lock(&key, first);
        assert_eq!(state.user_locks.len(), 1, "still held by the second caller");

        state.release_user_lock(&key, second);
        assert_eq!(state.user_locks.len(), 0);
    }
}
