//! Short-lived cache of decrypted credentials.
//!
//! Each `CredentialStore` owns one `CredentialCache`.  Entries carry their
//! own expiry; an expired entry reads as a miss and stays until it is
//! overwritten or invalidated (no background sweep).
//!
//! The cache also keeps a single epoch counter, bumped by every
//! `invalidate` and `clear`.  A reader that fetched from the backend only
//! caches its result if the epoch it observed before the fetch is still
//! current, so a fetch that raced with a write can never repopulate a stale
//! value.  A write to an unrelated name costs at most one skipped fill.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::credential::Credential;

/// Default time-to-live for cached credentials.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry {
    credential: Credential,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    epoch: u64,
}

/// TTL cache guarded by a reader/writer lock.
#[derive(Default)]
pub struct CredentialCache {
    inner: RwLock<Inner>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached credential if present and not expired.
    pub fn get(&self, name: &str) -> Option<Credential> {
        let inner = self.inner.read();
        inner
            .entries
            .get(name)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.credential.clone())
    }

    /// Insert or replace an entry unconditionally.
    pub fn put(&self, name: &str, credential: Credential, ttl: Duration) {
        let mut inner = self.inner.write();
        inner.entries.insert(
            name.to_string(),
            Entry {
                credential,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Current epoch; take this before fetching.
    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    /// Insert only if no invalidation happened since `epoch` was read.
    ///
    /// Returns `true` if the entry was stored.
    pub fn put_if_current(
        &self,
        name: &str,
        epoch: u64,
        credential: Credential,
        ttl: Duration,
    ) -> bool {
        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            return false;
        }
        inner.entries.insert(
            name.to_string(),
            Entry {
                credential,
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    /// Drop the entry for `name` and bump the epoch.
    ///
    /// Safe to call when nothing is cached.
    pub fn invalidate(&self, name: &str) {
        let mut inner = self.inner.write();
        inner.entries.remove(name);
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
