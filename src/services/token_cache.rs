//! In-process bearer token cache.
//!
//! Maps opaque bearer tokens to the identity snapshot taken at login.
//! Entries live for a fixed TTL from their last `store`; reads never extend
//! them. Because the TTL is fixed, insertion order is also expiry order, so a
//! single FIFO queue drives the background sweep and the capacity bound.
//!
//! Time is read from `tokio::time::Instant` so tests can pause and advance it.
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::services::identity::CachedIdentity;

/// Session lifetime used when nothing else is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug)]
struct CacheEntry {
    identity: Arc<CachedIdentity>,
    expires_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    // (seq, token) in insertion order. Items whose seq no longer matches the
    // live entry are stale (token was overwritten or removed) and are skipped.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl Inner {
    fn is_live(&self, seq: u64, token: &str) -> bool {
        self.entries.get(token).is_some_and(|e| e.seq == seq)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut purged = 0;
        while let Some((seq, token)) = self.order.front() {
            match self.entries.get(token.as_str()) {
                Some(entry) if entry.seq == *seq => {
                    if entry.expires_at > now {
                        break;
                    }
                    self.entries.remove(token.as_str());
                    purged += 1;
                }
                _ => {}
            }
            self.order.pop_front();
        }
        purged
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((seq, token)) = self.order.pop_front() {
            if self.is_live(seq, &token) {
                self.entries.remove(&token);
                return true;
            }
        }
        false
    }

    fn compact(&mut self) {
        let order = std::mem::take(&mut self.order);
        self.order = order
            .into_iter()
            .filter(|(seq, token)| self.is_live(*seq, token))
            .collect();
    }
}

/// Time-evicting token → identity store.
///
/// Cheap to clone; all clones share the same map.
#[derive(Clone, Debug)]
pub struct TokenCache {
    inner: Arc<RwLock<Inner>>,
    ttl: Duration,
    capacity: usize,
}

impl TokenCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the entry for `token`, resetting its expiry to now + TTL.
    ///
    /// Expired entries are purged first; if the cache is still full the
    /// oldest live session is evicted to make room.
    pub fn store(&self, token: impl Into<String>, identity: CachedIdentity) {
        let token = token.into();
        let now = Instant::now();
        let mut inner = self.inner.write();

        inner.purge_expired(now);
        if !inner.entries.contains_key(&token) {
            while inner.entries.len() >= self.capacity {
                if !inner.evict_oldest() {
                    break;
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((seq, token.clone()));
        inner.entries.insert(
            token,
            CacheEntry {
                identity: Arc::new(identity),
                expires_at: now + self.ttl,
                seq,
            },
        );

        if inner.order.len() > self.capacity.saturating_mul(2) {
            inner.compact();
        }
    }

    /// Returns the cached identity only while the entry is unexpired.
    ///
    /// An expired entry is dropped on the way out.
    pub fn lookup(&self, token: &str) -> Option<Arc<CachedIdentity>> {
        let now = Instant::now();
        {
            let inner = self.inner.read();
            match inner.entries.get(token) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.identity.clone()),
                Some(_) => {}
            }
        }

        let mut inner = self.inner.write();
        // Re-check: a concurrent store may have refreshed the token meanwhile.
        if inner
            .entries
            .get(token)
            .is_some_and(|entry| now >= entry.expires_at)
        {
            inner.entries.remove(token);
        }
        None
    }

    /// Drop the session for `token`. Returns whether one existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.inner.write().entries.remove(token).is_some()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.write().purge_expired(Instant::now())
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, 100_000)
    }
}
