use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use valuation_core::FinancialSnapshot;

/// When a cached snapshot stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Entries live until explicitly invalidated (user-requested refresh).
    ManualRefresh,
    /// Entries older than the TTL are evicted on read.
    Ttl(Duration),
}

struct CacheEntry {
    snapshot: FinancialSnapshot,
    cached_at: DateTime<Utc>,
}

/// Normalized snapshots keyed by uppercase ticker.
///
/// Passed explicitly to whoever needs it; there is no process-wide cache.
pub struct SnapshotCache {
    entries: DashMap<String, CacheEntry>,
    policy: CachePolicy,
}

impl SnapshotCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
        }
    }

    pub fn manual() -> Self {
        Self::new(CachePolicy::ManualRefresh)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(CachePolicy::Ttl(ttl))
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn get(&self, ticker: &str) -> Option<FinancialSnapshot> {
        let key = ticker.trim().to_uppercase();
        if let Some(entry) = self.entries.get(&key) {
            if !self.is_expired(entry.cached_at) {
                return Some(entry.snapshot.clone());
            }
        } else {
            return None;
        }

        // Re-checked under the write lock so a concurrent refresh survives
        if self
            .entries
            .remove_if(&key, |_, entry| self.is_expired(entry.cached_at))
            .is_some()
        {
            tracing::debug!("Snapshot cache entry for {} expired", key);
        }
        None
    }

    pub fn insert(&self, snapshot: FinancialSnapshot) {
        self.entries.insert(
            snapshot.ticker.clone(),
            CacheEntry {
                snapshot,
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop one ticker so the next request re-fetches it. Returns whether it was cached.
    pub fn invalidate(&self, ticker: &str) -> bool {
        self.entries.remove(&ticker.trim().to_uppercase()).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
        match self.policy {
            CachePolicy::ManualRefresh => false,
            CachePolicy::Ttl(ttl) => {
                let age = (Utc::now() - cached_at).to_std().unwrap_or(Duration::ZERO);
                age >= ttl
            }
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::manual()
    }
}
