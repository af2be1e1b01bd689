//! Bounded, TTL-aware profile cache keyed by the raw access token.
//!
//! An LRU map behind a `Mutex`; entries carry their own deadline and are
//! dropped lazily when read after it. The bound is small (10 by default), so a
//! single lock is sufficient for concurrent request coroutines.

use crate::profile::{unix_now, Profile};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default entry time-to-live
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
/// Default maximum number of cached profiles
pub const DEFAULT_MAX_ENTRIES: usize = 10;

/// Cache statistics for observability and tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing, or only an expired entry
    pub misses: u64,
    /// Entries dropped to make room for a new token
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CacheEntry {
    profile: Profile,
    deadline: Instant,
}

/// Token → profile cache with per-entry expiry and LRU eviction.
pub struct ProfileCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl ProfileCache {
    /// Create a cache holding at most `max_entries` profiles for `ttl` each.
    ///
    /// A `max_entries` of zero is treated as one.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Configured time-to-live
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live profile for `token`.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<Profile> {
        self.get_at(token, Instant::now())
    }

    /// Insert or replace the profile for `token`, restarting its TTL.
    pub fn set(&self, token: &str, profile: Profile) {
        self.set_at(token, profile, Instant::now());
    }

    pub(crate) fn get_at(&self, token: &str, now: Instant) -> Option<Profile> {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("profile cache lock poisoned, treating lookup as a miss");
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let lookup = entries
            .get(token)
            .map(|entry| (now < entry.deadline).then(|| entry.profile.clone()));
        let live = match lookup {
            Some(Some(profile)) => Some(profile),
            Some(None) => {
                entries.pop(token);
                debug!("profile cache entry expired");
                None
            }
            None => None,
        };

        if live.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        live
    }

    pub(crate) fn set_at(&self, token: &str, profile: Profile, now: Instant) {
        // An entry never outlives the token it describes.
        let lifetime = match profile.remaining_lifetime(unix_now()) {
            Some(left) if left.is_zero() => {
                debug!("profile already expired, not caching");
                return;
            }
            Some(left) => left.min(self.ttl),
            None => self.ttl,
        };

        let Ok(mut entries) = self.entries.lock() else {
            warn!("profile cache lock poisoned, skipping insert");
            return;
        };

        let Some(deadline) = now.checked_add(lifetime) else {
            warn!(ttl_secs = lifetime.as_secs(), "cache deadline out of range, not caching");
            return;
        };
        let will_evict = !entries.contains(token) && entries.len() >= entries.cap().get();
        entries.put(token.to_string(), CacheEntry { profile, deadline });
        if will_evict {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of entries currently held (including not yet swept expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (size, capacity) = self
            .entries
            .lock()
            .map(|e| (e.len(), e.cap().get()))
            .unwrap_or((0, 0));
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn profile(sub: &str) -> Profile {
        Profile {
            active: true,
            subject: Some(sub.to_string()),
            ..Profile::default()
        }
    }

    #[test]
    fn test_unrepresentable_deadline_is_not_cached() {
        let cache = ProfileCache::new(Duration::from_secs(u64::MAX), 10);
        cache.set("tok", profile("u1"));
        assert!(cache.is_empty());
        assert_eq!(cache.get("tok"), None);
    }

    #[test]
    fn test_get_returns_what_was_set() {
        let cache = ProfileCache::default();
        assert_eq!(cache.get("t1"), None);
        cache.set("t1", profile("u1"));
        assert_eq!(cache.get("t1"), Some(profile("u1")));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ProfileCache::new(Duration::from_secs(600), 10);
        let t = Instant::now();
        cache.set_at("tok", profile("u1"), t);
        assert!(cache
            .get_at("tok", t + Duration::from_secs(599))
            .is_some());
        assert!(cache
            .get_at("tok", t + Duration::from_secs(601))
            .is_none());
        // Lazily swept on the expired read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_resets_ttl_clock() {
        let cache = ProfileCache::new(Duration::from_secs(600), 10);
        let t = Instant::now();
        cache.set_at("tok", profile("u1"), t);
        cache.set_at("tok", profile("u2"), t + Duration::from_secs(500));
        let got = cache.get_at("tok", t + Duration::from_secs(1000));
        assert_eq!(got, Some(profile("u2")));
    }

    #[test]
    fn test_eleventh_insert_evicts_least_recently_used() {
        let cache = ProfileCache::new(DEFAULT_TTL, 10);
        for i in 0..10 {
            cache.set(&format!("tok{i}"), profile(&format!("u{i}")));
        }
        // Touch tok0 so tok1 becomes the LRU entry
        assert!(cache.get("tok0").is_some());

        cache.set("tok10", profile("u10"));

        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("tok1").is_none());
        assert!(cache.get("tok0").is_some());
        assert!(cache.get("tok10").is_some());
    }

    #[test]
    fn test_overwrite_does_not_count_as_eviction() {
        let cache = ProfileCache::new(DEFAULT_TTL, 2);
        cache.set("a", profile("1"));
        cache.set("b", profile("2"));
        cache.set("a", profile("3"));
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entry_capped_by_token_expiry() {
        let cache = ProfileCache::new(Duration::from_secs(600), 10);
        let t = Instant::now();
        let mut p = profile("u1");
        p.expires_at = Some(unix_now() + 60);
        cache.set_at("tok", p, t);
        assert!(cache.get_at("tok", t + Duration::from_secs(30)).is_some());
        assert!(cache.get_at("tok", t + Duration::from_secs(120)).is_none());
    }

    #[test]
    fn test_expired_profile_is_not_cached() {
        let cache = ProfileCache::default();
        let mut p = profile("u1");
        p.expires_at = Some(unix_now() - 1);
        cache.set("tok", p);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access_respects_bound() {
        let cache = Arc::new(ProfileCache::new(DEFAULT_TTL, 10));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("t{t}-{}", i % 25);
                        cache.set(&key, profile(&key));
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 10);
        assert_eq!(cache.stats().capacity, 10);
    }
}
