//! Keyed value cache with explicit time-to-live
//!
//! Entries are replaced wholesale, never patched. Staleness is decided from the
//! `now` handed in by the caller so expiry is deterministic under test.

use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::series::Timestamp;
use chrono::Duration;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

/// How long an entry stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Valid while `now - produced_at` is below the duration
    For(Duration),
    /// Valid until the session is reset
    Session,
}

impl Ttl {
    pub fn hours(h: i64) -> Self {
        Self::For(Duration::hours(h))
    }
}

/// A cached value with the time it was produced
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub produced_at: Timestamp,
    pub ttl: Ttl,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, produced_at: Timestamp, ttl: Ttl) -> Self {
        Self {
            value,
            produced_at,
            ttl,
        }
    }

    /// Valid iff `now - produced_at < ttl`
    pub fn is_valid(&self, now: Timestamp) -> bool {
        match self.ttl {
            Ttl::Session => true,
            Ttl::For(ttl) => now - self.produced_at < ttl,
        }
    }
}

/// Where a looked-up value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Served from a valid entry without fetching
    Cached,
    /// Fetched during this lookup
    Fetched,
    /// Fetch failed, last known value served past its TTL
    Stale,
}

/// Result of a cache lookup
#[derive(Debug, Clone, Serialize)]
pub struct Lookup<T> {
    pub value: T,
    pub produced_at: Timestamp,
    pub freshness: Freshness,
}

impl<T> Lookup<T> {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

/// In-memory cache keyed by `K`
pub struct CacheStore<K, V> {
    name: &'static str,
    entries: HashMap<K, CacheEntry<V>>,
    logger: StructuredLogger,
}

impl<K, V> std::fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    /// Create an empty cache; `name` shows up in log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            logger: get_logger_with_context(
                LogContext::new("cache").with_field("cache", name.to_string()),
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Valid entry for `key`, never fetches
    pub fn peek(&self, key: &K, now: Timestamp) -> Option<&CacheEntry<V>> {
        self.entries.get(key).filter(|e| e.is_valid(now))
    }

    /// Entry for `key` regardless of expiry
    pub fn last_known(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Store a value, replacing any previous entry
    pub fn insert(&mut self, key: K, value: V, ttl: Ttl, now: Timestamp) {
        self.entries.insert(key, CacheEntry::new(value, now, ttl));
    }

    /// Return the valid entry for `key` or run `fetch` and store its result.
    ///
    /// When `fetch` fails and an expired entry exists, that last known value
    /// is returned as [`Freshness::Stale`]; otherwise the error propagates and
    /// the store is left untouched.
    pub async fn get_or_fetch<F, Fut>(
        &mut self,
        key: K,
        ttl: Ttl,
        now: Timestamp,
        fetch: F,
    ) -> Result<Lookup<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(entry) = self.peek(&key, now) {
            self.logger.trace(&format!("hit for {}", key));
            return Ok(Lookup {
                value: entry.value.clone(),
                produced_at: entry.produced_at,
                freshness: Freshness::Cached,
            });
        }

        self.logger.debug(&format!("miss for {}, fetching", key));
        match fetch().await {
            Ok(value) => {
                self.insert(key, value.clone(), ttl, now);
                Ok(Lookup {
                    value,
                    produced_at: now,
                    freshness: Freshness::Fetched,
                })
            }
            Err(err) => match self.entries.get(&key) {
                Some(entry) => {
                    self.logger.warn(&format!(
                        "refresh of {} failed, serving value from {}: {}",
                        key, entry.produced_at, err
                    ));
                    Ok(Lookup {
                        value: entry.value.clone(),
                        produced_at: entry.produced_at,
                        freshness: Freshness::Stale,
                    })
                }
                None => Err(err),
            },
        }
    }

    /// Drop the entry for `key`
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keep only entries whose key satisfies `keep`; returns how many were dropped
    pub fn retain_keys<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|k, _| keep(k));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            self.logger.debug(&format!("evicted {} entries", dropped));
        }
        dropped
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
