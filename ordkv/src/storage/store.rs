//! The in-memory ordered store: a `BTreeMap` from key to `Entry`.
//!
//! A `BTreeMap` keeps its keys in strictly ascending byte order by
//! construction, so no separate ordered key sequence is maintained
//! alongside it — the substitution spec.md's design notes explicitly allow.
//! Expiry is lazy: entries whose `expires_at` has passed stay in the map
//! until a read path (`get`, `range`, `remaining_ttl`) or an explicit
//! mutation (`set`, `del`) removes them.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Utc};

/// A value plus its optional absolute expiry instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }
}

/// The result of a TTL query (§4.2.1). Rendered by the engine as
/// `-2`/`-1`/milliseconds respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    NoKey,
    NoTTL,
    Millis(u64),
}

/// The ordered, TTL-aware in-memory store.
#[derive(Default)]
pub struct Store {
    entries: BTreeMap<String, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Returns the value for `key` iff it exists and is not expired as of
    /// `now`. A lazily-expired entry is removed as a side effect, matching
    /// "observed at read time" in spec.md §3/§4.2 — once a read has noticed
    /// expiry there is no reason to keep checking it on every future read.
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<&str> {
        if self.evict_if_expired(key, now) {
            return None;
        }
        self.entries.get(key).map(|e| e.value.as_str())
    }

    /// Upserts `key`. Maintains S1/S2 via `BTreeMap::insert`; overwriting
    /// preserves the key's logical position since a `BTreeMap` has no
    /// separate positional index to disturb.
    pub fn set(&mut self, key: &str, value: String, expires_at: Option<DateTime<Utc>>) {
        self.entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Removes `key` regardless of expiry, returning whether it was present
    /// beforehand (ignoring expiry, per §4.2).
    pub fn del(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Attaches or replaces expiry on an existing key. No-op if the key is
    /// absent. Returns whether the key existed.
    pub fn set_expiry(&mut self, key: &str, expires_at: Option<DateTime<Utc>>) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// TTL semantics per §4.2.1.
    pub fn remaining_ttl(&mut self, key: &str, now: DateTime<Utc>) -> Ttl {
        if self.evict_if_expired(key, now) {
            return Ttl::NoKey;
        }
        match self.entries.get(key) {
            None => Ttl::NoKey,
            Some(Entry { expires_at: None, .. }) => Ttl::NoTTL,
            Some(Entry { expires_at: Some(t), .. }) => {
                let remaining = (*t - now).num_milliseconds();
                Ttl::Millis(remaining.max(0) as u64)
            }
        }
    }

    /// Keys `k` with `start <= k <= end` (both bounds inclusive, either may
    /// be unbounded), skipping any that are currently expired. Expired
    /// entries encountered during a range scan are not evicted here — doing
    /// so while iterating a borrowed range would require a second pass
    /// anyway, and the next direct read of that key will evict it then.
    pub fn range(&self, start: Bound<&str>, end: Bound<&str>, now: DateTime<Utc>) -> Vec<String> {
        self.entries
            .range::<str, _>((start, end))
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Returns the raw value for `key`, ignoring its own expiry entirely.
    /// Used when a transaction overlay (an `Expire`/`Persist` op) already
    /// dictates the effective TTL, so the Store's own `expires_at` is
    /// irrelevant to the read.
    pub fn peek(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_if_expired(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let expired = matches!(self.entries.get(key), Some(e) if e.is_expired(now));
        if expired {
            self.entries.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        // A fixed instant so tests are deterministic; chrono::Utc::now() is
        // avoided in unit tests to keep timing assertions exact.
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn point_ops() {
        let mut s = Store::new();
        let t = now();

        assert_eq!(s.get("a", t), None);
        s.set("a", "1".into(), None);
        assert_eq!(s.get("a", t), Some("1"));

        s.set("a", "2".into(), None);
        assert_eq!(s.get("a", t), Some("2"));

        assert!(s.del("a"));
        assert_eq!(s.get("a", t), None);
        assert!(!s.del("a"));
    }

    #[test]
    fn expiry_is_lazy_and_read_time() {
        let mut s = Store::new();
        let t = now();
        s.set("a", "1".into(), Some(t + Duration::milliseconds(50)));

        assert_eq!(s.get("a", t), Some("1"));
        assert_eq!(s.remaining_ttl("a", t), Ttl::Millis(50));

        let later = t + Duration::milliseconds(100);
        assert_eq!(s.get("a", later), None);
        assert_eq!(s.remaining_ttl("a", later), Ttl::NoKey);
    }

    #[test]
    fn set_expiry_and_persist() {
        let mut s = Store::new();
        let t = now();
        s.set("a", "1".into(), None);
        assert_eq!(s.remaining_ttl("a", t), Ttl::NoTTL);

        assert!(s.set_expiry("a", Some(t + Duration::seconds(1))));
        assert_eq!(s.remaining_ttl("a", t), Ttl::Millis(1000));

        assert!(s.set_expiry("a", None));
        assert_eq!(s.remaining_ttl("a", t), Ttl::NoTTL);

        assert!(!s.set_expiry("missing", None));
    }

    #[test]
    fn range_inclusive_both_ends_and_expiry_aware() {
        let mut s = Store::new();
        let t = now();
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
            s.set(k, v.into(), None);
        }
        s.set("e", "5".into(), Some(t - Duration::seconds(1)));

        assert_eq!(
            s.range(Bound::Included("b"), Bound::Included("c"), t),
            vec!["b".to_string(), "c".to_string()]
        );
        assert_eq!(
            s.range(Bound::Unbounded, Bound::Unbounded, t),
            vec!["a", "b", "c", "d"].into_iter().map(String::from).collect::<Vec<_>>()
        );
    }
}
