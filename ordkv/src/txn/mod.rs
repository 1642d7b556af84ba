//! The single-transaction overlay (spec.md §4.3).
//!
//! This is deliberately not MVCC: spec.md's Non-goals exclude multiple
//! concurrent transactions and isolation beyond read-your-writes, so there
//! is no version-stamped key space and no active-transaction snapshot set
//! the way the grounding crate's `mvcc` module builds one. What carries over
//! from that module is the vocabulary — begin/commit/abort, a named
//! transaction state — and the discipline of writing down exactly what each
//! read sees while a write is pending, not the mechanism.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A buffered intention, queued against a key until COMMIT or ABORT.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set { value: String },
    Del,
    Expire { expires_at: DateTime<Utc> },
    Persist,
}

/// What a read sees for a key while a transaction is active, before falling
/// through to the Store.
pub enum Overlay<'a> {
    /// No buffered op for this key — consult the Store.
    None,
    /// `Set` was queued: the value is `v`, with no TTL overlay (a fresh Set
    /// always clears expiry).
    Value(&'a str),
    /// `Del` was queued: the key reads as absent.
    Deleted,
    /// `Expire` was queued: the key is present (value comes from the
    /// Store), with `t` as the TTL overlay.
    ExpiryOverride(DateTime<Utc>),
    /// `Persist` was queued: the key is present (value from the Store),
    /// with no TTL.
    PersistOverride,
}

/// The per-transaction buffer: at most one queued op per key, the later one
/// always winning (spec.md §4.3, §9 "TxnBuffer per-key collapse").
#[derive(Default)]
pub struct TxnBuffer {
    ops: HashMap<String, WriteOp>,
}

impl TxnBuffer {
    pub fn new() -> Self {
        Self { ops: HashMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn queue_set(&mut self, key: &str, value: String) {
        self.ops.insert(key.to_string(), WriteOp::Set { value });
    }

    pub fn queue_del(&mut self, key: &str) {
        self.ops.insert(key.to_string(), WriteOp::Del);
    }

    pub fn queue_expire(&mut self, key: &str, expires_at: DateTime<Utc>) {
        self.ops.insert(key.to_string(), WriteOp::Expire { expires_at });
    }

    /// Queues a PERSIST, or mutates an already-queued `Set`/`Expire` in
    /// place to drop its expiry, per spec.md §4.3's "PERSIST composition".
    /// `store_has_expiry` tells us whether the Store itself has an expiry
    /// on this key, for keys with no buffered op yet.
    ///
    /// Returns whether there was an expiry to clear.
    pub fn queue_persist(&mut self, key: &str, store_has_expiry: bool) -> bool {
        match self.ops.get_mut(key) {
            Some(WriteOp::Set { .. }) => false, // a buffered Set already has no TTL
            Some(op @ WriteOp::Expire { .. }) => {
                *op = WriteOp::Persist;
                true
            }
            Some(WriteOp::Persist) => false,
            Some(WriteOp::Del) => false, // deleting then persisting is still a delete
            None => {
                if store_has_expiry {
                    self.ops.insert(key.to_string(), WriteOp::Persist);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Iterates all buffered ops, for overlay-aware range enumeration.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &WriteOp)> {
        self.ops.iter()
    }

    pub fn overlay(&self, key: &str) -> Overlay<'_> {
        match self.ops.get(key) {
            None => Overlay::None,
            Some(WriteOp::Set { value }) => Overlay::Value(value),
            Some(WriteOp::Del) => Overlay::Deleted,
            Some(WriteOp::Expire { expires_at }) => Overlay::ExpiryOverride(*expires_at),
            Some(WriteOp::Persist) => Overlay::PersistOverride,
        }
    }

    /// Drains the buffer for COMMIT. Ops are independent per key (the
    /// buffer already collapsed to one op per key), so the caller may apply
    /// them in any order.
    pub fn drain(&mut self) -> Vec<(String, WriteOp)> {
        self.ops.drain().collect()
    }

    /// Discards the buffer for ABORT.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn later_op_replaces_earlier_for_same_key() {
        let mut b = TxnBuffer::new();
        b.queue_set("a", "1".into());
        b.queue_set("a", "2".into());
        assert!(matches!(b.overlay("a"), Overlay::Value(v) if v == "2"));
        assert_eq!(b.drain().len(), 1);
    }

    #[test]
    fn persist_mutates_queued_expire_in_place() {
        let mut b = TxnBuffer::new();
        b.queue_expire("a", t(100));
        assert!(b.queue_persist("a", false));
        assert!(matches!(b.overlay("a"), Overlay::PersistOverride));
    }

    #[test]
    fn persist_on_queued_set_is_a_noop_and_returns_false() {
        let mut b = TxnBuffer::new();
        b.queue_set("a", "1".into());
        assert!(!b.queue_persist("a", false));
        assert!(matches!(b.overlay("a"), Overlay::Value(v) if v == "1"));
    }

    #[test]
    fn persist_with_no_buffered_op_consults_store_flag() {
        let mut b = TxnBuffer::new();
        assert!(!b.queue_persist("a", false));
        assert!(matches!(b.overlay("a"), Overlay::None));

        assert!(b.queue_persist("b", true));
        assert!(matches!(b.overlay("b"), Overlay::PersistOverride));
    }

    #[test]
    fn two_consecutive_persists_never_both_return_true() {
        let mut b = TxnBuffer::new();
        let first = b.queue_persist("a", true);
        let second = b.queue_persist("a", true);
        assert!(first);
        assert!(!second);
    }
}
