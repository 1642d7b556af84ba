//! The command dispatcher (spec.md §4.4): parses one line, routes it
//! through the TxnBuffer/Store/Log per §4.4's routing table, and renders a
//! response per §6.1.
//!
//! `Engine` is the one type that owns the Store, the TxnBuffer, and the Log
//! handle for the process lifetime, mirroring the grounding crate's
//! single-owner storage types — the difference is that the grounding
//! crate's `storage::engine::Engine` trait names a pluggable storage
//! *backend*; here "Engine" is spec.md's own name for the command
//! dispatcher sitting above a single, fixed Store+Log pair, so the two
//! don't collide (this crate has no pluggable backend, per spec.md's
//! Non-goals).

use chrono::{DateTime, Duration, Utc};

use crate::error::CResult;
use crate::storage::log::{Log, Record};
use crate::storage::store::{Store, Ttl};
use crate::storage::Status;
use crate::txn::{Overlay, TxnBuffer, WriteOp};

const ERR_WRITE_FAILED: &str = "ERR write failed";

/// What a dispatched command produced: response lines to emit, and whether
/// the session should end after emitting them (EXIT, or an implicit EXIT on
/// EOF at the caller).
pub enum Outcome {
    Continue(Vec<String>),
    Exit(Vec<String>),
}

impl Outcome {
    fn line(s: impl Into<String>) -> Self {
        Outcome::Continue(vec![s.into()])
    }
}

pub struct Engine {
    store: Store,
    log: Log,
    txn: Option<TxnBuffer>,
}

impl Engine {
    /// Opens (or creates) the log at `path` and replays it to reconstruct
    /// the Store. Per spec.md §9's design note, the path is an explicit
    /// constructor argument rather than a hard-coded constant — the CLI
    /// binary is the layer that defaults it to `data.db`.
    pub fn open(path: impl Into<std::path::PathBuf>) -> CResult<Self> {
        let log = Log::open(path)?;
        let mut store = Store::new();
        for record in log.replay()? {
            apply_record(&mut store, record);
        }
        Ok(Self { store, log, txn: None })
    }

    pub fn status(&self) -> CResult<Status> {
        Ok(Status { keys: self.store.len() as u64, log_size: self.log.size_on_disk()? })
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Parses and dispatches one input line (spec.md §6.1). Never returns
    /// `Err` for command-level failures — those are `ERR …` response lines,
    /// per spec.md §7's propagation policy.
    pub fn dispatch(&mut self, line: &str) -> Outcome {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((verb, args)) = parts.split_first() else {
            return Outcome::Continue(vec![]);
        };
        let now = Utc::now();
        let canon = verb.to_ascii_uppercase();

        log::debug!("dispatch {canon}");
        let outcome = match canon.as_str() {
            "SET" => self.cmd_set(args, now),
            "GET" => self.cmd_get(args, now),
            "DEL" => self.cmd_del(args, now),
            "EXISTS" => self.cmd_exists(args, now),
            "MSET" => self.cmd_mset(args),
            "MGET" => self.cmd_mget(args, now),
            "EXPIRE" => self.cmd_expire(args, now),
            "TTL" => self.cmd_ttl(args, now),
            "PERSIST" => self.cmd_persist(args, now),
            "RANGE" => self.cmd_range(args, now),
            "BEGIN" => self.cmd_begin(args),
            "COMMIT" => self.cmd_commit(args),
            "ABORT" => self.cmd_abort(args),
            "EXIT" => {
                if !args.is_empty() {
                    Outcome::line(arity_err("EXIT"))
                } else {
                    self.txn = None;
                    return Outcome::Exit(vec!["OK".to_string()]);
                }
            }
            _ => Outcome::line(format!("ERR unknown command '{verb}'")),
        };

        if let Outcome::Continue(lines) = &outcome {
            if lines.iter().any(|l| l.starts_with("ERR")) {
                log::warn!("{canon} -> {:?}", lines);
            }
        }
        outcome
    }

    fn cmd_set(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key, value] = args else { return Outcome::line(arity_err("SET")) };
        if let Some(txn) = &mut self.txn {
            txn.queue_set(key, value.to_string());
            return Outcome::line("OK");
        }
        self.store.set(key, value.to_string(), None);
        if let Some(err) = self.try_append(&Record::Set { key: key.to_string(), value: value.to_string() }) {
            return Outcome::line(err);
        }
        let _ = now;
        Outcome::line("OK")
    }

    fn cmd_get(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key] = args else { return Outcome::line(arity_err("GET")) };
        Outcome::line(self.read_value(key, now).unwrap_or_else(|| "nil".to_string()))
    }

    fn cmd_del(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key] = args else { return Outcome::line(arity_err("DEL")) };
        let _ = now;
        if let Some(txn) = &mut self.txn {
            // Q1: DEL in a transaction always reports 1, without checking
            // existence — a declared protocol quirk, preserved as-is.
            txn.queue_del(key);
            return Outcome::line("1");
        }
        let existed = self.store.del(key);
        if let Some(err) = self.try_append(&Record::Del { key: key.to_string() }) {
            return Outcome::line(err);
        }
        Outcome::line(if existed { "1" } else { "0" })
    }

    fn cmd_exists(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key] = args else { return Outcome::line(arity_err("EXISTS")) };
        Outcome::line(if self.present(key, now) { "1" } else { "0" })
    }

    fn cmd_mset(&mut self, args: &[&str]) -> Outcome {
        if args.len() < 2 || args.len() % 2 != 0 {
            return Outcome::line(arity_err("MSET"));
        }
        let pairs: Vec<(&str, &str)> = args.chunks(2).map(|c| (c[0], c[1])).collect();
        if let Some(txn) = &mut self.txn {
            for (key, value) in pairs {
                txn.queue_set(key, value.to_string());
            }
            return Outcome::line("OK");
        }
        for (key, value) in pairs {
            self.store.set(key, value.to_string(), None);
            if let Some(err) =
                self.try_append(&Record::Set { key: key.to_string(), value: value.to_string() })
            {
                return Outcome::line(err);
            }
        }
        Outcome::line("OK")
    }

    fn cmd_mget(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        if args.is_empty() {
            // Q4: MGET with zero args is a single ERR line, preserving the
            // command's one-response-line shape.
            return Outcome::line(arity_err("MGET"));
        }
        let lines = args
            .iter()
            .map(|key| self.read_value(key, now).unwrap_or_else(|| "nil".to_string()))
            .collect();
        Outcome::Continue(lines)
    }

    fn cmd_expire(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key, ms] = args else { return Outcome::line(arity_err("EXPIRE")) };
        let Ok(ms): Result<i64, _> = ms.parse() else {
            return Outcome::line("ERR invalid milliseconds");
        };

        if !self.present(key, now) {
            return Outcome::line("0");
        }

        if let Some(txn) = &mut self.txn {
            if ms <= 0 {
                txn.queue_del(key);
            } else {
                txn.queue_expire(key, now + Duration::milliseconds(ms));
            }
            return Outcome::line("1");
        }

        if ms <= 0 {
            self.store.del(key);
            if let Some(err) = self.try_append(&Record::Del { key: key.to_string() }) {
                return Outcome::line(err);
            }
        } else {
            let expires_at = now + Duration::milliseconds(ms);
            self.store.set_expiry(key, Some(expires_at));
            if let Some(err) =
                self.try_append(&Record::Expire { key: key.to_string(), expires_at })
            {
                return Outcome::line(err);
            }
        }
        Outcome::line("1")
    }

    fn cmd_ttl(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key] = args else { return Outcome::line(arity_err("TTL")) };
        Outcome::line(match self.effective_ttl(key, now) {
            Ttl::NoKey => "-2".to_string(),
            Ttl::NoTTL => "-1".to_string(),
            Ttl::Millis(n) => n.to_string(),
        })
    }

    fn cmd_persist(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [key] = args else { return Outcome::line(arity_err("PERSIST")) };
        let store_has_expiry = matches!(self.store.remaining_ttl(key, now), Ttl::Millis(_));

        if let Some(txn) = &mut self.txn {
            let cleared = txn.queue_persist(key, store_has_expiry);
            return Outcome::line(if cleared { "1" } else { "0" });
        }

        if !store_has_expiry {
            return Outcome::line("0");
        }
        self.store.set_expiry(key, None);
        if let Some(err) = self.try_append(&Record::Persist { key: key.to_string() }) {
            return Outcome::line(err);
        }
        Outcome::line("1")
    }

    fn cmd_range(&mut self, args: &[&str], now: DateTime<Utc>) -> Outcome {
        let [start, end] = args else { return Outcome::line(arity_err("RANGE")) };
        let to_bound = |tok: &str| -> std::ops::Bound<&str> {
            if tok == "\"\"" {
                std::ops::Bound::Unbounded
            } else {
                std::ops::Bound::Included(tok)
            }
        };
        let mut lines = self.range_keys(to_bound(start), to_bound(end), now);
        lines.push("END".to_string());
        Outcome::Continue(lines)
    }

    fn cmd_begin(&mut self, args: &[&str]) -> Outcome {
        if !args.is_empty() {
            return Outcome::line(arity_err("BEGIN"));
        }
        if self.txn.is_some() {
            return Outcome::line("ERR transaction already in progress");
        }
        self.txn = Some(TxnBuffer::new());
        Outcome::line("OK")
    }

    fn cmd_commit(&mut self, args: &[&str]) -> Outcome {
        if !args.is_empty() {
            return Outcome::line(arity_err("COMMIT"));
        }
        let Some(mut txn) = self.txn.take() else {
            return Outcome::line("ERR no transaction in progress");
        };
        // The transaction ends regardless of what happens next (spec.md
        // §4.3): `self.txn` is already `None` above.
        for (key, op) in txn.drain() {
            match op {
                WriteOp::Set { value } => {
                    self.store.set(&key, value.clone(), None);
                    if let Some(err) = self.try_append(&Record::Set { key, value }) {
                        return Outcome::line(err);
                    }
                }
                WriteOp::Del => {
                    self.store.del(&key);
                    if let Some(err) = self.try_append(&Record::Del { key }) {
                        return Outcome::line(err);
                    }
                }
                WriteOp::Expire { expires_at } => {
                    self.store.set_expiry(&key, Some(expires_at));
                    if let Some(err) = self.try_append(&Record::Expire { key, expires_at }) {
                        return Outcome::line(err);
                    }
                }
                WriteOp::Persist => {
                    self.store.set_expiry(&key, None);
                    if let Some(err) = self.try_append(&Record::Persist { key }) {
                        return Outcome::line(err);
                    }
                }
            }
        }
        Outcome::line("OK")
    }

    fn cmd_abort(&mut self, args: &[&str]) -> Outcome {
        if !args.is_empty() {
            return Outcome::line(arity_err("ABORT"));
        }
        if self.txn.is_none() {
            return Outcome::line("ERR no transaction in progress");
        }
        self.txn = None;
        Outcome::line("OK")
    }

    fn try_append(&mut self, record: &Record) -> Option<String> {
        match self.log.append(record) {
            Ok(()) => None,
            Err(err) => {
                log::error!("log append failed: {err}");
                Some(ERR_WRITE_FAILED.to_string())
            }
        }
    }

    /// Read-your-writes value lookup (spec.md §4.3's overlay rules).
    fn read_value(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        if let Some(txn) = &self.txn {
            match txn.overlay(key) {
                Overlay::Value(v) => return Some(v.to_string()),
                Overlay::Deleted => return None,
                Overlay::ExpiryOverride(t) => {
                    return if t <= now { None } else { self.store.peek(key).map(String::from) };
                }
                Overlay::PersistOverride => return self.store.peek(key).map(String::from),
                Overlay::None => {}
            }
        }
        self.store.get(key, now).map(String::from)
    }

    fn present(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        if let Some(txn) = &self.txn {
            match txn.overlay(key) {
                Overlay::Value(_) => return true,
                Overlay::Deleted => return false,
                Overlay::ExpiryOverride(t) => return t > now,
                Overlay::PersistOverride => return true,
                Overlay::None => {}
            }
        }
        !matches!(self.store.remaining_ttl(key, now), Ttl::NoKey)
    }

    fn effective_ttl(&mut self, key: &str, now: DateTime<Utc>) -> Ttl {
        if let Some(txn) = &self.txn {
            match txn.overlay(key) {
                Overlay::Value(_) => return Ttl::NoTTL,
                Overlay::Deleted => return Ttl::NoKey,
                Overlay::ExpiryOverride(t) => {
                    return if t <= now {
                        Ttl::NoKey
                    } else {
                        Ttl::Millis((t - now).num_milliseconds().max(0) as u64)
                    };
                }
                Overlay::PersistOverride => return Ttl::NoTTL,
                Overlay::None => {}
            }
        }
        self.store.remaining_ttl(key, now)
    }

    /// Overlay-aware range enumeration for RANGE (spec.md §4.2/§4.4).
    fn range_keys(
        &self,
        start: std::ops::Bound<&str>,
        end: std::ops::Bound<&str>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut result: std::collections::BTreeSet<String> =
            self.store.range(start, end, now).into_iter().collect();

        if let Some(txn) = &self.txn {
            for (key, op) in txn.iter() {
                if !in_bounds(key.as_str(), start, end) {
                    continue;
                }
                match op {
                    WriteOp::Del => {
                        result.remove(key);
                    }
                    WriteOp::Set { .. } => {
                        result.insert(key.clone());
                    }
                    WriteOp::Expire { expires_at } => {
                        if *expires_at <= now {
                            result.remove(key);
                        } else {
                            result.insert(key.clone());
                        }
                    }
                    WriteOp::Persist => {
                        result.insert(key.clone());
                    }
                }
            }
        }
        result.into_iter().collect()
    }
}

fn in_bounds(key: &str, start: std::ops::Bound<&str>, end: std::ops::Bound<&str>) -> bool {
    use std::ops::Bound;
    let above_start = match start {
        Bound::Unbounded => true,
        Bound::Included(s) => key >= s,
        Bound::Excluded(s) => key > s,
    };
    let below_end = match end {
        Bound::Unbounded => true,
        Bound::Included(e) => key <= e,
        Bound::Excluded(e) => key < e,
    };
    above_start && below_end
}

fn arity_err(verb: &str) -> String {
    format!("ERR wrong number of arguments for {verb}")
}

/// Applies one replayed (or live) record to the Store, using the same
/// update rules as a direct write — except EXPIRE during replay attaches
/// whatever absolute instant was recorded, even if it is already in the
/// past (spec.md §4.1's deliberate replay/direct-write difference; lazy
/// expiry then treats the key as gone on the next read).
fn apply_record(store: &mut Store, record: Record) {
    match record {
        Record::Set { key, value } => store.set(&key, value, None),
        Record::Del { key } => {
            store.del(&key);
        }
        Record::Expire { key, expires_at } => {
            store.set_expiry(&key, Some(expires_at));
        }
        Record::Persist { key } => {
            store.set_expiry(&key, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let dir = tempfile::tempdir().unwrap();
        // Keep the tempdir alive for the engine's lifetime by leaking it —
        // tests only need the log file to exist for the duration of the
        // test process.
        let path = dir.path().join("data.db");
        std::mem::forget(dir);
        Engine::open(path).unwrap()
    }

    fn lines(outcome: Outcome) -> Vec<String> {
        match outcome {
            Outcome::Continue(l) | Outcome::Exit(l) => l,
        }
    }

    #[test]
    fn scenario_basic_set_get_del() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("SET a 1")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("GET a")), vec!["1"]);
        assert_eq!(lines(e.dispatch("DEL a")), vec!["1"]);
        assert_eq!(lines(e.dispatch("GET a")), vec!["nil"]);
    }

    #[test]
    fn scenario_mget_mixed_presence() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("SET x hello")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("MGET x y x")), vec!["hello", "nil", "hello"]);
    }

    #[test]
    fn scenario_transactional_commit() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("SET k old")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("BEGIN")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("SET k new")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("GET k")), vec!["new"]);
        assert_eq!(lines(e.dispatch("COMMIT")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("GET k")), vec!["new"]);
    }

    #[test]
    fn scenario_transactional_abort() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("SET k old")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("BEGIN")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("SET k new")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("ABORT")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("GET k")), vec!["old"]);
    }

    #[test]
    fn scenario_range_with_bounds() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("MSET a 1 b 2 c 3 d 4")), vec!["OK"]);
        assert_eq!(lines(e.dispatch("RANGE b c")), vec!["b", "c", "END"]);
    }

    #[test]
    fn range_unbounded_both_sides() {
        let mut e = engine();
        e.dispatch("MSET a 1 b 2 c 3");
        assert_eq!(lines(e.dispatch("RANGE \"\" \"\"")), vec!["a", "b", "c", "END"]);
    }

    #[test]
    fn del_in_transaction_always_reports_one() {
        let mut e = engine();
        e.dispatch("BEGIN");
        assert_eq!(lines(e.dispatch("DEL never-existed")), vec!["1"]);
    }

    #[test]
    fn begin_while_in_txn_errors() {
        let mut e = engine();
        e.dispatch("BEGIN");
        assert_eq!(lines(e.dispatch("BEGIN")), vec!["ERR transaction already in progress"]);
    }

    #[test]
    fn commit_or_abort_while_idle_errors() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("COMMIT")), vec!["ERR no transaction in progress"]);
        assert_eq!(lines(e.dispatch("ABORT")), vec!["ERR no transaction in progress"]);
    }

    #[test]
    fn mset_requires_even_nonzero_arity() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("MSET a")), vec!["ERR wrong number of arguments for MSET"]);
        assert_eq!(
            lines(e.dispatch("MSET a 1 b")),
            vec!["ERR wrong number of arguments for MSET"]
        );
    }

    #[test]
    fn mget_with_zero_args_is_one_error_line() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("MGET")), vec!["ERR wrong number of arguments for MGET"]);
    }

    #[test]
    fn expire_parse_failure_is_an_argument_error() {
        let mut e = engine();
        e.dispatch("SET a 1");
        assert_eq!(lines(e.dispatch("EXPIRE a not-a-number")), vec!["ERR invalid milliseconds"]);
    }

    #[test]
    fn expire_nonpositive_is_equivalent_to_del() {
        let mut e = engine();
        e.dispatch("SET a 1");
        assert_eq!(lines(e.dispatch("EXPIRE a 0")), vec!["1"]);
        assert_eq!(lines(e.dispatch("GET a")), vec!["nil"]);
    }

    #[test]
    fn persist_idempotence() {
        let mut e = engine();
        e.dispatch("SET a 1");
        e.dispatch("EXPIRE a 100000");
        assert_eq!(lines(e.dispatch("PERSIST a")), vec!["1"]);
        assert_eq!(lines(e.dispatch("PERSIST a")), vec!["0"]);
    }

    #[test]
    fn unknown_command() {
        let mut e = engine();
        assert_eq!(lines(e.dispatch("FROB a")), vec!["ERR unknown command 'FROB'"]);
    }

    #[test]
    fn exit_ends_session_and_discards_buffer() {
        let mut e = engine();
        e.dispatch("BEGIN");
        e.dispatch("SET a 1");
        match e.dispatch("EXIT") {
            Outcome::Exit(l) => assert_eq!(l, vec!["OK".to_string()]),
            Outcome::Continue(_) => panic!("expected Exit"),
        }
    }
}
