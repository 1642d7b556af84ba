//! `ordkv` is an embeddable, ordered key-value store: a single in-memory
//! `BTreeMap` backed by an append-only command log, with lazily-expiring
//! TTLs and a single-transaction read-your-writes buffer. There is no
//! concurrent access within a process — `Engine` is the single writer, and
//! the log file's advisory lock keeps a second process from opening the
//! same store underneath it.
//!
//! ## Getting started
//!
//! ```rust
//! use ordkv::engine::{Engine, Outcome};
//!
//! fn run() -> ordkv::error::CResult<()> {
//!     let dir = tempfile::tempdir().unwrap();
//!     let mut engine = Engine::open(dir.path().join("data.db"))?;
//!
//!     match engine.dispatch("SET a 1") {
//!         Outcome::Continue(lines) => assert_eq!(lines, vec!["OK".to_string()]),
//!         Outcome::Exit(_) => unreachable!(),
//!     }
//!     match engine.dispatch("GET a") {
//!         Outcome::Continue(lines) => assert_eq!(lines, vec!["1".to_string()]),
//!         Outcome::Exit(_) => unreachable!(),
//!     }
//!
//!     Ok(())
//! }
//!
//! fn main() {
//!     run().unwrap();
//! }
//! ```

pub mod engine;
pub mod error;
pub mod info;
pub mod storage;
pub mod txn;
