//! The append-only, fsync-per-record command log (spec.md §4.1 / §6.2).
//!
//! Mechanically this follows the grounding crate's `storage::log::Log`: the
//! file is opened with `create(true)`, its parent directory is created if
//! missing, an advisory exclusive lock is taken via `fs4` so a second
//! process can't corrupt it, and every append goes through a `BufWriter`
//! followed by an explicit flush + `sync_all`. Where it differs from the
//! grounding crate is the record shape: that crate frames binary
//! length-prefixed key/value pairs for a log-structured value store, while
//! this log is a textual *command* log — one line per mutation, replayed by
//! re-applying each command rather than by rebuilding a byte-offset index.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs4::FileExt;

use crate::error::{CResult, Error};

/// One durable mutation record, as read back from or about to be appended
/// to the log.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Set { key: String, value: String },
    Del { key: String },
    Expire { key: String, expires_at: DateTime<Utc> },
    Persist { key: String },
}

impl Record {
    fn encode(&self) -> String {
        match self {
            Record::Set { key, value } => format!("SET {key} {value}"),
            Record::Del { key } => format!("DEL {key}"),
            Record::Expire { key, expires_at } => {
                // serde_json renders a DateTime<Utc> as a quoted RFC3339
                // string with nanosecond resolution, and since RFC3339 has
                // no internal whitespace the quoted token still splits
                // cleanly on the line's whitespace runs.
                let encoded = serde_json::to_string(expires_at)
                    .expect("DateTime<Utc> serialization cannot fail");
                format!("EXPIRE {key} {encoded}")
            }
            Record::Persist { key } => format!("PERSIST {key}"),
        }
    }

    /// Parses one log line. Returns `None` for malformed records — short
    /// lines, unknown verbs, or unparseable timestamps — per the declared
    /// "skip silently, replay continues" recovery policy (spec.md §4.1/§7).
    fn parse(line: &str) -> Option<Record> {
        let mut parts = line.split_whitespace();
        let verb = parts.next()?;
        match verb.to_ascii_uppercase().as_str() {
            "SET" => {
                let key = parts.next()?.to_string();
                let value = parts.next()?.to_string();
                if parts.next().is_some() {
                    return None;
                }
                Some(Record::Set { key, value })
            }
            "DEL" => {
                let key = parts.next()?.to_string();
                if parts.next().is_some() {
                    return None;
                }
                Some(Record::Del { key })
            }
            "EXPIRE" => {
                let key = parts.next()?.to_string();
                let ts = parts.next()?;
                if parts.next().is_some() {
                    return None;
                }
                let expires_at = serde_json::from_str::<DateTime<Utc>>(ts).ok()?;
                Some(Record::Expire { key, expires_at })
            }
            "PERSIST" => {
                let key = parts.next()?.to_string();
                if parts.next().is_some() {
                    return None;
                }
                Some(Record::Persist { key })
            }
            _ => None,
        }
    }
}

/// The durable log file handle.
pub struct Log {
    path: PathBuf,
    file: File,
}

impl Log {
    /// Opens the log at `path`, creating it (and its parent directory) if
    /// absent, and takes out an exclusive lock for the process lifetime.
    pub fn open(path: impl Into<PathBuf>) -> CResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let file = OpenOptions::new().read(true).append(true).create(true).open(&path)?;
        file.try_lock_exclusive().map_err(|e| Error::Lock(e.to_string()))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_on_disk(&self) -> CResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Reads every record from the start of the file, in order, skipping
    /// malformed lines silently (spec.md §4.1's declared recovery policy).
    pub fn replay(&self) -> CResult<Vec<Record>> {
        let reader = BufReader::new(OpenOptions::new().read(true).open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            match Record::parse(&line) {
                Some(record) => records.push(record),
                None if line.trim().is_empty() => {}
                None => log::warn!("skipping malformed log record: {line:?}"),
            }
        }
        Ok(records)
    }

    /// Appends `record`, flushing and fsyncing before returning — the
    /// durability barrier spec.md §4.1 requires before a caller's response
    /// is allowed to report success.
    pub fn append(&mut self, record: &Record) -> CResult<()> {
        let mut w = BufWriter::new(&mut self.file);
        writeln!(w, "{}", record.encode())?;
        w.flush()?;
        drop(w);
        self.file.sync_all()?;
        Ok(())
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        if let Err(err) = self.file.sync_all() {
            log::warn!("failed to flush log file on drop: {err}");
        }
        if let Err(err) = FileExt::unlock(&self.file) {
            log::warn!("failed to release log file lock: {err}");
        }
    }
}
