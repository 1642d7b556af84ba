pub mod log;
pub mod store;

use serde_derive::{Deserialize, Serialize};

/// Point-in-time snapshot of the store, for diagnostics and tests. Not part
/// of the wire protocol — no command in §6.1 surfaces it directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Number of keys currently held, including lazily-expired ones not yet
    /// observed (and thus removed) by a read.
    pub keys: u64,

    /// On-disk size of the command log, in bytes.
    pub log_size: u64,
}
