//! Diagnostic text rendering for `Status` (spec.md §4.4's extension), in the
//! grounding crate's `info.rs` style of a free function over the engine
//! rather than a method on it.

use crate::storage::Status;

pub fn describe(status: &Status) -> Vec<String> {
    vec![format!("keys: {}", status.keys), format!("log_size: {} bytes", status.log_size)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_fields() {
        let lines = describe(&Status { keys: 3, log_size: 128 });
        assert_eq!(lines, vec!["keys: 3".to_string(), "log_size: 128 bytes".to_string()]);
    }
}
