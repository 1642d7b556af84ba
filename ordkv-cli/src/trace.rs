//! Diagnostic logging setup (SPEC_FULL.md §2 item 6).
//!
//! Everything here goes to stderr: stdout is reserved for the wire protocol
//! response lines spec.md §6.1 defines, so a log line must never land there.
//! Mirrors the grounding crate's `fern::Dispatch` usage in its own `trace`
//! module, trimmed to a single stderr sink since this process has no
//! rolling-file log directory to manage.

use std::str::FromStr;

use anyhow::Result;
use log::LevelFilter;

pub fn init_logging(level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);

    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if dispatch.apply().is_err() {
        // Re-running init_logging (e.g. across tests in one process) is not
        // fatal: the first call's dispatcher stays installed.
        eprintln!("logger was already initialized");
    }
    Ok(())
}
