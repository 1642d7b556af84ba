//! The external collaborator spec.md §1 calls out of scope for design but
//! still names at its interface (§6): a line-oriented stdin/stdout
//! dispatcher, textual argument parsing, and process startup/shutdown. All
//! of the interesting behavior — parsing a command line, routing it through
//! the TxnBuffer/Store/Log, rendering a response — lives in
//! `ordkv::engine::Engine`; this binary's only job is to feed it lines and
//! print what comes back.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use ordkv::engine::{Engine, Outcome};
use ordkv_cli::config::ConfigLoad;
use ordkv_cli::trace;

/// A line-oriented embedded key-value store (SET/GET/DEL/EXPIRE/TTL/RANGE,
/// transactions via BEGIN/COMMIT/ABORT). Reads commands from stdin, one per
/// line, and writes response lines to stdout.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to an optional TOML config file (log level, db file location).
    /// A missing file is not an error.
    #[arg(short = 'c', long = "config", default_value = "ordkv.toml")]
    config: PathBuf,

    /// Diagnostic log verbosity: off|error|warn|info|debug|trace. Overrides
    /// the config file's `log_level` when given explicitly.
    #[arg(short = 'l', long = "log-level")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let cfg = ConfigLoad::load(&args.config);
    let log_level = args.log_level.as_deref().unwrap_or(&cfg.log_level);

    if let Err(err) = trace::init_logging(log_level) {
        eprintln!("ordkv-cli: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let db_path = cfg.db_path();
    info!("opening log at {}", db_path.display());

    let mut engine = match Engine::open(&db_path) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("ordkv-cli: failed to open {}: {err}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    match run(&mut engine) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ordkv-cli: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Drives the request/response loop: one input line in, zero or more
/// response lines out, until EXIT or EOF (spec.md §5/§6.1 — EOF is an
/// implicit EXIT).
fn run(engine: &mut Engine) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        match engine.dispatch(&line) {
            Outcome::Continue(lines) => {
                for l in lines {
                    writeln!(out, "{l}")?;
                }
                out.flush()?;
            }
            Outcome::Exit(lines) => {
                for l in lines {
                    writeln!(out, "{l}")?;
                }
                out.flush()?;
                return Ok(());
            }
        }
    }
    Ok(())
}
