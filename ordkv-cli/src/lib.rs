//! Ambient process glue for the `ordkv-cli` binary: configuration and
//! logging setup. The protocol dispatcher itself lives in `ordkv::engine` —
//! this crate only wires stdin/stdout to it (see `main.rs`).

pub mod config;
pub mod trace;
