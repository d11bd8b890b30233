//! Command front end for hubtap.
//!
//! The binary's library half: tokenization and command grammar, payload
//! rendering, TOML configuration, and the script/prompt driver. Living in a
//! library keeps every piece unit-testable; `main.rs` only parses flags and
//! wires the pieces together.

pub mod app;
pub mod commands;
pub mod config;
pub mod render;
pub mod tokenize;
