//! File-backed inputs: identity config and replay scripts.

pub mod config;
pub mod script;
