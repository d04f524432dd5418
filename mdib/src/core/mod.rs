//! Deterministic model types shared by the MDIB store.
//!
//! Core modules are free of I/O and locking. They describe descriptors,
//! states, batches and the errors raised while validating them.

pub mod entity;
pub mod error;
pub mod kind;
pub mod modification;
pub mod version;
