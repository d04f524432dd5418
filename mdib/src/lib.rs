//! In-memory MDIB store: a typed descriptor tree with versioned states.
//!
//! Every change arrives as a batch, passes an ordered preprocessing chain
//! (structural validation, then versioning) and is committed atomically or
//! not at all.
//!
//! - **[`core`]**: Pure data model, kind table, batches and errors. No I/O.
//! - **[`preprocessing`]**: Chain segments run before every commit.
//! - **[`storage`]**: Committed tree, read queries and change reports.
//! - **[`access`]**: Lock-protected shared access and MDIB version bookkeeping.
//! - **[`io`]**: Side-effecting inputs (config and replay scripts).
//!
//! [`replay`] ties these together for the CLI.

pub mod access;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod preprocessing;
pub mod replay;
pub mod storage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
