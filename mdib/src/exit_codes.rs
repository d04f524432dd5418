//! Stable exit codes for `mdib` commands.

/// Every batch of the script was committed.
pub const OK: i32 = 0;
/// The script or config could not be read or parsed.
pub const INVALID: i32 = 1;
/// A batch was rejected by the preprocessing chain.
pub const REJECTED: i32 = 2;
