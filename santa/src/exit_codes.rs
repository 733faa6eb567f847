//! Stable exit codes for `santa` commands.

/// Command finished and every participant-level step succeeded.
pub const OK: i32 = 0;
/// Command aborted: bad config, missing game, unknown name, or other errors.
pub const FAILED: i32 = 1;
/// Command finished but some mail could not be sent or read; re-run later.
pub const PARTIAL: i32 = 2;
