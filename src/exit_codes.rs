//! Process exit codes.

/// Run completed (or help/version was printed).
pub const OK: i32 = 0;
/// Fatal error, including a missing or invalid module document.
pub const FATAL: i32 = 1;
/// Invalid arguments, including an unresolvable `--module` filter.
pub const USAGE: i32 = 2;
