//! CLI exit code registry.
//!
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Description                              |
//! |------|------------------------------------------|
//! | 0    | Success                                  |
//! | 1    | Operation error (bad formula, bad data)  |
//! | 2    | Usage error (bad args, missing file)     |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Operation error - a formula failed to compile or data could not be
/// processed.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file.
pub const EXIT_USAGE: u8 = 2;
