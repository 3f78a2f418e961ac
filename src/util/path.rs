//! Path helpers

use std::path::PathBuf;

/// Expand `~` and `$VAR` references in a user-supplied path.
///
/// Falls back to the literal input if expansion fails (e.g. a reference
/// to an unset variable); the subsequent file access reports the real
/// problem with the real path.
pub fn expand_path(input: &str) -> PathBuf {
    shellexpand::full(input)
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| PathBuf::from(input))
}
