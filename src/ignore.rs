//! File skip patterns for template trees.
//! Editor backups (`*~`) and disabled files (`#*`) are left out of the
//! working tree entirely.

use crate::constants::SKIP_PATTERNS;
use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Builds the set of file name patterns that are never materialized.
///
/// # Errors
/// * `Error::IoError` wrapping an `InvalidInput` error if a pattern is malformed
pub fn skip_patterns() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in SKIP_PATTERNS {
        builder.add(Glob::new(pattern).map_err(invalid_pattern)?);
    }
    builder.build().map_err(invalid_pattern)
}

fn invalid_pattern(e: globset::Error) -> Error {
    Error::IoError(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("invalid skip pattern: {}", e),
    ))
}

/// Whether a file should be skipped. Only the file name is matched.
pub fn is_skipped(patterns: &GlobSet, path: &Path) -> bool {
    path.file_name().is_some_and(|name| patterns.is_match(Path::new(name)))
}
