//! Kernel source loading.

use crate::error::Result;
use std::path::Path;

/// Reads an entire kernel source file into memory.
///
/// The source text is treated as an opaque blob; it is handed verbatim to
/// the backend compiler (CPU) or the vendor runtime (GPU). Missing or
/// unreadable files surface as [`Error::Io`](crate::Error::Io).
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}
