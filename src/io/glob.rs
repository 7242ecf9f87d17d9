//! Wildcard expansion for transfer sources.
//!
//! ```no_run
//! use ironpipe::io::glob::expand_glob;
//!
//! let files = expand_glob("/tmp/source/a*")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result};
use glob::glob;
use std::path::PathBuf;

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories are skipped. A pattern without wildcards matches the named
/// file if it exists, so plain paths can be mixed with patterns.
///
/// # Errors
/// An invalid pattern, or an I/O error while walking a directory. No match
/// is an empty vector, not an error.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Expand every pattern and concatenate the results, dropping repeats.
///
/// # Errors
/// See [`expand_glob`].
pub fn expand_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut out: Vec<PathBuf> = Vec::new();
    for p in patterns {
        for path in expand_glob(p.as_ref())? {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}
