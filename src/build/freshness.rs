//! Freshness checks used to skip work that is already up to date.
//!
//! A source is fresh when every output it would produce exists and none of
//! them is older than the source. Anything that cannot be stat'ed counts as
//! stale, so the file is rebuilt.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether all `outputs` exist and are at least as new as `source`.
pub fn is_fresh<P: AsRef<Path>>(source: &Path, outputs: &[P]) -> bool {
    if outputs.is_empty() {
        return false;
    }
    let Some(source_time) = modified(source) else {
        return false;
    };

    outputs.iter().all(|output| match modified(output.as_ref()) {
        Some(output_time) => output_time >= source_time,
        None => false,
    })
}
