//! Byte-for-byte copies for third-party libraries and meta files.

use super::{Artifact, SourceFile, Transform, TransformError};
use std::path::{Path, PathBuf};

/// Copies every source unchanged to the same relative path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimTransform;

impl Transform for VerbatimTransform {
    fn outputs(&self, relative: &Path) -> Vec<PathBuf> {
        vec![relative.to_path_buf()]
    }

    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError> {
        Ok(vec![Artifact::new(source.relative.clone(), source.contents.clone())])
    }
}
