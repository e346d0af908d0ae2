//! Core transform types and error definitions
//!
//! Contains the [`Transform`] trait every asset class implements, the
//! [`SourceFile`] / [`Artifact`] values flowing through it, and
//! [`TransformError`] for file-local failures.

use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while transforming a single source file
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    /// Reading or writing failed
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Source is not valid UTF-8 text
    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),

    /// Template loading or rendering failed
    #[error("template error: {0}")]
    Template(String),

    /// Style sheet compilation or post-processing failed
    #[error("{0}")]
    Style(String),

    /// Script parsing, lowering or printing failed
    #[error("{0}")]
    Script(String),

    /// Image decoding or encoding failed
    #[error("image error: {0}")]
    Image(String),

    /// Font data is malformed or unsupported
    #[error("font error: {0}")]
    Font(String),

    /// The transform panicked
    #[error("transform panicked: {0}")]
    Panicked(String),
}

/// A source file read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path of the source
    pub path: PathBuf,
    /// Path relative to the class's glob base
    pub relative: PathBuf,
    /// Raw file contents
    pub contents: Vec<u8>,
}

impl SourceFile {
    /// Read `path`, recording its location relative to `base`.
    pub fn read(path: &Path, base: &Path) -> std::io::Result<Self> {
        let contents = fs::read(path)?;
        Ok(Self::new(path, base, contents))
    }

    /// Wrap in-memory contents.
    pub fn new(path: &Path, base: &Path, contents: Vec<u8>) -> Self {
        let relative = path
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.file_name().map(PathBuf::from).unwrap_or_default());
        Self { path: path.to_path_buf(), relative, contents }
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.contents).map_err(|_| TransformError::Encoding(self.path.clone()))
    }
}

/// One output produced by a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the class destination
    pub relative: PathBuf,
    /// Bytes to write
    pub contents: Vec<u8>,
}

impl Artifact {
    /// Create an artifact.
    pub fn new(relative: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self { relative: relative.into(), contents: contents.into() }
    }
}

/// A class's fixed transform chain.
///
/// Implementations must be shareable across the worker threads a stage
/// fans out to.
pub trait Transform: Send + Sync {
    /// Whether a discovered source is processed at all.
    fn accepts(&self, _relative: &Path) -> bool {
        true
    }

    /// Output paths (relative to the class destination) a source produces.
    fn outputs(&self, relative: &Path) -> Vec<PathBuf>;

    /// Run the chain over one source file.
    fn apply(&self, source: &SourceFile) -> Result<Vec<Artifact>, TransformError>;
}
