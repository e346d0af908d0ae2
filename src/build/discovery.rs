//! Source file discovery for the build system.
//!
//! Patterns use the `glob` crate syntax extended with `{a,b}` alternation,
//! which is expanded into one `glob` pattern per alternative.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// Unbalanced `{` / `}` in a pattern
    #[error("Unbalanced braces in pattern '{0}'")]
    UnbalancedBraces(String),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Expand `{a,b}` alternations into separate patterns.
///
/// Groups may appear several times and may nest. A pattern without braces is
/// returned as-is.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, DiscoveryError> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(DiscoveryError::UnbalancedBraces(pattern.to_string()));
        }
        return Ok(vec![pattern.to_string()]);
    };

    // Find the matching close brace and the top-level commas inside it
    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| DiscoveryError::UnbalancedBraces(pattern.to_string()))?;

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    let mut expanded = Vec::new();
    for window in bounds.windows(2) {
        let alternative = &pattern[window[0] + 1..window[1]];
        let candidate = format!("{}{}{}", prefix, alternative, suffix);
        expanded.extend(expand_braces(&candidate)?);
    }
    Ok(expanded)
}

/// The wildcard-free directory prefix of a pattern.
///
/// Output paths keep their structure relative to this directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(['*', '?', '[', '{']) {
                break;
            }
        }
        base.push(component.as_os_str());
    }
    // A pattern with no wildcard names a single file
    if base.as_os_str() == pattern {
        base.pop();
    }
    base
}

/// Discover the files matching a pattern.
///
/// Directories are skipped; results are sorted and deduplicated.
pub fn discover_sources(pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = BTreeSet::new();

    for expanded in expand_braces(pattern)? {
        let paths = glob::glob_with(&expanded, MATCH_OPTIONS)
            .map_err(|e| DiscoveryError::InvalidPattern(expanded.clone(), e))?;
        for entry in paths {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        files.insert(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("error reading path: {}", e);
                }
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// Tests paths against an (expanded) pattern without touching the filesystem.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
}

impl PatternMatcher {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Result<Self, DiscoveryError> {
        let patterns = expand_braces(pattern)?
            .into_iter()
            .map(|p| Pattern::new(&p).map_err(|e| DiscoveryError::InvalidPattern(p.clone(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether the path matches any alternative.
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches_path_with(path, MATCH_OPTIONS))
    }
}

/// Check that a pattern is valid without running it.
pub fn validate_pattern(pattern: &str) -> Result<(), DiscoveryError> {
    PatternMatcher::new(pattern).map(|_| ())
}
