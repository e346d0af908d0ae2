//! Destination cleaner.
//!
//! Removes the whole output root before a build so a build never mixes stale
//! and fresh output.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error while removing the destination root.
#[derive(Debug, Error)]
pub enum CleanError {
    /// The source root lies inside the destination root
    #[error("refusing to remove {} because it contains the source root {}", .dist.display(), .src.display())]
    ContainsSources {
        /// Destination root
        dist: PathBuf,
        /// Source root
        src: PathBuf,
    },
    /// Removal failed
    #[error("failed to remove {}: {source}", .path.display())]
    Io {
        /// Path being removed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Recursively delete `dist`.
///
/// Deleting a path that does not exist succeeds. `src` is checked first so a
/// misconfigured destination can never wipe the sources. Both roots are
/// resolved first, so `src/..` or a symlink to the project is caught too.
pub fn clean_destination(dist: &Path, src: &Path) -> Result<(), CleanError> {
    if resolve(src).starts_with(resolve(dist)) {
        return Err(CleanError::ContainsSources {
            dist: dist.to_path_buf(),
            src: src.to_path_buf(),
        });
    }

    match fs::remove_dir_all(dist) {
        Ok(()) => {
            tracing::debug!("removed {}", dist.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CleanError::Io { path: dist.to_path_buf(), source: e }),
    }
}

/// Canonical form of `path`, which need not exist.
///
/// The nearest existing ancestor is canonicalized and the remaining
/// components are applied on top of it.
fn resolve(path: &Path) -> PathBuf {
    let absolute = match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };

    for ancestor in absolute.ancestors() {
        let Ok(mut resolved) = ancestor.canonicalize() else {
            continue;
        };
        let rest = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
        for component in rest.components() {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(name) => resolved.push(name),
                _ => {}
            }
        }
        return resolved;
    }
    absolute
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_everything() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        fs::create_dir_all(dist.join("assets/css")).unwrap();
        fs::write(dist.join("index.html"), "x").unwrap();
        fs::write(dist.join("assets/css/old.css"), "x").unwrap();

        clean_destination(&dist, &temp.path().join("src")).unwrap();

        assert!(!dist.exists());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("dist");
        let src = temp.path().join("src");

        clean_destination(&dist, &src).unwrap();
        clean_destination(&dist, &src).unwrap();
    }

    #[test]
    fn test_clean_refuses_to_remove_sources() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let result = clean_destination(temp.path(), &src);
        assert!(matches!(result, Err(CleanError::ContainsSources { .. })));
        assert!(src.exists());

        let same = clean_destination(&src, &src);
        assert!(matches!(same, Err(CleanError::ContainsSources { .. })));
    }

    #[test]
    fn test_clean_resolves_parent_components() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("proj/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.html"), "x").unwrap();

        let result = clean_destination(&src.join(".."), &src);
        assert!(matches!(result, Err(CleanError::ContainsSources { .. })));

        let missing = clean_destination(&src.join("missing/../.."), &src);
        assert!(matches!(missing, Err(CleanError::ContainsSources { .. })));
        assert!(src.join("index.html").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_resolves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("proj/src");
        fs::create_dir_all(&src).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(temp.path().join("proj"), &link).unwrap();

        let result = clean_destination(&link, &src);
        assert!(matches!(result, Err(CleanError::ContainsSources { .. })));
        assert!(src.exists());
    }

    #[test]
    fn test_clean_missing_destination_beside_sources() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();

        clean_destination(&temp.path().join("build/../dist"), &src).unwrap();
        assert!(src.exists());
    }

    #[test]
    fn test_clean_sibling_with_common_prefix_is_allowed() {
        let temp = TempDir::new().unwrap();
        let dist = temp.path().join("site");
        fs::create_dir_all(&dist).unwrap();

        clean_destination(&dist, &temp.path().join("site-src")).unwrap();
        assert!(!dist.exists());
    }

    #[test]
    fn test_clean_error_message() {
        let err = CleanError::ContainsSources {
            dist: PathBuf::from("/p"),
            src: PathBuf::from("/p/src"),
        };
        assert_eq!(
            err.to_string(),
            "refusing to remove /p because it contains the source root /p/src"
        );
    }
}
