//! Build context shared by every stage of a run.

use crate::notification::{Notification, Notifier, NullNotifier};
use crate::paths::{AssetClass, AssetClassConfig, PathConfig};
use crate::settings::BuildSettings;
use std::path::Path;
use std::sync::Arc;

/// Build context containing the path table, mode settings and the
/// notification channel for a run.
///
/// The context is constructed once at process entry and passed by reference
/// to the orchestrator, the stages and the watcher.
#[derive(Clone)]
pub struct BuildContext {
    /// Source and destination layout
    paths: PathConfig,
    /// Mode and per-class options
    settings: BuildSettings,
    /// Where file-local failures are reported
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Create a new build context that discards notifications.
    pub fn new(paths: PathConfig, settings: BuildSettings) -> Self {
        Self { paths, settings, notifier: Arc::new(NullNotifier) }
    }

    /// Set the notification channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Get the path table.
    pub fn paths(&self) -> &PathConfig {
        &self.paths
    }

    /// Get the mode settings.
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Source root directory.
    pub fn src_dir(&self) -> &Path {
        self.paths.src_root()
    }

    /// Destination root directory.
    pub fn out_dir(&self) -> &Path {
        self.paths.dist_root()
    }

    /// Paths for one class.
    pub fn class(&self, class: AssetClass) -> &AssetClassConfig {
        self.paths.get(class)
    }

    /// Report a file-local failure for a class.
    pub fn notify(&self, class: AssetClass, message: impl Into<String>) {
        self.notifier.notify(&Notification::new(class.label(), message));
    }
}
