//! Watch mode for per-class rebuilds on file changes
//!
//! Every asset class gets its own debounced file-system subscription on the
//! glob base of its watch pattern and its own worker thread. A worker re-runs
//! only its class's stage, so runs of one class never overlap while different
//! classes rebuild concurrently. After each run the reload signal fires.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::build::discovery::{glob_base, DiscoveryError, PatternMatcher};
use crate::build::stage::run_stage;
use crate::build::{BuildContext, BuildReport, StageReport};
use crate::config::schema::WatchConfig;
use crate::notification::timestamp;
use crate::paths::AssetClass;

/// Error during watch mode setup
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", .path.display())]
    WatchPath {
        /// Directory that could not be watched
        path: PathBuf,
        /// Underlying error
        source: notify::Error,
    },
    /// Watch pattern is invalid
    #[error("Invalid watch pattern: {0}")]
    Pattern(#[from] DiscoveryError),
    /// Worker thread could not be spawned
    #[error("Failed to spawn watch worker: {0}")]
    Spawn(std::io::Error),
}

/// Receiver of the "stage finished, refresh the browser" signal.
pub trait ReloadSignal: Send + Sync {
    /// Reload the whole page.
    fn reload(&self);

    /// Refresh style sheets without a full page reload.
    fn reload_styles(&self);
}

/// Options for watch mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiet period before a burst of events is delivered
    pub debounce: Duration,
    /// Clear the terminal before each rebuild
    pub clear_screen: bool,
}

impl WatchOptions {
    /// Options from the `[watch]` config section.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            debounce: Duration::from_millis(u64::from(config.debounce_ms)),
            clear_screen: config.clear_screen,
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

/// Tracks files with errors across runs of one class for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that failed in the previous run
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a new stage report, returns the files now fixed
    pub fn update(&mut self, report: &StageReport) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = report
            .files
            .iter()
            .filter(|f| f.status.is_failure())
            .map(|f| f.source.clone())
            .collect();

        let mut fixed: Vec<PathBuf> =
            self.files_with_errors.difference(&current).cloned().collect();
        fixed.sort();

        self.files_with_errors = current;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Get the number of files with errors
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Running per-class subscriptions.
///
/// Dropping the watcher stops event delivery; the worker threads then exit.
pub struct Watcher {
    _debouncers: Vec<Debouncer<RecommendedWatcher>>,
    classes: Vec<AssetClass>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").field("classes", &self.classes).finish()
    }
}

impl Watcher {
    /// Subscribe every class.
    ///
    /// A class whose watch root does not exist yet is watched from its
    /// nearest existing ancestor, so a directory created later is picked up.
    /// `initial` seeds each worker's error tracker so files fixed after the
    /// first build are reported as fixed.
    pub fn start(
        ctx: &BuildContext,
        reload: Arc<dyn ReloadSignal>,
        options: &WatchOptions,
        initial: &BuildReport,
    ) -> Result<Self, WatchError> {
        let mut debouncers = Vec::new();
        let mut classes = Vec::new();

        for (class, config) in ctx.paths().iter() {
            let pattern_root = glob_base(&config.watch_pattern);
            let Some(root) = existing_ancestor(&pattern_root) else {
                tracing::warn!(
                    "not watching {}: no part of {} exists",
                    class.label(),
                    pattern_root.display()
                );
                continue;
            };
            if !pattern_root.is_dir() {
                tracing::debug!(
                    "{} does not exist, watching {} instead",
                    pattern_root.display(),
                    root.display()
                );
            }

            let matcher = PatternMatcher::new(&config.watch_pattern)?;
            let (tx, rx) = channel();
            let mut debouncer =
                new_debouncer(options.debounce, tx).map_err(WatchError::WatcherInit)?;
            debouncer
                .watcher()
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::WatchPath { path: root.clone(), source })?;

            let worker = ClassWorker::new(ctx.clone(), class, matcher, reload.clone())
                .with_clear_screen(options.clear_screen)
                .with_initial(initial.stage(class));
            thread::Builder::new()
                .name(format!("watch-{}", class))
                .spawn(move || worker.run(rx))
                .map_err(WatchError::Spawn)?;

            tracing::debug!("watching {} under {}", class.label(), root.display());
            debouncers.push(debouncer);
            classes.push(class);
        }

        Ok(Self { _debouncers: debouncers, classes })
    }

    /// Classes with an active subscription.
    pub fn classes(&self) -> &[AssetClass] {
        &self.classes
    }
}

/// The deepest directory among `path` and its ancestors that exists.
fn existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };
    absolute.ancestors().find(|dir| dir.is_dir()).map(Path::to_path_buf)
}

/// Re-runs one class's stage for each batch of matching changes.
pub struct ClassWorker {
    ctx: BuildContext,
    class: AssetClass,
    matcher: PatternMatcher,
    reload: Arc<dyn ReloadSignal>,
    clear_screen: bool,
    tracker: ErrorTracker,
}

impl ClassWorker {
    /// Create a worker for one class.
    pub fn new(
        ctx: BuildContext,
        class: AssetClass,
        matcher: PatternMatcher,
        reload: Arc<dyn ReloadSignal>,
    ) -> Self {
        Self { ctx, class, matcher, reload, clear_screen: false, tracker: ErrorTracker::new() }
    }

    /// Clear the terminal before each rebuild.
    pub fn with_clear_screen(mut self, clear_screen: bool) -> Self {
        self.clear_screen = clear_screen;
        self
    }

    /// Seed the error tracker with the class's report from the initial build.
    pub fn with_initial(mut self, report: Option<&StageReport>) -> Self {
        if let Some(report) = report {
            self.tracker.update(report);
        }
        self
    }

    fn run(mut self, rx: Receiver<DebounceEventResult>) {
        for result in rx {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    self.on_change(&paths);
                }
                Err(error) => {
                    // Non-fatal, keep watching
                    tracing::warn!("[{}] watch error: {:?}", self.class.label(), error);
                }
            }
        }
        tracing::debug!("watch worker for {} stopped", self.class.label());
    }

    /// Handle a batch of changed paths.
    ///
    /// Returns the stage report when at least one path matched the class's
    /// watch pattern and the stage ran.
    pub fn on_change(&mut self, paths: &[PathBuf]) -> Option<StageReport> {
        let changed: Vec<&PathBuf> = paths.iter().filter(|p| self.matcher.matches(p)).collect();
        if changed.is_empty() {
            return None;
        }

        if self.clear_screen {
            clear_screen();
        }
        for path in &changed {
            if let Some(name) = path.file_name() {
                println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
            }
        }

        let report = run_stage(&self.ctx, self.class);

        for fixed in self.tracker.update(&report) {
            if let Some(name) = fixed.file_name() {
                println!("[{}] Fixed: {}", timestamp(), name.to_string_lossy());
            }
        }
        println!(
            "[{}] {} rebuilt ({}) - {} written, {} failed",
            timestamp(),
            self.class.label(),
            format_duration(report.duration),
            report.written_count(),
            report.failed_count()
        );
        if self.tracker.has_errors() {
            println!(
                "[{}] {} file(s) still failing",
                timestamp(),
                self.tracker.error_count()
            );
        }

        if self.class == AssetClass::Styles {
            self.reload.reload_styles();
        } else {
            self.reload.reload();
        }
        Some(report)
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}
