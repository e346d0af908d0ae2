//! User-visible failure notifications.
//!
//! A failing asset never aborts a run; instead a [`Notification`] carrying the
//! stage label and the error message is pushed through a [`Notifier`].

use std::io::Write;
use std::sync::Mutex;
use std::time::SystemTime;

/// A labelled message about a failed asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Stage label (e.g. "CSS")
    pub stage: String,
    /// Error message
    pub message: String,
}

impl Notification {
    /// Create a notification.
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self { stage: stage.into(), message: message.into() }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

/// Channel notifications are delivered through.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn notify(&self, notification: &Notification);
}

/// A notifier that discards everything.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) {}
}

/// Writes timestamped notification lines to a terminal.
pub struct ConsoleNotifier {
    use_colors: bool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleNotifier").field("use_colors", &self.use_colors).finish()
    }
}

impl ConsoleNotifier {
    /// Notifier writing to stderr, coloured when stderr is a terminal.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Notifier writing to a custom output, without colours.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { use_colors: false, output: Mutex::new(Box::new(output)) }
    }

    fn red(&self, text: &str) -> String {
        if self.use_colors {
            format!("\x1b[31m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        tracing::debug!(stage = %notification.stage, "{}", notification.message);
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(
                output,
                "[{}] {} {}",
                timestamp(),
                self.red(&format!("[{}]", notification.stage)),
                notification.message
            );
        }
    }
}

/// Wall-clock time of day as `HH:MM:SS` (UTC).
pub fn timestamp() -> String {
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
