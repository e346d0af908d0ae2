//! Live-reload notifications for connected browsers
//!
//! Watch workers signal from plain threads; browsers listen on a server-sent
//! event stream fed by the same broadcast channel.

use crate::watch::ReloadSignal;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel; slow clients skip missed events.
const CHANNEL_CAPACITY: usize = 100;

/// Events sent to reload clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the page
    Reload,
    /// Re-fetch style sheets only
    Styles,
}

impl ReloadEvent {
    /// Payload sent on the event stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadEvent::Reload => "reload",
            ReloadEvent::Styles => "styles",
        }
    }
}

/// Live-reload channel shared by the watcher and the server.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
}

impl LiveReload {
    /// Create a new live-reload channel
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to reload events
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of currently connected clients
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn send(&self, event: ReloadEvent) {
        // No connected clients is not an error
        if self.tx.send(event).is_ok() {
            tracing::debug!("sent {} to {} client(s)", event.as_str(), self.client_count());
        }
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadSignal for LiveReload {
    fn reload(&self) {
        self.send(ReloadEvent::Reload);
    }

    fn reload_styles(&self) {
        self.send(ReloadEvent::Styles);
    }
}
