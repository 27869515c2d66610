use parking_lot::Mutex;
use tracing::info;

/// Receives full navigations (not in-app route changes).
///
/// After `assign` the caller must treat every piece of in-flight state as
/// discarded, the way a browser drops the page.
pub trait Navigator: Send + Sync {
    fn assign(&self, location: &str);
}

/// Navigator that remembers where it was sent.
///
/// Front ends without a real location bar poll `take()` after each action
/// and switch to the requested screen.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
    pending: Mutex<Option<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent location, if any navigation happened
    pub fn current(&self) -> Option<String> {
        self.history.lock().last().cloned()
    }

    /// Every location assigned so far, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    /// Consume the pending navigation
    pub fn take(&self) -> Option<String> {
        self.pending.lock().take()
    }
}

impl Navigator for RecordingNavigator {
    fn assign(&self, location: &str) {
        info!(location, "Navigating");
        self.history.lock().push(location.to_string());
        *self.pending.lock() = Some(location.to_string());
    }
}
