use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::{
    state::AppState,
    transitions::{reduce, Action},
};

/// Single-writer container for the application state. Readers get cheap
/// `Arc` snapshots; subscribers are woken only when a dispatch changes
/// something.
pub struct Store {
    state: watch::Sender<Arc<AppState>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (state, _) = watch::channel(Arc::new(initial));
        Self { state }
    }

    /// Applies `action` and returns whether the state changed.
    pub fn dispatch(&self, action: Action) -> bool {
        let name = action.name();
        let changed = self.state.send_if_modified(|current| {
            match reduce(current, action) {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        debug!(action = name, changed, "store: dispatch");
        changed
    }

    pub fn get_state(&self) -> Arc<AppState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
