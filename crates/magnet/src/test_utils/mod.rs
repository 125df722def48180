//! Shared helpers for unit tests, integration tests and benchmarks.

pub mod fixture_workspace;
pub mod memory_workspace;

pub use fixture_workspace::{create_fixture_workspace, FixtureConfig, TestWorkspace};
pub use memory_workspace::MemoryWorkspace;

use std::collections::HashMap;
use std::sync::Mutex;

use tower_lsp::lsp_types::Url;

use crate::cross_file::watcher::{FileWatcher, WatchCallback};

/// Watcher whose callbacks run only when a test calls `fire`.
#[derive(Default)]
pub struct ManualWatcher {
    callbacks: Mutex<HashMap<Url, Vec<WatchCallback>>>,
}

impl ManualWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run and drop the callbacks registered for `uri`; returns how many ran.
    pub fn fire(&self, uri: &Url) -> usize {
        let fired = self.callbacks.lock().unwrap().remove(uri).unwrap_or_default();
        let count = fired.len();
        for callback in fired {
            callback();
        }
        count
    }

    pub fn registered(&self, uri: &Url) -> usize {
        self.callbacks.lock().unwrap().get(uri).map_or(0, Vec::len)
    }
}

impl FileWatcher for ManualWatcher {
    fn watch(&self, uri: &Url, on_change: WatchCallback) {
        self.callbacks
            .lock()
            .unwrap()
            .entry(uri.clone())
            .or_default()
            .push(on_change);
    }
}
