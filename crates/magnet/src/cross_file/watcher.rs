//
// cross_file/watcher.rs
//
// Filesystem watches on documents loaded from disk
//

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tower_lsp::lsp_types::Url;

pub type WatchCallback = Box<dyn FnOnce() + Send>;

/// Calls back once when a watched document changes on disk.
pub trait FileWatcher: Send + Sync {
    /// Register a one-shot callback for `uri`.
    fn watch(&self, uri: &Url, on_change: WatchCallback);
}

/// Watches nothing. Used when `watchFiles` is off and in the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWatcher;

impl FileWatcher for NullWatcher {
    fn watch(&self, _uri: &Url, _on_change: WatchCallback) {}
}

type CallbackMap = Arc<Mutex<HashMap<PathBuf, WatchCallback>>>;

/// `notify`-backed watcher. Each path holds at most one pending callback,
/// which fires at most once.
pub struct NotifyWatcher {
    watcher: Mutex<RecommendedWatcher>,
    watched: Mutex<HashSet<PathBuf>>,
    callbacks: CallbackMap,
}

impl NotifyWatcher {
    pub fn new() -> notify::Result<Self> {
        let callbacks: CallbackMap = Arc::default();
        let handler_callbacks = callbacks.clone();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => dispatch(&handler_callbacks, &event),
                Err(e) => log::warn!("File watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        Ok(Self {
            watcher: Mutex::new(watcher),
            watched: Mutex::new(HashSet::new()),
            callbacks,
        })
    }
}

impl FileWatcher for NotifyWatcher {
    fn watch(&self, uri: &Url, on_change: WatchCallback) {
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        if !register(&self.callbacks, path.clone(), on_change) {
            log::trace!("Watch already pending for {}", path.display());
        }

        let Ok(mut watched) = self.watched.lock() else {
            return;
        };
        if watched.contains(&path) {
            return;
        }
        let Ok(mut watcher) = self.watcher.lock() else {
            return;
        };
        match watcher.watch(&path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                log::trace!("Watching {}", path.display());
                watched.insert(path);
            }
            Err(e) => log::warn!("Failed to watch {}: {}", path.display(), e),
        }
    }
}

/// Store `on_change` unless a callback for `path` is still pending.
fn register(
    callbacks: &Mutex<HashMap<PathBuf, WatchCallback>>,
    path: PathBuf,
    on_change: WatchCallback,
) -> bool {
    let Ok(mut map) = callbacks.lock() else {
        return false;
    };
    match map.entry(path) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(on_change);
            true
        }
    }
}

/// Fire and drop the callback registered for each path the event touches.
fn dispatch(callbacks: &Mutex<HashMap<PathBuf, WatchCallback>>, event: &Event) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }
    let fired: Vec<WatchCallback> = match callbacks.lock() {
        Ok(mut map) => event
            .paths
            .iter()
            .filter_map(|p| map.remove(p))
            .collect(),
        Err(_) => return,
    };
    if !fired.is_empty() {
        log::trace!("{} watch callback(s) for {:?}", fired.len(), event.paths);
    }
    for callback in fired {
        callback();
    }
}
