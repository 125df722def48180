//
// cross_file/revalidation.rs
//
// Per-document debouncing of rescans for dirty edits
//

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Url;

/// Handle for one scheduled rescan.
#[derive(Debug, Clone)]
pub struct PendingRescan {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Tracks the pending rescan per document.
///
/// Scheduling a document cancels its previous timer and bumps the
/// generation; a timer that wakes up re-checks the generation before
/// doing any work.
#[derive(Debug, Default)]
pub struct DebounceState {
    pending: RwLock<HashMap<Url, PendingRescan>>,
    generation: AtomicU64,
}

impl DebounceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a rescan for `uri`, cancelling any pending one.
    pub fn schedule(&self, uri: Url) -> PendingRescan {
        let rescan = PendingRescan {
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
        };
        if let Ok(mut pending) = self.pending.write() {
            if let Some(old) = pending.insert(uri, rescan.clone()) {
                old.token.cancel();
            }
        }
        rescan
    }

    /// Whether `generation` is still the latest scheduled for `uri`.
    pub fn is_current(&self, uri: &Url, generation: u64) -> bool {
        self.pending
            .read()
            .map(|pending| pending.get(uri).is_some_and(|p| p.generation == generation))
            .unwrap_or(false)
    }

    /// Mark a rescan as done. A newer schedule for the same document is kept.
    pub fn complete(&self, uri: &Url, generation: u64) {
        if let Ok(mut pending) = self.pending.write() {
            if pending.get(uri).is_some_and(|p| p.generation == generation) {
                pending.remove(uri);
            }
        }
    }

    pub fn cancel(&self, uri: &Url) {
        if let Ok(mut pending) = self.pending.write() {
            if let Some(old) = pending.remove(uri) {
                old.token.cancel();
            }
        }
    }

    pub fn cancel_all(&self) {
        if let Ok(mut pending) = self.pending.write() {
            for (_, old) in pending.drain() {
                old.token.cancel();
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().map(|p| p.len()).unwrap_or(0)
    }
}

/// Sleep for `delay` unless cancelled first. Returns `true` if the delay elapsed.
pub async fn wait_debounce(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_uri(name: &str) -> Url {
        Url::parse(&format!("file:///workspace/{}", name)).unwrap()
    }

    #[test]
    fn test_schedule_cancels_previous() {
        let state = DebounceState::new();
        let first = state.schedule(test_uri("a.m"));
        let second = state.schedule(test_uri("a.m"));
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(second.generation > first.generation);
        assert!(!state.is_current(&test_uri("a.m"), first.generation));
        assert!(state.is_current(&test_uri("a.m"), second.generation));
    }

    #[test]
    fn test_complete_keeps_newer_schedule() {
        let state = DebounceState::new();
        let first = state.schedule(test_uri("a.m"));
        let second = state.schedule(test_uri("a.m"));
        state.complete(&test_uri("a.m"), first.generation);
        assert_eq!(state.pending_count(), 1);
        state.complete(&test_uri("a.m"), second.generation);
        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let state = DebounceState::new();
        let a = state.schedule(test_uri("a.m"));
        let b = state.schedule(test_uri("b.m"));
        state.cancel_all();
        assert!(a.token.is_cancelled());
        assert!(b.token.is_cancelled());
        assert_eq!(state.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_debounce_elapses() {
        let token = CancellationToken::new();
        assert!(wait_debounce(&token, Duration::from_millis(300)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_debounce_cancelled() {
        let state = DebounceState::new();
        let first = state.schedule(test_uri("a.m"));
        let waiter = tokio::spawn(async move {
            wait_debounce(&first.token, Duration::from_millis(300)).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        state.schedule(test_uri("a.m"));
        assert!(!waiter.await.unwrap());
    }
}
