//
// cross_file/cache.rs
//
// Document cache with placeholder reservations and sequence-numbered loads
//

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::types::DocumentCache;

/// What a reader sees for a document.
#[derive(Debug, Clone)]
pub enum CacheState {
    /// A load was requested and nothing has landed yet.
    Reserved,
    Loaded(Arc<DocumentCache>),
}

#[derive(Debug)]
struct CacheSlot {
    /// Sequence number of the most recent load requested for this document.
    requested: u64,
    /// Last completed scan; stays readable while a newer load is in flight.
    current: Option<Arc<DocumentCache>>,
}

/// Per-document scan results keyed by URI.
///
/// Reservation is a single map-entry operation, so concurrent requests for
/// the same document start exactly one load. Every load carries a sequence
/// number; a completion is accepted only if it is still the latest one
/// requested for that document.
#[derive(Debug)]
pub struct DocumentCacheStore {
    entries: DashMap<Url, CacheSlot>,
    next_seq: AtomicU64,
}

impl Default for DocumentCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCacheStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    fn bump(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Install a placeholder if the document has no entry.
    ///
    /// Returns the load's sequence number, or `None` when an entry (loaded or
    /// pending) already exists.
    pub fn reserve(&self, uri: &Url) -> Option<u64> {
        match self.entries.entry(uri.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let seq = self.bump();
                vacant.insert(CacheSlot {
                    requested: seq,
                    current: None,
                });
                log::trace!("Reserved cache entry for {} (seq {})", uri, seq);
                Some(seq)
            }
        }
    }

    /// Start a new load regardless of the current state.
    pub fn supersede(&self, uri: &Url) -> u64 {
        let seq = self.bump();
        match self.entries.entry(uri.clone()) {
            Entry::Occupied(mut occupied) => occupied.get_mut().requested = seq,
            Entry::Vacant(vacant) => {
                vacant.insert(CacheSlot {
                    requested: seq,
                    current: None,
                });
            }
        }
        log::trace!("Superseded cache entry for {} (seq {})", uri, seq);
        seq
    }

    /// Land a finished scan. Returns `false` if a newer load was requested
    /// or the entry was removed in the meantime.
    pub fn complete(&self, uri: &Url, seq: u64, cache: DocumentCache) -> bool {
        let Some(mut slot) = self.entries.get_mut(uri) else {
            log::trace!("Dropping scan of {}: entry removed", uri);
            crate::perf::record_discarded_load();
            return false;
        };
        if slot.requested != seq {
            log::trace!(
                "Dropping stale scan of {} (seq {} < {})",
                uri,
                seq,
                slot.requested
            );
            crate::perf::record_discarded_load();
            return false;
        }
        slot.current = Some(Arc::new(cache));
        true
    }

    /// A load failed; drop the entry so a later request can retry.
    pub fn fail(&self, uri: &Url, seq: u64) {
        let removed = self.entries.remove_if(uri, |_, slot| slot.requested == seq);
        if removed.is_some() {
            log::trace!("Removed cache entry for {} after failed load", uri);
        }
    }

    pub fn state(&self, uri: &Url) -> Option<CacheState> {
        let slot = self.entries.get(uri)?;
        Some(match &slot.current {
            Some(cache) => CacheState::Loaded(cache.clone()),
            None => CacheState::Reserved,
        })
    }

    /// The last completed scan, if any.
    pub fn get(&self, uri: &Url) -> Option<Arc<DocumentCache>> {
        self.entries.get(uri).and_then(|slot| slot.current.clone())
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn remove(&self, uri: &Url) -> bool {
        self.entries.remove(uri).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn uris(&self) -> Vec<Url> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wait until the document is no longer a placeholder.
    ///
    /// `None` when the document has no entry or `timeout` elapses first.
    pub async fn wait_for(
        &self,
        uri: &Url,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Arc<DocumentCache>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.state(uri)? {
                CacheState::Loaded(cache) => return Some(cache),
                CacheState::Reserved => {
                    if tokio::time::Instant::now() >= deadline {
                        log::trace!("Timed out waiting for {}", uri);
                        return None;
                    }
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }
}
