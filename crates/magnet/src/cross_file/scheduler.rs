//
// cross_file/scheduler.rs
//
// Load scheduler: the only writer of the document cache
//
// Loads are started either idempotently (`request_load`, used for dependency
// discovery and on-demand lookups) or unconditionally (`reload`, used for
// edits). Reading and scanning run on the blocking pool; results land in the
// cache only if their sequence number is still current.
//

use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;

use super::cache::DocumentCacheStore;
use super::config::IndexConfig;
use super::content_provider::{ReadError, TextSource};
use super::export_map::{ExportMap, ExportPattern};
use super::notebook::{CellText, NotebookCache, NotebookStore};
use super::path_resolve::PathResolver;
use super::types::DocumentCache;
use super::watcher::FileWatcher;
use crate::diagnostics::DiagnosticsStore;
use crate::document_store::DocumentStore;
use crate::render::DocRenderer;
use crate::scanner::{scan_document, ScanContext, ScanResult};

/// Host-provided services the index depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextSource>,
    pub resolver: Arc<dyn PathResolver>,
    pub watcher: Arc<dyn FileWatcher>,
    pub renderer: Arc<dyn DocRenderer>,
}

/// Emitted whenever the index changes in a way a client may want to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A document (or notebook cell) was scanned; its diagnostics are current.
    Scanned(Url),
    /// A document was dropped from the index.
    Removed(Url),
}

pub struct LoadScheduler {
    cache: DocumentCacheStore,
    exports: Arc<ExportMap>,
    diagnostics: DiagnosticsStore,
    notebooks: NotebookStore,
    documents: Arc<DocumentStore>,
    config: RwLock<IndexConfig>,
    collaborators: Collaborators,
    events: Option<UnboundedSender<IndexEvent>>,
    this: Weak<LoadScheduler>,
}

impl LoadScheduler {
    pub fn new(
        config: IndexConfig,
        documents: Arc<DocumentStore>,
        collaborators: Collaborators,
        events: Option<UnboundedSender<IndexEvent>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            cache: DocumentCacheStore::new(),
            exports: Arc::new(ExportMap::new()),
            diagnostics: DiagnosticsStore::new(),
            notebooks: NotebookStore::new(),
            documents,
            config: RwLock::new(config),
            collaborators,
            events,
            this: this.clone(),
        })
    }

    pub fn cache(&self) -> &DocumentCacheStore {
        &self.cache
    }

    pub fn exports(&self) -> &ExportMap {
        &self.exports
    }

    pub fn diagnostics(&self) -> &DiagnosticsStore {
        &self.diagnostics
    }

    pub fn notebooks(&self) -> &NotebookStore {
        &self.notebooks
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> IndexConfig {
        self.config.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn set_config(&self, config: IndexConfig) {
        if let Ok(mut guard) = self.config.write() {
            *guard = config;
        }
    }

    /// Start loading `uri` unless it is already cached or loading.
    pub fn request_load(&self, uri: &Url, text: Option<String>) -> Option<JoinHandle<()>> {
        let seq = self.cache.reserve(uri)?;
        log::trace!("Loading {}", uri);
        Some(self.spawn_load(uri.clone(), seq, text))
    }

    /// Rescan `uri` regardless of its current state. The previous entry
    /// stays readable until the new scan lands.
    pub fn reload(&self, uri: &Url, text: Option<String>) -> JoinHandle<()> {
        let seq = self.cache.supersede(uri);
        log::trace!("Reloading {} (seq {})", uri, seq);
        self.spawn_load(uri.clone(), seq, text)
    }

    /// Cached entry for `uri`, loading it on demand and waiting up to the
    /// configured timeout.
    pub async fn ensure_loaded(&self, uri: &Url) -> Option<Arc<DocumentCache>> {
        if let Some(cache) = self.cache.get(uri) {
            return Some(cache);
        }
        self.request_load(uri, None);
        let config = self.config();
        self.cache
            .wait_for(uri, config.cache_timeout, config.cache_poll_interval)
            .await
    }

    /// Drop a document's cache entry, exports and diagnostics.
    pub fn remove(&self, uri: &Url) {
        let removed = self.cache.remove(uri);
        self.exports.remove(uri);
        self.diagnostics.remove(uri);
        if removed {
            log::trace!("Removed {} from the index", uri);
            self.notify(IndexEvent::Removed(uri.clone()));
        }
    }

    /// Scan every code cell of a notebook and replace its cache.
    pub fn load_notebook(&self, uri: &Url, cells: &[CellText]) {
        let config = self.config();
        let ctx = ScanContext::new(uri, &config, self.collaborators.resolver.as_ref())
            .with_renderer(self.collaborators.renderer.clone())
            .for_cell(uri);
        let (notebook, diagnostics) = NotebookCache::scan(uri.clone(), cells, &ctx);

        let dependencies: Vec<Url> = notebook
            .cells
            .iter()
            .flat_map(|cell| cell.cache.file_dependencies().cloned().collect::<Vec<_>>())
            .collect();
        for stale in self.notebooks.remove(uri) {
            if notebook.cell_by_uri(&stale).is_none() {
                self.diagnostics.remove(&stale);
                self.notify(IndexEvent::Removed(stale));
            }
        }
        self.notebooks.set(notebook);
        for (cell, cell_diagnostics) in diagnostics {
            self.diagnostics.set(cell.clone(), cell_diagnostics);
            self.notify(IndexEvent::Scanned(cell));
        }
        for dependency in dependencies {
            self.request_load(&dependency, None);
        }
    }

    pub fn remove_notebook(&self, uri: &Url) {
        for cell in self.notebooks.remove(uri) {
            self.diagnostics.remove(&cell);
            self.notify(IndexEvent::Removed(cell));
        }
    }

    /// Forget everything. Callers re-request what they still need.
    pub fn clear(&self) {
        let uris = self.cache.uris();
        self.cache.clear();
        self.exports.clear();
        self.diagnostics.clear();
        self.notebooks.clear();
        for uri in uris {
            self.notify(IndexEvent::Removed(uri));
        }
    }

    fn notify(&self, event: IndexEvent) {
        if let Some(events) = &self.events {
            // the receiver is gone only during shutdown
            let _ = events.send(event);
        }
    }

    fn spawn_load(&self, uri: Url, seq: u64, text: Option<String>) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            if let Some(this) = this.upgrade() {
                this.run_load(uri, seq, text).await;
            }
        })
    }

    async fn run_load(&self, uri: Url, seq: u64, text: Option<String>) {
        let text = text.or_else(|| self.documents.text(&uri));
        let from_disk = text.is_none();
        let config = self.config();
        let exports = self.exports.clone();
        let source = self.collaborators.text.clone();
        let resolver = self.collaborators.resolver.clone();
        let renderer = self.collaborators.renderer.clone();
        let task_uri = uri.clone();

        let scanned = tokio::task::spawn_blocking(move || -> Result<ScanResult, ReadError> {
            let text = match text {
                Some(text) => text,
                None => source.read(&task_uri)?,
            };
            let ctx = ScanContext::new(&task_uri, &config, resolver.as_ref())
                .with_exports(&exports)
                .with_renderer(renderer);
            Ok(scan_document(&ctx, &text))
        })
        .await;

        match scanned {
            Ok(Ok(result)) => self.finish_load(uri, seq, result, from_disk),
            Ok(Err(ReadError::NotFound(_))) => {
                log::trace!("{} does not exist", uri);
                self.cache.fail(&uri, seq);
            }
            Ok(Err(e)) => {
                log::warn!("Failed to load {}: {}", uri, e);
                self.cache.fail(&uri, seq);
            }
            Err(e) => {
                log::error!("Scan task for {} failed: {}", uri, e);
                self.cache.fail(&uri, seq);
            }
        }
    }

    fn finish_load(&self, uri: Url, seq: u64, result: ScanResult, from_disk: bool) {
        let (cache, diagnostics, exports) = result.into_parts(uri.clone());
        let dependencies: Vec<Url> = cache.file_dependencies().cloned().collect();
        if !self.cache.complete(&uri, seq, cache) {
            return;
        }
        self.apply_exports(&uri, exports);
        self.diagnostics.set(uri.clone(), diagnostics);
        if from_disk {
            self.arm_watch(&uri);
        }
        self.notify(IndexEvent::Scanned(uri));
        for dependency in dependencies {
            self.request_load(&dependency, None);
        }
    }

    /// Register `uri`'s export patterns. When they change, cached documents
    /// the new patterns match are rescanned to pick up the export edge.
    fn apply_exports(&self, uri: &Url, patterns: Vec<ExportPattern>) {
        let before = self.exports.patterns_of(uri);
        if before.iter().map(String::as_str).eq(patterns.iter().map(ExportPattern::as_str)) {
            return;
        }
        let affected: Vec<Url> = self
            .cache
            .uris()
            .into_iter()
            .filter(|target| target != uri && patterns.iter().any(|p| p.matches(target)))
            .collect();
        self.exports.set(uri.clone(), patterns);
        for target in affected {
            log::trace!("{} now exports to {}", uri, target);
            self.reload(&target, None);
        }
    }

    fn arm_watch(&self, uri: &Url) {
        if !self.config().watch_files {
            return;
        }
        let this = self.this.clone();
        let watched = uri.clone();
        self.collaborators.watcher.watch(
            uri,
            Box::new(move || {
                if let Some(this) = this.upgrade() {
                    this.on_file_changed(&watched);
                }
            }),
        );
    }

    /// External change to a document loaded from disk.
    fn on_file_changed(&self, uri: &Url) {
        if self.documents.contains(uri) {
            return;
        }
        log::trace!("{} changed on disk", uri);
        self.remove(uri);
    }
}
