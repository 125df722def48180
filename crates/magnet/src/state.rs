//
// state.rs
//
// Process-wide index state and the document lifecycle entry points
//

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};

use crate::cross_file::notebook::CellText;
use crate::cross_file::revalidation::{wait_debounce, DebounceState};
use crate::cross_file::scheduler::{Collaborators, IndexEvent, LoadScheduler};
use crate::cross_file::watcher::{FileWatcher, NotifyWatcher, NullWatcher};
use crate::cross_file::{FsPathResolver, FsTextSource, IndexConfig};
use crate::document_store::DocumentStore;
use crate::render::PlainRenderer;

pub struct WorldState {
    documents: Arc<DocumentStore>,
    scheduler: Arc<LoadScheduler>,
    debounce: Arc<DebounceState>,
    /// Last cell contents per open notebook, kept for full rescans.
    notebooks: DashMap<Url, Vec<CellText>>,
}

impl WorldState {
    pub fn new(
        config: IndexConfig,
        collaborators: Collaborators,
        events: Option<UnboundedSender<IndexEvent>>,
    ) -> Self {
        let documents = Arc::new(DocumentStore::new());
        let scheduler = LoadScheduler::new(config, documents.clone(), collaborators, events);
        Self {
            documents,
            scheduler,
            debounce: Arc::new(DebounceState::new()),
            notebooks: DashMap::new(),
        }
    }

    /// State backed by the filesystem under `workspace_root`.
    pub fn for_workspace(
        workspace_root: Option<PathBuf>,
        config: IndexConfig,
        events: Option<UnboundedSender<IndexEvent>>,
    ) -> Self {
        let watcher: Arc<dyn FileWatcher> = if config.watch_files {
            match NotifyWatcher::new() {
                Ok(watcher) => Arc::new(watcher),
                Err(e) => {
                    log::warn!("File watching unavailable: {}", e);
                    Arc::new(NullWatcher)
                }
            }
        } else {
            Arc::new(NullWatcher)
        };
        let collaborators = Collaborators {
            text: Arc::new(FsTextSource),
            resolver: Arc::new(FsPathResolver::new(workspace_root)),
            watcher,
            renderer: Arc::new(PlainRenderer),
        };
        Self::new(config, collaborators, events)
    }

    pub fn scheduler(&self) -> &LoadScheduler {
        &self.scheduler
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn config(&self) -> IndexConfig {
        self.scheduler.config()
    }

    /// Text of one line of an open document or notebook cell.
    pub fn line_text(&self, uri: &Url, line: u32) -> Option<String> {
        if let Some(text) = self.documents.line(uri, line) {
            return Some(text);
        }
        let owner = self.scheduler.notebooks().notebook_of(uri)?;
        let cells = self.notebooks.get(&owner.uri)?;
        let cell = cells.iter().find(|c| &c.uri == uri)?;
        cell.text.lines().nth(line as usize).map(str::to_string)
    }

    /// Apply new settings. Settings that change scan output trigger a full refresh.
    pub fn update_config(&self, config: IndexConfig) {
        let rescan = self.scheduler.config().scan_settings_changed(&config);
        self.scheduler.set_config(config);
        if rescan {
            log::info!("Index settings changed; rescanning open documents");
            self.refresh_all();
        }
    }

    pub fn on_document_opened(&self, uri: Url, text: String, version: Option<i32>) -> JoinHandle<()> {
        self.debounce.cancel(&uri);
        self.documents.open(uri.clone(), &text, version);
        self.scheduler.reload(&uri, Some(text))
    }

    /// Apply incremental changes to an open buffer without rescanning.
    pub fn apply_changes(
        &self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: Option<i32>,
    ) -> bool {
        self.documents.apply_changes(uri, changes, version)
    }

    /// An open document changed.
    ///
    /// `text` replaces the buffer when given. Coalesced (dirty) edits are
    /// debounced; committed ones are rescanned right away.
    pub fn on_document_edited(&self, uri: &Url, text: Option<String>, coalesced: bool) -> JoinHandle<()> {
        if let Some(text) = &text {
            if self.documents.contains(uri) {
                let full = TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: text.clone(),
                };
                self.documents.apply_changes(uri, vec![full], None);
            }
        }

        if !coalesced {
            self.debounce.cancel(uri);
            let text = text.or_else(|| self.documents.text(uri));
            return self.scheduler.reload(uri, text);
        }

        let pending = self.debounce.schedule(uri.clone());
        let delay = Duration::from_millis(self.scheduler.config().debounce_ms);
        let debounce = self.debounce.clone();
        let scheduler = self.scheduler.clone();
        let documents = self.documents.clone();
        let uri = uri.clone();
        tokio::spawn(async move {
            if !wait_debounce(&pending.token, delay).await {
                return;
            }
            if !debounce.is_current(&uri, pending.generation) {
                return;
            }
            debounce.complete(&uri, pending.generation);
            let text = text.or_else(|| documents.text(&uri));
            log::trace!("Debounced rescan of {}", uri);
            if let Err(e) = scheduler.reload(&uri, text).await {
                log::error!("Rescan of {} failed: {}", uri, e);
            }
        })
    }

    pub fn on_document_closed(&self, uri: &Url) {
        self.debounce.cancel(uri);
        self.documents.close(uri);
        self.scheduler.remove(uri);
    }

    pub fn on_notebook_opened(&self, uri: Url, cells: Vec<CellText>) {
        self.scheduler.load_notebook(&uri, &cells);
        self.notebooks.insert(uri, cells);
    }

    /// Cells are handed over in full; the notebook is rescanned.
    pub fn on_notebook_edited(&self, uri: Url, cells: Vec<CellText>) {
        self.on_notebook_opened(uri, cells);
    }

    pub fn on_notebook_closed(&self, uri: &Url) {
        self.notebooks.remove(uri);
        self.scheduler.remove_notebook(uri);
    }

    /// Drop every cache and rescan what the editor has open.
    pub fn refresh_all(&self) {
        self.debounce.cancel_all();
        self.scheduler.clear();
        for uri in self.documents.uris() {
            let text = self.documents.text(&uri);
            self.scheduler.request_load(&uri, text);
        }
        let notebooks: Vec<(Url, Vec<CellText>)> = self
            .notebooks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        for (uri, cells) in notebooks {
            self.scheduler.load_notebook(&uri, &cells);
        }
    }
}
