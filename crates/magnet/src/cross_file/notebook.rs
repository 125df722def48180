//
// cross_file/notebook.rs
//
// Per-cell caches for notebook documents
//

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::types::{DependencyLocation, DocumentCache};
use crate::diagnostics::Diagnostic;
use crate::scanner::{scan_document, ScanContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markup,
}

/// One cell as handed over by the editor.
#[derive(Debug, Clone)]
pub struct CellText {
    pub uri: Url,
    pub kind: CellKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CellEntry {
    /// 0-based position of the cell in the notebook, markup cells included.
    pub index: usize,
    /// Declared with `// @cell NAME`.
    pub id: Option<String>,
    pub uri: Url,
    pub cache: Arc<DocumentCache>,
}

/// Scan results for every code cell of one notebook.
#[derive(Debug, Clone)]
pub struct NotebookCache {
    pub uri: Url,
    pub cells: Vec<CellEntry>,
}

impl NotebookCache {
    /// Scan every code cell. Diagnostics are returned per cell URI.
    pub fn scan(
        uri: Url,
        cells: &[CellText],
        ctx: &ScanContext<'_>,
    ) -> (Self, Vec<(Url, Vec<Diagnostic>)>) {
        let mut entries = Vec::new();
        let mut diagnostics = Vec::new();
        for (index, cell) in cells.iter().enumerate() {
            if cell.kind == CellKind::Markup {
                continue;
            }
            let cell_ctx = ScanContext {
                uri: &cell.uri,
                base: ctx.base,
                is_notebook_cell: true,
                config: ctx.config,
                resolver: ctx.resolver,
                exports: None,
                renderer: ctx.renderer.clone(),
            };
            let result = scan_document(&cell_ctx, &cell.text);
            let (cache, cell_diagnostics, _) = result.into_parts(cell.uri.clone());
            diagnostics.push((cell.uri.clone(), cell_diagnostics));
            entries.push(CellEntry {
                index,
                id: cache.cell_id.clone(),
                uri: cell.uri.clone(),
                cache: Arc::new(cache),
            });
        }
        (
            Self {
                uri,
                cells: entries,
            },
            diagnostics,
        )
    }

    pub fn cell_by_index(&self, index: usize) -> Option<&CellEntry> {
        self.cells.iter().find(|c| c.index == index)
    }

    /// First cell declaring `id`.
    pub fn cell_by_id(&self, id: &str) -> Option<&CellEntry> {
        self.cells.iter().find(|c| c.id.as_deref() == Some(id))
    }

    pub fn cell_by_uri(&self, uri: &Url) -> Option<&CellEntry> {
        self.cells.iter().find(|c| &c.uri == uri)
    }

    /// The cell a `@use` dependency points at. `None` for file locations.
    pub fn resolve(&self, location: &DependencyLocation) -> Option<&CellEntry> {
        match location {
            DependencyLocation::CellIndex(i) => self.cell_by_index(*i),
            DependencyLocation::CellId(id) => self.cell_by_id(id),
            DependencyLocation::File(_) => None,
        }
    }
}

/// Open notebooks plus a reverse index from cell URI to notebook.
#[derive(Debug, Default)]
pub struct NotebookStore {
    notebooks: DashMap<Url, Arc<NotebookCache>>,
    cell_owner: DashMap<Url, Url>,
}

impl NotebookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, notebook: NotebookCache) {
        self.remove(&notebook.uri);
        for cell in &notebook.cells {
            self.cell_owner.insert(cell.uri.clone(), notebook.uri.clone());
        }
        self.notebooks.insert(notebook.uri.clone(), Arc::new(notebook));
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<NotebookCache>> {
        self.notebooks.get(uri).map(|n| n.clone())
    }

    /// Remove a notebook, returning the URIs of its cells.
    pub fn remove(&self, uri: &Url) -> Vec<Url> {
        let Some((_, notebook)) = self.notebooks.remove(uri) else {
            return Vec::new();
        };
        notebook
            .cells
            .iter()
            .map(|cell| {
                self.cell_owner.remove(&cell.uri);
                cell.uri.clone()
            })
            .collect()
    }

    /// Notebook owning `cell_uri`.
    pub fn notebook_of(&self, cell_uri: &Url) -> Option<Arc<NotebookCache>> {
        let owner = self.cell_owner.get(cell_uri)?.clone();
        self.get(&owner)
    }

    pub fn cell_cache(&self, cell_uri: &Url) -> Option<Arc<DocumentCache>> {
        let notebook = self.notebook_of(cell_uri)?;
        notebook.cell_by_uri(cell_uri).map(|c| c.cache.clone())
    }

    pub fn uris(&self) -> Vec<Url> {
        self.notebooks.iter().map(|n| n.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.notebooks.clear();
        self.cell_owner.clear();
    }
}
