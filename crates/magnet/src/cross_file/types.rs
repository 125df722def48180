//
// cross_file/types.rs
//
// Dependency edges and per-document scan results
//

use serde::Serialize;
use tower_lsp::lsp_types::{Position, Range, Url};

use crate::definition::Definition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyKind {
    /// `load "file";`
    Load,
    /// `// @require "glob";`
    Require,
    /// Injected because another document's `@export` pattern matches this one.
    Export,
    /// `// @use` between notebook cells.
    Use,
}

/// Where a dependency points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum DependencyLocation {
    File(Url),
    /// 0-based position of a cell in its notebook.
    CellIndex(usize),
    /// Id a cell declared with `// @cell NAME`.
    CellId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub location: DependencyLocation,
    /// Definitions from the dependency become visible after this position.
    pub loads_at: Position,
    /// Text range of the quoted pattern or cell reference.
    pub range: Range,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn file_uri(&self) -> Option<&Url> {
        match &self.location {
            DependencyLocation::File(uri) => Some(uri),
            _ => None,
        }
    }
}

/// Everything the index knows about one scanned document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCache {
    pub uri: Url,
    /// File-level documentation from a leading `@file` comment.
    pub documentation: String,
    /// Global scope, in declaration order.
    pub definitions: Vec<Definition>,
    /// In file order.
    pub dependencies: Vec<Dependency>,
    pub cell_id: Option<String>,
}

impl DocumentCache {
    pub fn empty(uri: Url) -> Self {
        Self {
            uri,
            documentation: String::new(),
            definitions: Vec::new(),
            dependencies: Vec::new(),
            cell_id: None,
        }
    }

    pub fn file_dependencies(&self) -> impl Iterator<Item = &Url> {
        self.dependencies.iter().filter_map(Dependency::file_uri)
    }
}
