//
// cross_file/export_map.rs
//
// `@export` patterns: documents that make themselves visible to others
//

use std::path::PathBuf;
use std::sync::RwLock;

use indexmap::IndexMap;
use tower_lsp::lsp_types::Url;

use super::glob::{split_literal_prefix, Glob, GlobError};
use super::path_resolve::{normalize_path, relative_slash_path};

/// One `@export "glob";` anchored at the declaring document's directory.
#[derive(Debug, Clone)]
pub struct ExportPattern {
    pattern: String,
    root: PathBuf,
    /// `None` for an exact path.
    glob: Option<Glob>,
}

impl ExportPattern {
    pub fn new(pattern: &str, declaring: &Url) -> Result<Option<Self>, GlobError> {
        let Some(dir) = declaring
            .to_file_path()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        else {
            return Ok(None);
        };
        let (prefix, rest) = split_literal_prefix(pattern);
        let glob = if rest.is_empty() {
            None
        } else {
            Some(Glob::new(rest)?)
        };
        Ok(normalize_path(&dir.join(prefix)).map(|root| Self {
            pattern: pattern.to_string(),
            root,
            glob,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, target: &Url) -> bool {
        let Ok(path) = target.to_file_path() else {
            return false;
        };
        let Some(path) = normalize_path(&path) else {
            return false;
        };
        match &self.glob {
            None => path == self.root,
            Some(glob) => relative_slash_path(&path, &self.root).is_some_and(|rel| glob.is_match(&rel)),
        }
    }
}

/// Process-wide map from exporting document to its patterns.
#[derive(Debug, Default)]
pub struct ExportMap {
    inner: RwLock<IndexMap<Url, Vec<ExportPattern>>>,
}

impl ExportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the patterns declared by `uri`.
    pub fn set(&self, uri: Url, patterns: Vec<ExportPattern>) {
        if let Ok(mut guard) = self.inner.write() {
            if patterns.is_empty() {
                guard.shift_remove(&uri);
            } else {
                guard.insert(uri, patterns);
            }
        }
    }

    pub fn remove(&self, uri: &Url) {
        if let Ok(mut guard) = self.inner.write() {
            guard.shift_remove(uri);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
        }
    }

    /// Pattern strings currently registered for `uri`.
    pub fn patterns_of(&self, uri: &Url) -> Vec<String> {
        let Ok(guard) = self.inner.read() else {
            return Vec::new();
        };
        guard
            .get(uri)
            .map(|patterns| patterns.iter().map(|p| p.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    /// Every other document with a pattern matching `target`, in insertion order.
    pub fn exporters_of(&self, target: &Url) -> Vec<Url> {
        let Ok(guard) = self.inner.read() else {
            return Vec::new();
        };
        guard
            .iter()
            .filter(|(uri, _)| *uri != target)
            .filter(|(_, patterns)| patterns.iter().any(|p| p.matches(target)))
            .map(|(uri, _)| uri.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
