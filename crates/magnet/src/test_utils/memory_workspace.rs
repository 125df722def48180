//! In-memory workspace implementing the text and path collaborators.
//!
//! Files live under a fixed `/workspace` root so URIs are stable across
//! platforms that accept absolute Unix paths.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tower_lsp::lsp_types::Url;

use crate::cross_file::content_provider::{ReadError, TextSource};
use crate::cross_file::glob::{is_glob, split_literal_prefix, Glob};
use crate::cross_file::path_resolve::{normalize_path, relative_slash_path, PathResolver, ResolveOptions};

pub struct MemoryWorkspace {
    root: PathBuf,
    files: Mutex<BTreeMap<PathBuf, String>>,
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/workspace"),
            files: Mutex::new(BTreeMap::new()),
            reads: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn uri(&self, relative: &str) -> Url {
        Url::from_file_path(self.path(relative)).expect("workspace paths are absolute")
    }

    /// Create or overwrite a file, returning its URI.
    pub fn add(&self, relative: &str, text: &str) -> Url {
        self.files
            .lock()
            .unwrap()
            .insert(self.path(relative), text.to_string());
        self.uri(relative)
    }

    pub fn remove(&self, relative: &str) {
        self.files.lock().unwrap().remove(&self.path(relative));
    }

    /// How many times `read` was called for a file.
    pub fn read_count(&self, relative: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .get(&self.path(relative))
            .copied()
            .unwrap_or(0)
    }

    fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

impl TextSource for MemoryWorkspace {
    fn read(&self, uri: &Url) -> Result<String, ReadError> {
        let path = uri
            .to_file_path()
            .map_err(|_| ReadError::NotAFile(uri.clone()))?;
        *self.reads.lock().unwrap().entry(path.clone()).or_default() += 1;
        self.files
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(uri.clone()))
    }
}

impl PathResolver for MemoryWorkspace {
    fn resolve(&self, base: &Url, pattern: &str, options: ResolveOptions) -> Vec<Url> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let (dir, pattern) = match pattern.strip_prefix('/') {
            Some(stripped) if options.root_marker => (self.root.clone(), stripped),
            _ => match base.to_file_path().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
                Some(dir) => (dir, pattern),
                None => return Vec::new(),
            },
        };

        if !options.allow_glob || !is_glob(pattern) {
            return normalize_path(&dir.join(pattern))
                .filter(|p| self.contains(p))
                .and_then(|p| Url::from_file_path(p).ok())
                .into_iter()
                .collect();
        }

        let (prefix, rest) = split_literal_prefix(pattern);
        let (Ok(glob), Some(root)) = (Glob::new(rest), normalize_path(&dir.join(prefix))) else {
            return Vec::new();
        };
        let mut matches: Vec<PathBuf> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|path| relative_slash_path(path, &root).is_some_and(|rel| glob.is_match(&rel)))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        matches
            .into_iter()
            .filter_map(|p| Url::from_file_path(p).ok())
            .collect()
    }
}
