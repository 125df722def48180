//
// cross_file/path_resolve.rs
//
// Resolving `load` / `@require` paths to document URIs
//

use std::path::{Component, Path, PathBuf};

use tower_lsp::lsp_types::Url;
use walkdir::WalkDir;

use super::glob::{is_glob, split_literal_prefix, Glob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    /// Expand glob characters; otherwise the pattern is an exact path.
    pub allow_glob: bool,
    /// A leading `/` means relative to the workspace root.
    pub root_marker: bool,
}

impl ResolveOptions {
    pub fn exact() -> Self {
        Self::default()
    }

    pub fn glob() -> Self {
        Self {
            allow_glob: true,
            root_marker: true,
        }
    }
}

/// Turns a pattern written in a document into the URIs it names.
///
/// Implementations return matches ordered shallower first, then
/// lexicographically, and an empty list when nothing matches.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, base: &Url, pattern: &str, options: ResolveOptions) -> Vec<Url>;
}

/// Filesystem resolver.
#[derive(Debug, Clone, Default)]
pub struct FsPathResolver {
    workspace_root: Option<PathBuf>,
}

impl FsPathResolver {
    pub fn new(workspace_root: Option<PathBuf>) -> Self {
        Self { workspace_root }
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Directory a pattern is resolved against, and the pattern with any
    /// root marker stripped.
    fn anchor<'p>(&self, base: &Url, pattern: &'p str, options: ResolveOptions) -> Option<(PathBuf, &'p str)> {
        if options.root_marker {
            if let (Some(root), Some(stripped)) = (&self.workspace_root, pattern.strip_prefix('/')) {
                return Some((root.clone(), stripped));
            }
        }
        let base_path = base.to_file_path().ok()?;
        let dir = base_path.parent()?.to_path_buf();
        Some((dir, pattern))
    }
}

impl PathResolver for FsPathResolver {
    fn resolve(&self, base: &Url, pattern: &str, options: ResolveOptions) -> Vec<Url> {
        if pattern.is_empty() {
            log::trace!("Path resolution: empty pattern from {}", base);
            return Vec::new();
        }
        let Some((dir, pattern)) = self.anchor(base, pattern, options) else {
            log::trace!("Path resolution: no directory for {}", base);
            return Vec::new();
        };

        if !options.allow_glob || !is_glob(pattern) {
            return normalize_path(&dir.join(pattern))
                .filter(|p| p.is_file())
                .and_then(|p| path_to_uri(&p))
                .into_iter()
                .collect();
        }

        let (prefix, rest) = split_literal_prefix(pattern);
        let glob = match Glob::new(rest) {
            Ok(glob) => glob,
            Err(e) => {
                log::warn!("Ignoring invalid glob from {}: {}", base, e);
                return Vec::new();
            }
        };
        let Some(root) = normalize_path(&dir.join(prefix)) else {
            return Vec::new();
        };
        let mut matches = glob_files(&root, &glob);
        matches.sort_by(|a, b| {
            let depth = |p: &PathBuf| p.components().count();
            depth(a).cmp(&depth(b)).then_with(|| a.cmp(b))
        });
        log::trace!(
            "Resolved glob '{}' under {} to {} file(s)",
            pattern,
            root.display(),
            matches.len()
        );
        matches.iter().filter_map(|p| path_to_uri(p)).collect()
    }
}

/// Files under `root` whose `/`-separated relative path matches `glob`.
pub fn glob_files(root: &Path, glob: &Glob) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if let Some(depth) = glob.segment_count() {
        walker = walker.max_depth(depth);
    }
    walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = relative_slash_path(entry.path(), root)?;
            glob.is_match(&relative).then(|| entry.into_path())
        })
        .collect()
}

/// `path` relative to `root`, with `/` separators.
pub fn relative_slash_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(segments.join("/"))
}

/// Normalize a path by resolving `.` and `..` components lexically.
pub fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return None;
    }
    Some(components.iter().collect())
}

pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Url) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lib/deep")).unwrap();
        fs::write(root.join("main.m"), "").unwrap();
        fs::write(root.join("helpers.m"), "").unwrap();
        fs::write(root.join("lib/b.m"), "").unwrap();
        fs::write(root.join("lib/a.m"), "").unwrap();
        fs::write(root.join("lib/deep/c.m"), "").unwrap();
        fs::write(root.join("lib/notes.txt"), "").unwrap();
        let base = Url::from_file_path(root.join("main.m")).unwrap();
        (dir, base)
    }

    fn file_names(urls: &[Url]) -> Vec<String> {
        urls.iter()
            .map(|u| {
                let path = u.to_file_path().unwrap();
                path.file_name().unwrap().to_string_lossy().into_owned()
            })
            .collect()
    }

    #[test]
    fn test_exact_relative_path() {
        let (_dir, base) = setup();
        let resolver = FsPathResolver::default();
        let found = resolver.resolve(&base, "helpers.m", ResolveOptions::exact());
        assert_eq!(file_names(&found), vec!["helpers.m"]);
        assert!(resolver.resolve(&base, "missing.m", ResolveOptions::exact()).is_empty());
    }

    #[test]
    fn test_exact_does_not_expand_globs() {
        let (_dir, base) = setup();
        let resolver = FsPathResolver::default();
        assert!(resolver.resolve(&base, "lib/*.m", ResolveOptions::exact()).is_empty());
    }

    #[test]
    fn test_glob_sorted_shallow_first() {
        let (dir, base) = setup();
        let resolver = FsPathResolver::new(Some(dir.path().to_path_buf()));
        let found = resolver.resolve(&base, "lib/**/*.m", ResolveOptions::glob());
        assert_eq!(file_names(&found), vec!["a.m", "b.m", "c.m"]);

        let found = resolver.resolve(&base, "lib/*.m", ResolveOptions::glob());
        assert_eq!(file_names(&found), vec!["a.m", "b.m"]);
    }

    #[test]
    fn test_root_marker() {
        let (dir, _) = setup();
        let nested = Url::from_file_path(dir.path().join("lib/deep/c.m")).unwrap();
        let resolver = FsPathResolver::new(Some(dir.path().to_path_buf()));
        let found = resolver.resolve(&nested, "/helpers.m", ResolveOptions::glob());
        assert_eq!(file_names(&found), vec!["helpers.m"]);
    }

    #[test]
    fn test_parent_directory() {
        let (dir, _) = setup();
        let nested = Url::from_file_path(dir.path().join("lib/deep/c.m")).unwrap();
        let resolver = FsPathResolver::default();
        let found = resolver.resolve(&nested, "../a.m", ResolveOptions::exact());
        assert_eq!(file_names(&found), vec!["a.m"]);
    }

    #[test]
    fn test_invalid_glob_resolves_nothing() {
        let (_dir, base) = setup();
        let resolver = FsPathResolver::default();
        assert!(resolver.resolve(&base, "lib/[a.m", ResolveOptions::glob()).is_empty());
    }

    #[test]
    fn test_non_file_base() {
        let resolver = FsPathResolver::default();
        let base = Url::parse("untitled:Untitled-1").unwrap();
        assert!(resolver.resolve(&base, "x.m", ResolveOptions::exact()).is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d.m")),
            Some(PathBuf::from("/a/c/d.m"))
        );
        assert_eq!(normalize_path(Path::new("/..")), Some(PathBuf::from("/")));
    }
}
