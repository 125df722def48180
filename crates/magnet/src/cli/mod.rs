//
// cli/mod.rs
//
// One-shot commands run without the language server
//

pub mod analysis_stats;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tower_lsp::lsp_types::Url;

use crate::cross_file::path_resolve::path_to_uri;
use crate::cross_file::{inline_loads, FsPathResolver, FsTextSource, IndexConfig};
use crate::scanner::{scan_document, ScanContext, ScanResult};

/// Canonical URI for a path given on the command line.
pub fn file_uri(path: &Path) -> anyhow::Result<Url> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("cannot open {}", path.display()))?;
    path_to_uri(&absolute).ok_or_else(|| anyhow!("not a file path: {}", absolute.display()))
}

/// Scan one file the way the index would, with no other document loaded.
pub fn scan_file(path: &Path, workspace_root: Option<PathBuf>) -> anyhow::Result<ScanResult> {
    let uri = file_uri(path)?;
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let config = IndexConfig::default();
    let resolver = FsPathResolver::new(workspace_root);
    let ctx = ScanContext::new(&uri, &config, &resolver);
    Ok(scan_document(&ctx, &text))
}

/// `magnet symbols <file>`: the scan result as pretty JSON.
pub fn symbols(path: &Path) -> anyhow::Result<String> {
    let result = scan_file(path, None)?;
    Ok(serde_json::to_string_pretty(&result)?)
}

/// `magnet expand <file>`: the file with every `load` and `@require` inlined.
pub fn expand(path: &Path) -> anyhow::Result<String> {
    let uri = file_uri(path)?;
    let resolver = FsPathResolver::new(path.parent().map(Path::to_path_buf));
    let text = inline_loads(&uri, &FsTextSource, &resolver)?;
    Ok(text)
}
