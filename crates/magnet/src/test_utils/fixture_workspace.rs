//! On-disk workspaces for tests and benchmarks.
//!
//! `TestWorkspace` is a scratch directory for hand-written files;
//! `create_fixture_workspace` generates a deterministic synthetic project
//! with a chain of `load` statements, documented functions and plain
//! assignments.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tower_lsp::lsp_types::Url;

/// Scratch directory removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp workspace"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn uri(&self, relative: &str) -> Url {
        Url::from_file_path(self.path(relative)).expect("temp paths are absolute")
    }

    /// Write a file, creating parent directories, and return its URI.
    pub fn write(&self, relative: &str, text: &str) -> Url {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        std::fs::write(&path, text).expect("failed to write fixture file");
        self.uri(relative)
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub functions_per_file: usize,
    /// `file_i.m` loads `file_{i+1}.m` for `i` below this depth.
    pub load_chain_depth: usize,
    pub extra_lines_per_file: usize,
}

impl FixtureConfig {
    pub fn small() -> Self {
        Self {
            file_count: 10,
            functions_per_file: 5,
            load_chain_depth: 3,
            extra_lines_per_file: 5,
        }
    }

    pub fn medium() -> Self {
        Self {
            file_count: 50,
            functions_per_file: 10,
            load_chain_depth: 10,
            extra_lines_per_file: 10,
        }
    }

    pub fn large() -> Self {
        Self {
            file_count: 200,
            functions_per_file: 20,
            load_chain_depth: 15,
            extra_lines_per_file: 20,
        }
    }
}

/// Text of `file_{index}.m`.
pub fn generate_file_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();

    if index < config.load_chain_depth && index + 1 < config.file_count {
        writeln!(content, "load \"file_{}.m\";", index + 1).unwrap();
        content.push('\n');
    }

    for f in 0..config.functions_per_file {
        writeln!(content, "/**").unwrap();
        writeln!(content, " * Scales by {}.", f + 1).unwrap();
        writeln!(content, " * @param {{RngIntElt}} x value").unwrap();
        writeln!(content, " */").unwrap();
        writeln!(content, "function func_{}_{}(x, y)", index, f).unwrap();
        writeln!(content, "    result := x + y * {};", f + 1).unwrap();
        writeln!(content, "    a, _, b := Explode([result, 0, 1]);").unwrap();
        writeln!(content, "    return result;").unwrap();
        writeln!(content, "end function;").unwrap();
        content.push('\n');
    }

    for line in 0..config.extra_lines_per_file {
        writeln!(content, "var_{}_{} := {};", index, line, line + 1).unwrap();
    }

    content
}

pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let dir = TempDir::new().expect("failed to create fixture workspace");
    write_fixture_workspace(dir.path(), config);
    dir
}

pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let filename = format!("file_{}.m", i);
        std::fs::write(dir.join(&filename), generate_file_content(i, config))
            .unwrap_or_else(|e| panic!("failed to write fixture file {}: {}", filename, e));
    }
}
