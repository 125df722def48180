// cli/analysis_stats.rs — `magnet analysis-stats` subcommand
//
// Indexes a directory and reports timing for each phase:
//   1. discover — finding source files
//   2. scan     — scanning every file on its own
//   3. resolve  — loading files through the scheduler and listing what is
//                 visible at the end of each one

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tower_lsp::lsp_types::{Position, Url};
use walkdir::WalkDir;

use crate::cross_file::path_resolve::path_to_uri;
use crate::cross_file::{
    list_visible_definitions, Collaborators, FsPathResolver, FsTextSource, IndexConfig,
    LoadScheduler, NullWatcher,
};
use crate::document_store::DocumentStore;
use crate::perf::TimingGuard;
use crate::render::PlainRenderer;
use crate::scanner::{scan_document, ScanContext};

#[derive(Debug)]
pub struct AnalysisStatsArgs {
    pub path: PathBuf,
    pub csv: bool,
    pub only: Option<String>,
}

pub struct PhaseResult {
    pub name: String,
    pub duration: Duration,
    pub detail: String,
}

const VALID_PHASES: &[&str] = &["discover", "scan", "resolve"];

/// Extensions treated as source files.
const SOURCE_EXTENSIONS: &[&str] = &["m", "mag", "magma"];

/// Parse `analysis-stats` arguments.
///
/// Expected usage: `magnet analysis-stats <path> [--csv] [--only <phase>]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<AnalysisStatsArgs, String> {
    let mut path: Option<PathBuf> = None;
    let mut csv = false;
    let mut only: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--csv" => csv = true,
            "--only" => {
                let phase = args
                    .next()
                    .ok_or_else(|| "--only requires a phase name".to_string())?;
                if !VALID_PHASES.contains(&phase.as_str()) {
                    return Err(format!(
                        "Unknown phase '{}'. Valid phases: {}",
                        phase,
                        VALID_PHASES.join(", ")
                    ));
                }
                only = Some(phase);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if path.is_some() {
                    return Err("Multiple paths provided; expected exactly one".to_string());
                }
                path = Some(PathBuf::from(arg));
            }
        }
    }

    let path = path.ok_or_else(|| "Missing required <path> argument".to_string())?;
    if !path.exists() {
        return Err(format!("Path does not exist: {}", path.display()));
    }

    Ok(AnalysisStatsArgs { path, csv, only })
}

pub async fn run_analysis_stats(args: &AnalysisStatsArgs) -> Vec<PhaseResult> {
    let mut results = Vec::new();
    let should_run = |phase: &str| args.only.as_ref().map_or(true, |only| only == phase);
    let root = args.path.canonicalize().unwrap_or_else(|_| args.path.clone());
    let config = IndexConfig {
        watch_files: false,
        ..IndexConfig::default()
    };

    let start = Instant::now();
    let files = {
        let _guard = TimingGuard::new("analysis-stats:discover");
        discover_source_files(&root)
    };
    if should_run("discover") {
        results.push(PhaseResult {
            name: "discover".to_string(),
            duration: start.elapsed(),
            detail: format!("{} files", files.len()),
        });
    }

    if should_run("scan") {
        let _guard = TimingGuard::new("analysis-stats:scan");
        let start = Instant::now();
        let resolver = FsPathResolver::new(Some(root.clone()));
        let (mut definitions, mut dependencies, mut diagnostics) = (0usize, 0usize, 0usize);
        for (uri, text) in &files {
            let ctx = ScanContext::new(uri, &config, &resolver);
            let result = scan_document(&ctx, text);
            definitions += result.definitions.len();
            dependencies += result.dependencies.len();
            diagnostics += result.diagnostics.len();
        }
        results.push(PhaseResult {
            name: "scan".to_string(),
            duration: start.elapsed(),
            detail: format!(
                "{} files, {} top-level definitions, {} dependencies, {} diagnostics",
                files.len(),
                definitions,
                dependencies,
                diagnostics
            ),
        });
    }

    if should_run("resolve") {
        let _guard = TimingGuard::new("analysis-stats:resolve");
        let start = Instant::now();
        let scheduler = LoadScheduler::new(
            config.clone(),
            Arc::new(DocumentStore::new()),
            Collaborators {
                text: Arc::new(FsTextSource),
                resolver: Arc::new(FsPathResolver::new(Some(root.clone()))),
                watcher: Arc::new(NullWatcher),
                renderer: Arc::new(PlainRenderer),
            },
            None,
        );
        let end = Position::new(u32::MAX, 0);
        let mut visible = 0usize;
        for (uri, _) in &files {
            visible += list_visible_definitions(&scheduler, uri, end, true).await.len();
        }
        results.push(PhaseResult {
            name: "resolve".to_string(),
            duration: start.elapsed(),
            detail: format!(
                "{} files, {} cached, {} visible names",
                files.len(),
                scheduler.cache().len(),
                visible
            ),
        });
    }

    results
}

pub fn print_results(results: &[PhaseResult]) {
    println!("=== Magnet Analysis Stats ===\n");
    for result in results {
        println!(
            "  {:<10} {:>10.2?}   ({})",
            result.name, result.duration, result.detail
        );
    }

    if results.len() > 1 {
        let total: Duration = results.iter().map(|r| r.duration).sum();
        println!("\n  {:<10} {:>10.2?}", "TOTAL", total);
    }
    println!();
}

pub fn print_results_csv(results: &[PhaseResult]) {
    println!("phase,duration_ms,detail");
    for result in results {
        println!("{}", csv_row(result));
    }
}

fn csv_row(result: &PhaseResult) -> String {
    format!(
        "{},{:.3},\"{}\"",
        result.name,
        result.duration.as_secs_f64() * 1000.0,
        result.detail.replace('"', "\"\"")
    )
}

/// Source files under `root` with their text, sorted by path.
fn discover_source_files(root: &Path) -> Vec<(Url, String)> {
    let mut files: Vec<(PathBuf, String)> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_type().is_dir() || !should_skip_directory(&e.file_name().to_string_lossy())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
        .filter_map(|e| {
            let text = std::fs::read_to_string(e.path()).ok()?;
            Some((e.into_path(), text))
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
        .into_iter()
        .filter_map(|(path, text)| Some((path_to_uri(&path)?, text)))
        .collect()
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

fn should_skip_directory(name: &str) -> bool {
    matches!(
        name,
        ".git" | ".svn" | ".hg" | "node_modules" | ".vscode" | ".idea" | "target"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_basic() {
        let mut args = vec![".".to_string()].into_iter();
        let result = parse_args(&mut args).unwrap();
        assert_eq!(result.path, PathBuf::from("."));
        assert!(!result.csv);
        assert!(result.only.is_none());
    }

    #[test]
    fn test_parse_args_all_flags() {
        let mut args = vec![
            ".".to_string(),
            "--csv".to_string(),
            "--only".to_string(),
            "resolve".to_string(),
        ]
        .into_iter();
        let result = parse_args(&mut args).unwrap();
        assert!(result.csv);
        assert_eq!(result.only.as_deref(), Some("resolve"));
    }

    #[test]
    fn test_parse_args_errors() {
        let err = parse_args(&mut vec!["--csv".to_string()].into_iter()).unwrap_err();
        assert!(err.contains("Missing required <path>"));

        let err = parse_args(&mut vec![".".into(), "--only".into(), "parse".into()].into_iter()).unwrap_err();
        assert!(err.contains("Unknown phase"));

        let err = parse_args(&mut vec![".".into(), "--only".into()].into_iter()).unwrap_err();
        assert!(err.contains("--only requires a phase name"));

        let err = parse_args(&mut vec![".".into(), "--unknown".into()].into_iter()).unwrap_err();
        assert!(err.contains("Unknown flag"));
    }

    #[test]
    fn test_source_file_filter() {
        assert!(is_source_file(Path::new("a.m")));
        assert!(is_source_file(Path::new("lib/b.MAG")));
        assert!(!is_source_file(Path::new("notes.txt")));
        assert!(should_skip_directory(".git"));
        assert!(!should_skip_directory("lib"));
    }

    #[tokio::test]
    async fn test_run_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: false,
            only: None,
        };
        let results = run_analysis_stats(&args).await;
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, VALID_PHASES);
    }

    #[tokio::test]
    async fn test_run_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.m"), "load \"lib.m\";\nx := f(1);\n").unwrap();
        std::fs::write(dir.path().join("lib.m"), "f := func< n | n >;\n").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("skip.m"), "y := 1;\n").unwrap();

        let args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: true,
            only: None,
        };
        let results = run_analysis_stats(&args).await;
        assert!(results[0].detail.contains("2 files"));
        assert!(results[1].detail.contains("2 top-level definitions"));
        // main.m sees x and f; lib.m sees f
        assert!(results[2].detail.contains("3 visible names"));
    }

    #[tokio::test]
    async fn test_only_one_phase() {
        let dir = tempfile::tempdir().unwrap();
        let args = AnalysisStatsArgs {
            path: dir.path().to_path_buf(),
            csv: false,
            only: Some("scan".to_string()),
        };
        let results = run_analysis_stats(&args).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "scan");
    }

    #[test]
    fn test_csv_row_escapes_quotes() {
        let row = csv_row(&PhaseResult {
            name: "scan".to_string(),
            duration: Duration::from_millis(10),
            detail: "say \"hi\"".to_string(),
        });
        assert_eq!(row, "scan,10.000,\"say \"\"hi\"\"\"");
    }
}
