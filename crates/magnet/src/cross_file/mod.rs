//
// cross_file/mod.rs
//
// Cross-file index: document cache, load scheduling and name resolution
//

pub mod cache;
pub mod config;
pub mod content_provider;
pub mod export_map;
pub mod glob;
pub mod include;
pub mod notebook;
pub mod path_resolve;
pub mod resolve;
pub mod revalidation;
pub mod scheduler;
pub mod types;
pub mod watcher;

pub use cache::{CacheState, DocumentCacheStore};
pub use config::{IndexConfig, Suppression};
pub use content_provider::{FsTextSource, ReadError, TextSource};
pub use export_map::{ExportMap, ExportPattern};
pub use include::{inline_loads, IncludeError};
pub use notebook::{CellKind, CellText, NotebookCache, NotebookStore};
pub use path_resolve::{FsPathResolver, PathResolver, ResolveOptions};
pub use resolve::{
    find_definition, find_dependency_at_position, list_visible_definitions, merge_parameters,
    LookupOptions, Resolved,
};
pub use revalidation::DebounceState;
pub use scheduler::{Collaborators, IndexEvent, LoadScheduler};
pub use types::{Dependency, DependencyKind, DependencyLocation, DocumentCache};
pub use watcher::{FileWatcher, NotifyWatcher, NullWatcher};
