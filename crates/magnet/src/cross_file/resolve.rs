//
// cross_file/resolve.rs
//
// Cross-file name resolution over the document cache
//
// The walk starts at the querying document, searches its scopes from the
// innermost outwards, then follows dependency edges most-recent-first. Each
// document or cell is visited at most once, so cyclic loads terminate.
//

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use tower_lsp::lsp_types::{Position, Url};

use super::scheduler::LoadScheduler;
use super::types::{Dependency, DependencyKind, DependencyLocation, DocumentCache};
use crate::definition::{position_le, scope_chain, Definition, DefinitionKind};
use crate::perf::TimingGuard;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Only `forward` declarations match.
    pub only_forward: bool,
}

/// A definition together with where it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolved {
    pub uri: Url,
    pub definition: Definition,
    /// The callable whose scope holds the definition; `None` at global scope.
    pub container: Option<Definition>,
}

/// One pending entry on the traversal stack.
struct Frame {
    cache: Arc<DocumentCache>,
    seed: bool,
}

/// Cache for the querying document: its cell cache inside a notebook.
pub async fn seed_cache(scheduler: &LoadScheduler, uri: &Url) -> Option<Arc<DocumentCache>> {
    if let Some(cell) = scheduler.notebooks().cell_cache(uri) {
        return Some(cell);
    }
    scheduler.ensure_loaded(uri).await
}

/// Visit every definition visible at `pos` in walk order until `visit` breaks.
async fn walk<F>(scheduler: &LoadScheduler, uri: &Url, pos: Position, options: LookupOptions, mut visit: F)
where
    F: FnMut(&Url, &Definition, Option<&Definition>) -> ControlFlow<()>,
{
    let Some(seed) = seed_cache(scheduler, uri).await else {
        log::trace!("No cache for {}; nothing visible", uri);
        return;
    };
    let wanted = |def: &Definition| !options.only_forward || def.kind == DefinitionKind::Forward;

    let mut stack = vec![Frame {
        cache: seed,
        seed: true,
    }];
    let mut visited: HashSet<Url> = HashSet::new();

    while let Some(frame) = stack.pop() {
        let cache = frame.cache;
        if !visited.insert(cache.uri.clone()) {
            continue;
        }

        if frame.seed {
            let chain = scope_chain(&cache.definitions, pos);
            for level in (0..=chain.len()).rev() {
                let (definitions, container) = match level.checked_sub(1) {
                    Some(i) => (chain[i].children.as_slice(), Some(chain[i])),
                    None => (cache.definitions.as_slice(), None),
                };
                for def in definitions.iter().rev() {
                    if def.enabled && def.is_before(pos) && wanted(def) {
                        if visit(&cache.uri, def, container).is_break() {
                            return;
                        }
                    }
                }
            }
        } else {
            for def in cache.definitions.iter().rev() {
                if !def.ignored && wanted(def) {
                    if visit(&cache.uri, def, None).is_break() {
                        return;
                    }
                }
            }
        }

        // pushed in file order so the latest dependency is popped first
        for dependency in &cache.dependencies {
            if frame.seed && !position_le(dependency.loads_at, pos) {
                continue;
            }
            if let Some(next) = dependency_cache(scheduler, &cache, dependency).await {
                if !visited.contains(&next.uri) {
                    stack.push(Frame {
                        cache: next,
                        seed: false,
                    });
                }
            }
        }
    }
}

async fn dependency_cache(
    scheduler: &LoadScheduler,
    from: &DocumentCache,
    dependency: &Dependency,
) -> Option<Arc<DocumentCache>> {
    match &dependency.location {
        DependencyLocation::File(target) => scheduler.ensure_loaded(target).await,
        location => {
            let notebook = scheduler.notebooks().notebook_of(&from.uri)?;
            notebook.resolve(location).map(|cell| cell.cache.clone())
        }
    }
}

/// The definition `name` resolves to at `pos`, or `None`.
pub async fn find_definition(
    scheduler: &LoadScheduler,
    uri: &Url,
    pos: Position,
    name: &str,
    options: LookupOptions,
) -> Option<Resolved> {
    let _timing = TimingGuard::with_threshold("find_definition", 100);
    let mut found = None;
    walk(scheduler, uri, pos, options, |at, def, container| {
        if def.name != name {
            return ControlFlow::Continue(());
        }
        found = Some(Resolved {
            uri: at.clone(),
            definition: def.clone(),
            container: container.cloned(),
        });
        ControlFlow::Break(())
    })
    .await;
    found
}

/// Every definition visible at `pos`, in walk order.
///
/// With `dedup`, only the first definition of each name is kept.
pub async fn list_visible_definitions(
    scheduler: &LoadScheduler,
    uri: &Url,
    pos: Position,
    dedup: bool,
) -> Vec<Resolved> {
    let _timing = TimingGuard::with_threshold("list_visible_definitions", 100);
    let mut seen: HashSet<String> = HashSet::new();
    let mut visible = Vec::new();
    walk(scheduler, uri, pos, LookupOptions::default(), |at, def, container| {
        if !dedup || seen.insert(def.name.clone()) {
            visible.push(Resolved {
                uri: at.clone(),
                definition: def.clone(),
                container: container.cloned(),
            });
        }
        ControlFlow::Continue(())
    })
    .await;
    visible
}

/// The `load` / `@require` / `@use` dependency whose range covers `pos`.
pub async fn find_dependency_at_position(
    scheduler: &LoadScheduler,
    uri: &Url,
    pos: Position,
) -> Option<Dependency> {
    let cache = seed_cache(scheduler, uri).await?;
    cache
        .dependencies
        .iter()
        .filter(|d| d.kind != DependencyKind::Export)
        .find(|d| position_le(d.range.start, pos) && position_le(pos, d.range.end))
        .cloned()
}

/// Parameters of an implementation paired with its forward declaration.
///
/// Documented local parameters win; undocumented ones take the forward's
/// documentation for the same name. Forward parameters the implementation
/// does not list are appended.
pub fn merge_parameters(implementation: &Definition, forward: &Definition) -> Vec<Definition> {
    let mut merged: Vec<Definition> = implementation
        .parameters()
        .map(|local| {
            if !local.documentation.is_empty() {
                return local.clone();
            }
            match forward.parameters().find(|f| f.name == local.name) {
                Some(declared) => Definition {
                    documentation: declared.documentation.clone(),
                    ..local.clone()
                },
                None => local.clone(),
            }
        })
        .collect();
    for declared in forward.parameters() {
        if !merged.iter().any(|p| p.name == declared.name) {
            merged.push(declared.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_file::config::IndexConfig;
    use crate::cross_file::scheduler::Collaborators;
    use crate::cross_file::watcher::NullWatcher;
    use crate::document_store::DocumentStore;
    use crate::render::PlainRenderer;
    use crate::test_utils::MemoryWorkspace;
    use tower_lsp::lsp_types::Range;

    fn scheduler(ws: &Arc<MemoryWorkspace>) -> Arc<LoadScheduler> {
        scheduler_with(ws, IndexConfig::default())
    }

    fn scheduler_with(ws: &Arc<MemoryWorkspace>, config: IndexConfig) -> Arc<LoadScheduler> {
        LoadScheduler::new(
            config,
            Arc::new(DocumentStore::new()),
            Collaborators {
                text: ws.clone(),
                resolver: ws.clone(),
                watcher: Arc::new(NullWatcher),
                renderer: Arc::new(PlainRenderer),
            },
            None,
        )
    }

    async fn find(s: &LoadScheduler, uri: &Url, line: u32, col: u32, name: &str) -> Option<Resolved> {
        find_definition(s, uri, Position::new(line, col), name, LookupOptions::default()).await
    }

    #[tokio::test]
    async fn test_declaration_order_in_seed() {
        let ws = Arc::new(MemoryWorkspace::new());
        let a = ws.add("a.m", "y := x;\nx := 1;\nz := x;\n");
        let s = scheduler(&ws);
        assert!(find(&s, &a, 0, 5, "x").await.is_none());
        let found = find(&s, &a, 2, 5, "x").await.unwrap();
        assert_eq!(found.definition.name_range.start.line, 1);
    }

    #[tokio::test]
    async fn test_innermost_scope_first() {
        let ws = Arc::new(MemoryWorkspace::new());
        let text = "x := 1;\nfunction F(a)\n  x := a;\n  return x;\nend function;\ny := x;\n";
        let a = ws.add("a.m", text);
        let s = scheduler(&ws);

        let local = find(&s, &a, 3, 9, "x").await.unwrap();
        assert_eq!(local.definition.name_range.start.line, 2);
        assert_eq!(local.container.as_ref().map(|c| c.name.as_str()), Some("F"));
        let param = find(&s, &a, 3, 9, "a").await.unwrap();
        assert!(param.definition.is_parameter);

        let global = find(&s, &a, 5, 5, "x").await.unwrap();
        assert_eq!(global.definition.name_range.start.line, 0);
        assert!(find(&s, &a, 5, 5, "a").await.is_none());
    }

    #[tokio::test]
    async fn test_later_load_wins() {
        let ws = Arc::new(MemoryWorkspace::new());
        ws.add("one.m", "f := 1;\n");
        let two = ws.add("two.m", "f := 2;\n");
        let main = ws.add("main.m", "load \"one.m\";\nload \"two.m\";\ny := f;\n");
        let s = scheduler(&ws);
        let found = find(&s, &main, 2, 5, "f").await.unwrap();
        assert_eq!(found.uri, two);
    }

    #[tokio::test]
    async fn test_load_after_position_is_not_in_effect() {
        let ws = Arc::new(MemoryWorkspace::new());
        ws.add("lib.m", "helper := 1;\n");
        let main = ws.add("main.m", "y := helper;\nload \"lib.m\";\nz := helper;\n");
        let s = scheduler(&ws);
        assert!(find(&s, &main, 0, 6, "helper").await.is_none());
        assert!(find(&s, &main, 2, 6, "helper").await.is_some());
    }

    #[tokio::test]
    async fn test_ignored_definitions_hidden_from_dependents() {
        let ws = Arc::new(MemoryWorkspace::new());
        let lib = ws.add("lib.m", "// @ignore\nsecret := 1;\n");
        let main = ws.add("main.m", "load \"lib.m\";\nx := secret;\n");
        let s = scheduler(&ws);
        assert!(find(&s, &main, 1, 6, "secret").await.is_none());
        assert!(find(&s, &lib, 2, 0, "secret").await.is_some());
    }

    #[tokio::test]
    async fn test_only_documented_filters_the_querying_document_only() {
        let ws = Arc::new(MemoryWorkspace::new());
        let lib = ws.add("lib.m", "function Helper(a)\n  return a;\nend function;\n");
        let main = ws.add(
            "main.m",
            "load \"lib.m\";\nx := Helper(1);\nfunction Local()\nend function;\ny := Local();\n",
        );
        let config = IndexConfig {
            only_documented: true,
            ..IndexConfig::default()
        };
        let s = scheduler_with(&ws, config);

        let helper = find(&s, &main, 1, 7, "Helper").await.unwrap();
        assert_eq!(helper.uri, lib);
        assert!(!helper.definition.enabled);
        assert!(find(&s, &main, 4, 7, "Local").await.is_none());

        let visible = list_visible_definitions(&s, &main, Position::new(4, 0), true).await;
        assert!(visible.iter().any(|r| r.definition.name == "Helper"));
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let ws = Arc::new(MemoryWorkspace::new());
        let a = ws.add("a.m", "load \"b.m\";\nx := 1;\n");
        ws.add("b.m", "load \"a.m\";\ny := 1;\n");
        let s = scheduler(&ws);
        assert!(find(&s, &a, 2, 0, "nothing").await.is_none());
        assert!(find(&s, &a, 2, 0, "y").await.is_some());
    }

    #[tokio::test]
    async fn test_list_visible_dedup() {
        let ws = Arc::new(MemoryWorkspace::new());
        ws.add("lib.m", "x := 1;\nh := 2;\n");
        let main = ws.add("main.m", "load \"lib.m\";\nx := 3;\n");
        let s = scheduler(&ws);
        let all = list_visible_definitions(&s, &main, Position::new(2, 0), false).await;
        let names: Vec<&str> = all.iter().map(|r| r.definition.name.as_str()).collect();
        assert_eq!(names, vec!["x", "h", "x"]);
        let dedup = list_visible_definitions(&s, &main, Position::new(2, 0), true).await;
        assert_eq!(dedup.len(), 2);
        assert_eq!(dedup[0].uri, main);
    }

    #[tokio::test]
    async fn test_dependency_at_position() {
        let ws = Arc::new(MemoryWorkspace::new());
        let lib = ws.add("lib.m", "");
        let main = ws.add("main.m", "load \"lib.m\";\n");
        let s = scheduler(&ws);
        let dep = find_dependency_at_position(&s, &main, Position::new(0, 7)).await.unwrap();
        assert_eq!(dep.file_uri(), Some(&lib));
        assert!(find_dependency_at_position(&s, &main, Position::new(0, 1)).await.is_none());
    }

    #[test]
    fn test_merge_parameters() {
        let range = Range::default();
        let mut forward = Definition::new("F", DefinitionKind::Forward, range);
        forward.children = vec![
            Definition::parameter("a", "from forward", range),
            Definition::parameter("b", "b from forward", range),
            Definition::parameter("c", "only declared", range),
        ];
        let mut implementation = Definition::new("F", DefinitionKind::Function, range);
        implementation.children = vec![
            Definition::parameter("a", "", range),
            Definition::parameter("b", "local", range),
        ];
        let merged = merge_parameters(&implementation, &forward);
        let docs: Vec<(&str, &str)> = merged
            .iter()
            .map(|p| (p.name.as_str(), p.documentation.as_str()))
            .collect();
        assert_eq!(
            docs,
            vec![("a", "from forward"), ("b", "local"), ("c", "only declared")]
        );
    }
}
