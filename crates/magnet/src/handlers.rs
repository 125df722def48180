//
// handlers.rs
//
// Editor queries answered from the index: hover, go to definition and completion
//

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionResponse, Documentation, GotoDefinitionResponse,
    Hover, HoverContents, Location, MarkupContent, MarkupKind, Position, Range, Url,
};

use crate::cross_file::resolve::{self, merge_parameters, LookupOptions, Resolved};
use crate::cross_file::types::{Dependency, DependencyKind, DependencyLocation};
use crate::definition::{Definition, DefinitionKind};
use crate::state::WorldState;
use crate::utf16::{byte_offset_to_utf16_column, utf16_column_to_byte_offset};

/// Identifier under the cursor and its range. `'quoted names'` are unquoted.
pub fn word_at(line: &str, line_number: u32, character: u32) -> Option<(String, Range)> {
    let byte = utf16_column_to_byte_offset(line, character);
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';

    // inside a quoted name
    let before_quote = line[..byte].rfind('\'');
    if let Some(open) = before_quote {
        if line[..open].matches('\'').count() % 2 == 0 {
            if let Some(len) = line[open + 1..].find('\'') {
                let close = open + 1 + len;
                if byte <= close && len > 0 {
                    let range = Range::new(
                        Position::new(line_number, byte_offset_to_utf16_column(line, open)),
                        Position::new(line_number, byte_offset_to_utf16_column(line, close + 1)),
                    );
                    return Some((line[open + 1..close].to_string(), range));
                }
            }
        }
    }

    let start = line[..byte]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident(*c))
        .last()
        .map_or(byte, |(i, _)| i);
    let end = line[byte..]
        .char_indices()
        .find(|(_, c)| !is_ident(*c))
        .map_or(line.len(), |(i, _)| byte + i);
    if start == end {
        return None;
    }
    let word = &line[start..end];
    if word.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let range = Range::new(
        Position::new(line_number, byte_offset_to_utf16_column(line, start)),
        Position::new(line_number, byte_offset_to_utf16_column(line, end)),
    );
    Some((word.to_string(), range))
}

/// The definition `name` resolves to at `position`.
pub async fn find_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
    name: &str,
    only_forward: bool,
) -> Option<Resolved> {
    resolve::find_definition(
        state.scheduler(),
        uri,
        position,
        name,
        LookupOptions { only_forward },
    )
    .await
}

pub async fn list_visible_definitions(
    state: &WorldState,
    uri: &Url,
    position: Position,
    dedup: bool,
) -> Vec<Resolved> {
    resolve::list_visible_definitions(state.scheduler(), uri, position, dedup).await
}

pub async fn find_dependency_at_position(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<Dependency> {
    resolve::find_dependency_at_position(state.scheduler(), uri, position).await
}

/// Resolve the identifier at `position`.
pub async fn definition_at(state: &WorldState, uri: &Url, position: Position) -> Option<(Resolved, Range)> {
    let line = state.line_text(uri, position.line)?;
    let (name, range) = word_at(&line, position.line, position.character)?;
    let resolved = find_definition(state, uri, position, &name, false).await?;
    Some((resolved, range))
}

pub async fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    if let Some(dependency) = find_dependency_at_position(state, uri, position).await {
        let value = dependency_hover(state, &dependency).await;
        return Some(markdown_hover(value, Some(dependency.range)));
    }

    let (resolved, range) = definition_at(state, uri, position).await?;
    let mut definition = resolved.definition;
    if matches!(definition.kind, DefinitionKind::Function | DefinitionKind::Procedure) {
        let forward = find_definition(state, uri, position, &definition.name, true).await;
        if let Some(forward) = forward {
            pair_with_forward(&mut definition, &forward.definition);
        }
    }
    Some(markdown_hover(render_definition(&definition), Some(range)))
}

/// Fill in documentation an implementation leaves to its forward declaration.
fn pair_with_forward(implementation: &mut Definition, forward: &Definition) {
    let parameters = merge_parameters(implementation, forward);
    implementation.children.retain(|c| !c.is_parameter);
    implementation.children.splice(0..0, parameters);
    if implementation.documentation.is_empty() {
        implementation.documentation = forward.documentation.clone();
    }
}

fn markdown_hover(value: String, range: Option<Range>) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range,
    }
}

/// Markdown shown on hover and in completion documentation.
pub fn render_definition(definition: &Definition) -> String {
    let header = match &definition.signature {
        Some(signature) => signature.clone(),
        None if definition.is_parameter => format!("(parameter) {}", definition.name),
        None => definition.name.clone(),
    };
    let mut sections = vec![format!("```magma\n{}\n```", header)];
    if !definition.documentation.is_empty() {
        sections.push(definition.documentation.clone());
    }
    let params: Vec<String> = definition
        .parameters()
        .filter(|p| !p.documentation.is_empty())
        .map(|p| format!("*@param* `{}` {}", p.name, p.documentation))
        .collect();
    if !params.is_empty() {
        sections.push(params.join("\n\n"));
    }
    sections.join("\n\n")
}

async fn dependency_hover(state: &WorldState, dependency: &Dependency) -> String {
    let verb = match dependency.kind {
        DependencyKind::Load => "load",
        DependencyKind::Require => "require",
        DependencyKind::Export => "export",
        DependencyKind::Use => "use",
    };
    match &dependency.location {
        DependencyLocation::File(target) => {
            let shown = target
                .to_file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| target.to_string());
            let mut value = format!("**{}** `{}`", verb, shown);
            if let Some(cache) = state.scheduler().ensure_loaded(target).await {
                if !cache.documentation.is_empty() {
                    value.push_str("\n\n");
                    value.push_str(&cache.documentation);
                }
            }
            value
        }
        DependencyLocation::CellIndex(index) => format!("**{}** cell {}", verb, index),
        DependencyLocation::CellId(id) => format!("**{}** cell `{}`", verb, id),
    }
}

pub async fn goto_definition(state: &WorldState, uri: &Url, position: Position) -> Option<GotoDefinitionResponse> {
    if let Some(dependency) = find_dependency_at_position(state, uri, position).await {
        if let Some(target) = dependency.file_uri() {
            return Some(GotoDefinitionResponse::Scalar(Location::new(
                target.clone(),
                Range::default(),
            )));
        }
    }
    let (resolved, _) = definition_at(state, uri, position).await?;
    Some(GotoDefinitionResponse::Scalar(Location::new(
        resolved.uri,
        resolved.definition.name_range,
    )))
}

/// Every visible definition; priority definitions sort first.
pub async fn completion(state: &WorldState, uri: &Url, position: Position) -> Option<CompletionResponse> {
    let visible = list_visible_definitions(state, uri, position, true).await;
    let items = visible
        .into_iter()
        .map(|resolved| completion_item(&resolved.definition))
        .collect();
    Some(CompletionResponse::Array(items))
}

fn completion_item(definition: &Definition) -> CompletionItem {
    let kind = match definition.kind {
        DefinitionKind::Function | DefinitionKind::Procedure | DefinitionKind::Forward => {
            CompletionItemKind::FUNCTION
        }
        DefinitionKind::Variable => CompletionItemKind::VARIABLE,
    };
    let rank = if definition.has_priority { "0" } else { "1" };
    CompletionItem {
        label: definition.name.clone(),
        kind: Some(kind),
        detail: definition.signature.clone(),
        documentation: Some(Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: render_definition(definition),
        })),
        sort_text: Some(format!("{}_{}", rank, definition.name)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_file::config::IndexConfig;
    use crate::cross_file::scheduler::Collaborators;
    use crate::cross_file::watcher::NullWatcher;
    use crate::render::PlainRenderer;
    use crate::test_utils::MemoryWorkspace;
    use std::sync::Arc;

    fn state(ws: &Arc<MemoryWorkspace>) -> WorldState {
        WorldState::new(
            IndexConfig::default(),
            Collaborators {
                text: ws.clone(),
                resolver: ws.clone(),
                watcher: Arc::new(NullWatcher),
                renderer: Arc::new(PlainRenderer),
            },
            None,
        )
    }

    fn hover_text(hover: &Hover) -> &str {
        match &hover.contents {
            HoverContents::Markup(markup) => &markup.value,
            _ => "",
        }
    }

    #[test]
    fn test_word_at() {
        assert_eq!(word_at("y := foo(x);", 0, 6).unwrap().0, "foo");
        assert_eq!(word_at("y := foo(x);", 0, 8).unwrap().0, "foo");
        assert!(word_at("y := 12;", 0, 6).is_none());
        assert!(word_at("y := foo(x);", 0, 4).is_none());
        let (name, range) = word_at("z := 'odd name'(1);", 0, 8).unwrap();
        assert_eq!(name, "odd name");
        assert_eq!((range.start.character, range.end.character), (5, 15));
    }

    #[tokio::test]
    async fn test_hover_shows_signature_and_params() {
        let ws = Arc::new(MemoryWorkspace::new());
        let text = "/**\n * Adds one.\n * @param {RngIntElt} n the input\n */\nfunction Inc(n)\n  return n + 1;\nend function;\ny := Inc(2);\n";
        let uri = ws.uri("a.m");
        let state = state(&ws);
        state.on_document_opened(uri.clone(), text.into(), None).await.unwrap();

        let hover = hover(&state, &uri, Position::new(7, 6)).await.unwrap();
        let value = hover_text(&hover);
        assert!(value.starts_with("```magma\nfunction Inc(n)\n```"));
        assert!(value.contains("Adds one."));
        assert!(value.contains("*@param* `n` the input"));
    }

    #[tokio::test]
    async fn test_hover_uses_forward_documentation() {
        let ws = Arc::new(MemoryWorkspace::new());
        let text = "/**\n * Declared early.\n * @param x the value\n */\nforward F;\nfunction F(x)\n  return x;\nend function;\nz := F(1);\n";
        let uri = ws.uri("a.m");
        let state = state(&ws);
        state.on_document_opened(uri.clone(), text.into(), None).await.unwrap();
        let hover = hover(&state, &uri, Position::new(8, 5)).await.unwrap();
        let value = hover_text(&hover);
        assert!(value.contains("Declared early."));
        assert!(value.contains("*@param* `x` the value"));
    }

    #[tokio::test]
    async fn test_goto_definition_across_files() {
        let ws = Arc::new(MemoryWorkspace::new());
        let lib = ws.add("lib.m", "\nhelper := 1;\n");
        let uri = ws.uri("main.m");
        let state = state(&ws);
        state
            .on_document_opened(uri.clone(), "load \"lib.m\";\nx := helper;\n".into(), None)
            .await
            .unwrap();

        match goto_definition(&state, &uri, Position::new(1, 7)).await {
            Some(GotoDefinitionResponse::Scalar(location)) => {
                assert_eq!(location.uri, lib);
                assert_eq!(location.range.start, Position::new(1, 0));
            }
            other => panic!("unexpected {:?}", other),
        }
        match goto_definition(&state, &uri, Position::new(0, 8)).await {
            Some(GotoDefinitionResponse::Scalar(location)) => assert_eq!(location.uri, lib),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completion_sorts_priority_first() {
        let ws = Arc::new(MemoryWorkspace::new());
        let uri = ws.uri("a.m");
        let state = state(&ws);
        state
            .on_document_opened(uri.clone(), "alpha := 1;\n// @priority\nzeta := 2;\n".into(), None)
            .await
            .unwrap();
        let Some(CompletionResponse::Array(items)) = completion(&state, &uri, Position::new(3, 0)).await else {
            panic!("expected completion items");
        };
        let mut sorted: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.sort_text.as_deref().unwrap_or(""), i.label.as_str()))
            .collect();
        sorted.sort();
        assert_eq!(sorted[0].1, "zeta");
        assert_eq!(sorted[1].1, "alpha");
    }

    #[tokio::test]
    async fn test_dependency_hover() {
        let ws = Arc::new(MemoryWorkspace::new());
        ws.add("lib.m", "/**\n * @file Shared helpers.\n */\nh := 1;\n");
        let uri = ws.uri("main.m");
        let state = state(&ws);
        state
            .on_document_opened(uri.clone(), "load \"lib.m\";\n".into(), None)
            .await
            .unwrap();
        let hover = hover(&state, &uri, Position::new(0, 7)).await.unwrap();
        let value = hover_text(&hover);
        assert!(value.starts_with("**load**"));
        assert!(value.contains("Shared helpers."));
    }
}
