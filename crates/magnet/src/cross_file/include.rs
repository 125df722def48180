//
// cross_file/include.rs
//
// Eager inclusion: replace `load "...";` statements and `// @require`
// directives with the text they bring in
//

use tower_lsp::lsp_types::Url;

use super::content_provider::{ReadError, TextSource};
use super::path_resolve::{PathResolver, ResolveOptions};
use crate::scanner::patterns::patterns;

#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("no file matches '{pattern}' (loaded from {from})")]
    NotFound { pattern: String, from: Url },
    #[error("'{pattern}' matches {} files; exactly one is required", .matches.len())]
    Ambiguous { pattern: String, matches: Vec<Url> },
    #[error("circular load of {uri}")]
    Circular { uri: Url },
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Text of `uri` with every `load` statement and `@require` directive
/// replaced, recursively, by the text it brings in.
///
/// A `load` must match exactly one file; a `@require` glob inlines every
/// match in order. Any file already on the inclusion chain is an error.
pub fn inline_loads(
    uri: &Url,
    source: &dyn TextSource,
    resolver: &dyn PathResolver,
) -> Result<String, IncludeError> {
    let text = source.read(uri)?;
    let mut chain = vec![uri.clone()];
    expand(uri, &text, source, resolver, &mut chain)
}

fn expand(
    uri: &Url,
    text: &str,
    source: &dyn TextSource,
    resolver: &dyn PathResolver,
    chain: &mut Vec<Url>,
) -> Result<String, IncludeError> {
    let p = patterns();
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let (caps, required) = if let Some(caps) = p.load.captures(line) {
            (caps, false)
        } else if let Some(caps) = p.require.captures(line) {
            (caps, true)
        } else {
            out.push_str(line);
            out.push('\n');
            continue;
        };
        let pattern = caps.get(2).map_or("", |m| m.as_str());
        let rest = caps.get(0).map_or("", |m| &line[m.end()..]);

        let matches = resolver.resolve(uri, pattern, ResolveOptions::glob());
        if matches.is_empty() {
            return Err(IncludeError::NotFound {
                pattern: pattern.to_string(),
                from: uri.clone(),
            });
        }
        if !required && matches.len() > 1 {
            return Err(IncludeError::Ambiguous {
                pattern: pattern.to_string(),
                matches,
            });
        }

        for target in matches {
            out.push_str(&include(uri, target, source, resolver, chain)?);
        }
        if !required && !rest.trim().is_empty() {
            out.push_str(rest);
            out.push('\n');
        }
    }
    Ok(out)
}

fn include(
    from: &Url,
    target: Url,
    source: &dyn TextSource,
    resolver: &dyn PathResolver,
    chain: &mut Vec<Url>,
) -> Result<String, IncludeError> {
    if chain.contains(&target) {
        return Err(IncludeError::Circular { uri: target });
    }
    log::trace!("Inlining {} into {}", target, from);
    let loaded = source.read(&target)?;
    chain.push(target.clone());
    let expanded = expand(&target, &loaded, source, resolver, chain);
    chain.pop();
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryWorkspace;

    #[test]
    fn test_nested_loads_are_inlined() {
        let ws = MemoryWorkspace::new();
        let main = ws.add("main.m", "load \"lib/a.m\";\nx := f(1);\n");
        ws.add("lib/a.m", "load \"b.m\";\nf := func< n | n >;\n");
        ws.add("lib/b.m", "g := 2;\n");
        let text = inline_loads(&main, &ws, &ws).unwrap();
        assert_eq!(text, "g := 2;\nf := func< n | n >;\nx := f(1);\n");
    }

    #[test]
    fn test_repeated_non_circular_load_is_allowed() {
        let ws = MemoryWorkspace::new();
        let main = ws.add("main.m", "load \"c.m\";\nload \"c.m\";\n");
        ws.add("c.m", "c := 1;\n");
        assert_eq!(inline_loads(&main, &ws, &ws).unwrap(), "c := 1;\nc := 1;\n");
    }

    #[test]
    fn test_circular_load() {
        let ws = MemoryWorkspace::new();
        let a = ws.add("a.m", "load \"b.m\";\n");
        ws.add("b.m", "load \"a.m\";\n");
        match inline_loads(&a, &ws, &ws) {
            Err(IncludeError::Circular { uri }) => assert_eq!(uri, a),
            other => panic!("expected circular error, got {:?}", other),
        }
    }

    #[test]
    fn test_require_inlines_every_match() {
        let ws = MemoryWorkspace::new();
        let main = ws.add("main.m", "// @require \"lib/*.m\";\nz := x + y;\n");
        ws.add("lib/a.m", "x := 1;\n");
        ws.add("lib/b.m", "y := 2;\n");
        let text = inline_loads(&main, &ws, &ws).unwrap();
        assert_eq!(text, "x := 1;\ny := 2;\nz := x + y;\n");
    }

    #[test]
    fn test_circular_require() {
        let ws = MemoryWorkspace::new();
        let a = ws.add("a.m", "// @requires \"b.m\";\n");
        ws.add("b.m", "// @require \"a.m\";\n");
        match inline_loads(&a, &ws, &ws) {
            Err(IncludeError::Circular { uri }) => assert_eq!(uri, a),
            other => panic!("expected circular error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_ambiguous() {
        let ws = MemoryWorkspace::new();
        let main = ws.add("main.m", "load \"nope.m\";\n");
        assert!(matches!(
            inline_loads(&main, &ws, &ws),
            Err(IncludeError::NotFound { .. })
        ));

        ws.add("lib/x.m", "");
        ws.add("lib/y.m", "");
        let main = ws.add("main.m", "load \"lib/*.m\";\n");
        match inline_loads(&main, &ws, &ws) {
            Err(IncludeError::Ambiguous { matches, .. }) => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_root() {
        let ws = MemoryWorkspace::new();
        let err = inline_loads(&ws.uri("absent.m"), &ws, &ws).unwrap_err();
        assert!(matches!(err, IncludeError::Read(ReadError::NotFound(_))));
    }
}
