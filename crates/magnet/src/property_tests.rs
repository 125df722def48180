//
// property_tests.rs
//
// Property-based tests for the scanner, the scope cursor and cursor word lookup
//

use proptest::prelude::*;

use crate::cross_file::IndexConfig;
use crate::definition::{Definition, DefinitionKind, ScopeCursor};
use crate::handlers::word_at;
use crate::scanner::{scan_document, ScanContext, ScanResult};
use crate::test_utils::MemoryWorkspace;
use tower_lsp::lsp_types::{Position, Range};

// ============================================================================
// Generators
// ============================================================================

fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,6}"
}

/// Capitalised names never collide with keywords.
fn variable_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z0-9_]{0,6}"
}

/// Lines drawn from every construct the scanner recognises, plus noise.
fn source_line() -> impl Strategy<Value = String> {
    prop_oneof![
        identifier().prop_map(|n| format!("function {}(x, y)", n)),
        identifier().prop_map(|n| format!("procedure {}(~x)", n)),
        identifier().prop_map(|n| format!("intrinsic {}(x::RngIntElt) -> RngIntElt", n)),
        identifier().prop_map(|n| format!("forward {};", n)),
        identifier().prop_map(|n| format!("{} := function(a)", n)),
        identifier().prop_map(|n| format!("{} := func< a | a >;", n)),
        (identifier(), identifier()).prop_map(|(a, b)| format!("{}, <{}>, _ := [1,2,3];", a, b)),
        Just("end function;".to_string()),
        Just("end procedure;".to_string()),
        Just("end intrinsic;".to_string()),
        Just("/**".to_string()),
        Just(" * Summary line.".to_string()),
        identifier().prop_map(|n| format!(" * @param {{RngIntElt}} {} value", n)),
        Just(" */".to_string()),
        Just("/* plain */".to_string()),
        Just("// @ignore".to_string()),
        Just("// @ignore functions".to_string()),
        Just("// @priority".to_string()),
        identifier().prop_map(|n| format!("load \"{}.m\";", n)),
        identifier().prop_map(|n| format!("// @require \"{}.m\";", n)),
        identifier().prop_map(|n| format!("// @defines function {}(x);", n)),
        Just("// @defines gadget;".to_string()),
        "[ -~]{0,40}",
        "\\PC{0,12}",
    ]
}

fn source_text() -> impl Strategy<Value = String> {
    prop::collection::vec(source_line(), 0..40).prop_map(|lines| lines.join("\n"))
}

fn scan(workspace: &MemoryWorkspace, text: &str) -> ScanResult {
    let uri = workspace.uri("main.m");
    let config = IndexConfig::default();
    let ctx = ScanContext::new(&uri, &config, workspace);
    scan_document(&ctx, text)
}

fn count_unclosed(definitions: &[Definition]) -> usize {
    definitions
        .iter()
        .map(|d| {
            let own = usize::from(d.scope_start.is_some() && d.body_range.is_none());
            own + count_unclosed(&d.children)
        })
        .sum()
}

#[derive(Debug, Clone)]
enum CursorOp {
    Descend,
    Ascend,
    Push,
}

fn cursor_op() -> impl Strategy<Value = CursorOp> {
    prop_oneof![Just(CursorOp::Descend), Just(CursorOp::Ascend), Just(CursorOp::Push)]
}

// ============================================================================
// Scanner
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any mix of lines scans without panicking, and rescanning the same text
    /// yields the same result.
    #[test]
    fn prop_scan_is_total_and_deterministic(text in source_text()) {
        let workspace = MemoryWorkspace::new();
        workspace.add("lib.m", "");
        let first = scan(&workspace, &text);
        let second = scan(&workspace, &text);
        prop_assert_eq!(&first.definitions, &second.definitions);
        prop_assert_eq!(&first.dependencies, &second.dependencies);
        prop_assert_eq!(&first.diagnostics, &second.diagnostics);
        prop_assert_eq!(&first.documentation, &second.documentation);
    }

    /// An unterminated chain of bodies leaves exactly the open ones without a body range.
    #[test]
    fn prop_unclosed_bodies_have_no_range(depth in 1usize..6, closed in 0usize..6) {
        let closed = closed.min(depth);
        let mut lines: Vec<String> = (0..depth).map(|i| format!("function F{}(x)", i)).collect();
        lines.extend((0..closed).map(|_| "end function;".to_string()));
        let result = scan(&MemoryWorkspace::new(), &lines.join("\n"));
        prop_assert_eq!(count_unclosed(&result.definitions), depth - closed);
    }

    /// Every name in a destructuring assignment except `_` becomes a variable.
    #[test]
    fn prop_assignment_targets(names in prop::collection::vec(variable_name(), 1..5)) {
        let targets: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, n)| if i % 2 == 1 { format!("<{}>", n) } else { n.clone() })
            .collect();
        let text = format!("_, {} := f();", targets.join(", "));
        let result = scan(&MemoryWorkspace::new(), &text);
        let found: Vec<&str> = result.definitions.iter().map(|d| d.name.as_str()).collect();
        let expected: Vec<&str> = names.iter().map(String::as_str).collect();
        prop_assert_eq!(found, expected);
        prop_assert!(result.definitions.iter().all(|d| d.kind == DefinitionKind::Variable));
    }
}

// ============================================================================
// Scope cursor
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Depth tracks descends minus ascends, never dropping below the global scope.
    #[test]
    fn prop_cursor_saturates(ops in prop::collection::vec(cursor_op(), 0..60)) {
        let mut root: Vec<Definition> = Vec::new();
        let mut cursor = ScopeCursor::new();
        let mut expected = 0usize;
        for (i, op) in ops.iter().enumerate() {
            let def = Definition::new(format!("d{}", i), DefinitionKind::Function, Range::default());
            match op {
                CursorOp::Descend => {
                    cursor.descend(&mut root, def);
                    expected += 1;
                }
                CursorOp::Ascend => {
                    let exited = cursor.ascend(&mut root).is_some();
                    prop_assert_eq!(exited, expected > 0);
                    expected = expected.saturating_sub(1);
                }
                CursorOp::Push => cursor.push(&mut root, def),
            }
            prop_assert_eq!(cursor.depth(), expected);
        }
    }
}

// ============================================================================
// Word lookup
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Any column on any line is safe, and a found word lies inside the line.
    #[test]
    fn prop_word_at_never_panics(line in "\\PC{0,30}", column in 0u32..40) {
        if let Some((word, range)) = word_at(&line, 3, column) {
            prop_assert!(!word.is_empty());
            prop_assert_eq!(range.start.line, 3);
            prop_assert!(range.start <= range.end);
            prop_assert!(range.end <= Position::new(3, line.encode_utf16().count() as u32));
        }
    }
}
