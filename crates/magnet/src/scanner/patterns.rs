//
// scanner/patterns.rs
//
// Line patterns and the ordered rule table the scanner applies to each line
//

use regex::Regex;
use std::sync::OnceLock;

use super::{Line, Scanner};

/// Identifier or `'quoted name'`.
const NAME: &str = r"[A-Za-z_][A-Za-z0-9_]*|'[^']+'";

/// Compiled regex patterns for line scanning
pub(crate) struct LinePatterns {
    pub ignore: Regex,
    pub internal: Regex,
    pub priority: Regex,
    pub doc_one_line: Regex,
    pub doc_open: Regex,
    pub doc_triple_slash: Regex,
    pub block_one_line: Regex,
    pub block_open: Regex,
    pub line_comment: Regex,
    pub use_cell: Regex,
    pub cell_id: Regex,
    pub load: Regex,
    pub require: Regex,
    pub export: Regex,
    pub defines: Regex,
    pub defines_any: Regex,
    pub forward: Regex,
    pub assign_function: Regex,
    pub assign_closure: Regex,
    pub function: Regex,
    pub assignment: Regex,
    pub end: Regex,
    pub end_anywhere: Regex,
}

pub(crate) fn patterns() -> &'static LinePatterns {
    static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let with_name = |template: &str| {
            Regex::new(&template.replace("NAME", NAME)).expect("line pattern must compile")
        };
        let plain = |pattern: &str| Regex::new(pattern).expect("line pattern must compile");
        LinePatterns {
            ignore: plain(r"^\s*//\s*@ignore(?:\s+(forwards|functions|variables|all))?\s*$"),
            internal: plain(r"^\s*//\s*@internal\s*$"),
            priority: plain(r"^\s*//\s*@priority(?:InCompletion)?\s*$"),
            // the scanner rescans whatever follows a closing `*/`
            doc_one_line: plain(r"^\s*/\*\*(.*?)\*/"),
            // `/**/` is an empty plain comment, not an open doc block
            doc_open: plain(r"^\s*/\*\*($|[^/].*)$"),
            doc_triple_slash: plain(r"^\s*///(.*)$"),
            block_one_line: plain(r"^\s*/\*(.*?)\*/"),
            block_open: plain(r"^\s*/\*(.*)$"),
            // directive lines (`// @...`) never count as plain comments
            line_comment: plain(r"^\s*//(?:\s*$|\s*([^@\s].*)$)"),
            use_cell: plain(r#"^\s*//\s*@use\s+(?:(\d+)|"([^"]*)")"#),
            cell_id: plain(r#"^\s*//\s*@cell\s+(?:"([^"]+)"|(\S+))"#),
            load: plain(r#"^\s*load\s+("([^"]*)")\s*;"#),
            require: plain(r#"^\s*//\s*@requires?\s+("([^"]*)")"#),
            export: plain(r#"^\s*//\s*@export\s+("([^"]*)")"#),
            defines: with_name(
                r"^\s*//\s*@defines\s+(function|procedure|intrinsic)\s+(NAME)\s*\(([^()]*)\)\s*;?\s*$",
            ),
            defines_any: plain(r"^\s*//\s*@defines\b\s*(.*)$"),
            forward: with_name(r"^\s*forward\s+(NAME)\s*;"),
            assign_function: with_name(r"^\s*(NAME)\s*:=\s*(function|procedure)\s*\(([^)]*)\)?"),
            assign_closure: with_name(r"^\s*(NAME)\s*:=\s*(func|proc)\s*<([^|>]*\|)?"),
            function: with_name(r"^\s*(function|procedure)\s+(NAME)\s*\(([^)]*)\)?"),
            assignment: plain(r"^\s*([^:;=]+?)\s*:="),
            end: plain(r"^\s*end\s+(function|procedure)\s*;"),
            end_anywhere: plain(r"\bend\s+(?:function|procedure)\s*;"),
        }
    })
}

pub(super) type Handler<'a> = fn(&mut Scanner<'a>, &Line<'_>) -> bool;

/// Line rules in priority order; the first handler returning `true` consumes the line.
pub(super) fn rules<'a>() -> [(&'static str, Handler<'a>); 10] {
    [
        ("ignore", Scanner::ignore_directive),
        ("priority", Scanner::priority_directive),
        ("doc comment", Scanner::doc_comment),
        ("cell reference", Scanner::cell_reference),
        ("load", Scanner::load_statement),
        ("export", Scanner::export_directive),
        ("definition", Scanner::definition),
        ("assignment", Scanner::assignment),
        ("end", Scanner::end_marker),
        ("malformed defines", Scanner::malformed_defines),
    ]
}
