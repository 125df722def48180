//
// scanner/mod.rs
//
// Line scanner: turns document text into a scope tree of definitions, the
// document's dependency edges and its diagnostics.
//
// Each line is offered to the rules in `patterns::rules()` in order; the first
// rule that accepts the line consumes it. Comment blocks are routed to the
// documentation parser before any rule sees them.
//

pub(crate) mod patterns;

use std::sync::Arc;

use regex::Match;
use serde::Serialize;
use tower_lsp::lsp_types::{DiagnosticSeverity, Position, Range, Url};

use crate::builtins::is_intrinsic;
use crate::cross_file::config::{IndexConfig, Suppression};
use crate::cross_file::export_map::{ExportMap, ExportPattern};
use crate::cross_file::path_resolve::{PathResolver, ResolveOptions};
use crate::cross_file::types::{Dependency, DependencyKind, DependencyLocation, DocumentCache};
use crate::definition::{Definition, DefinitionKind, ScopeCursor};
use crate::diagnostics::{Diagnostic, MessageKey};
use crate::doc_comment::{DocParser, ParamDoc};
use crate::perf::TimingGuard;
use crate::render::{DocRenderer, PlainRenderer};
use crate::utf16::byte_offset_to_utf16_column;

use patterns::{patterns, Handler};

/// Upper bound on characters examined when splitting a multi-name assignment.
pub const MAX_ASSIGNMENT_ITERATIONS: usize = 20_000;

/// Everything a scan needs besides the text.
pub struct ScanContext<'a> {
    pub uri: &'a Url,
    /// Relative paths resolve against this document; the notebook for cells.
    pub base: &'a Url,
    pub is_notebook_cell: bool,
    pub config: &'a IndexConfig,
    pub resolver: &'a dyn PathResolver,
    pub exports: Option<&'a ExportMap>,
    pub renderer: Arc<dyn DocRenderer>,
}

impl<'a> ScanContext<'a> {
    pub fn new(uri: &'a Url, config: &'a IndexConfig, resolver: &'a dyn PathResolver) -> Self {
        Self {
            uri,
            base: uri,
            is_notebook_cell: false,
            config,
            resolver,
            exports: None,
            renderer: Arc::new(PlainRenderer),
        }
    }

    pub fn with_exports(mut self, exports: &'a ExportMap) -> Self {
        self.exports = Some(exports);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DocRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Scan as a notebook cell resolving paths against `notebook`.
    pub fn for_cell(mut self, notebook: &'a Url) -> Self {
        self.base = notebook;
        self.is_notebook_cell = true;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub documentation: String,
    pub definitions: Vec<Definition>,
    pub dependencies: Vec<Dependency>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub exports: Vec<ExportPattern>,
    pub cell_id: Option<String>,
}

impl ScanResult {
    pub fn into_parts(self, uri: Url) -> (DocumentCache, Vec<Diagnostic>, Vec<ExportPattern>) {
        let cache = DocumentCache {
            uri,
            documentation: self.documentation,
            definitions: self.definitions,
            dependencies: self.dependencies,
            cell_id: self.cell_id,
        };
        (cache, self.diagnostics, self.exports)
    }
}

/// Scan a whole document. A single line never fails the scan.
pub fn scan_document(ctx: &ScanContext<'_>, text: &str) -> ScanResult {
    let _timing = TimingGuard::with_threshold("scan_document", 50);
    let rules = patterns::rules();
    let mut scanner = Scanner::new(ctx);
    for (number, text) in text.lines().enumerate() {
        let line = Line {
            number: number as u32,
            text,
            column: 0,
        };
        scanner.scan_line(&line, &rules);
    }
    crate::perf::record_scan();
    scanner.finish()
}

pub(crate) struct Line<'t> {
    number: u32,
    text: &'t str,
    /// UTF-16 column where `text` starts in the source line.
    column: u32,
}

impl<'t> Line<'t> {
    fn pos(&self, byte: usize) -> Position {
        Position::new(self.number, self.column + byte_offset_to_utf16_column(self.text, byte))
    }

    fn range(&self, start: usize, end: usize) -> Range {
        Range::new(self.pos(start), self.pos(end))
    }

    /// The text from byte `start` on, or `None` when it is blank.
    fn rest(&self, start: usize) -> Option<Line<'t>> {
        let text = self.text.get(start..)?;
        if text.trim().is_empty() {
            return None;
        }
        Some(Line {
            number: self.number,
            text,
            column: self.pos(start).character,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockComment {
    Doc,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineRun {
    TripleSlash,
    Plain,
}

pub(crate) struct Scanner<'a> {
    ctx: &'a ScanContext<'a>,
    parser: DocParser,
    definitions: Vec<Definition>,
    cursor: ScopeCursor,
    dependencies: Vec<Dependency>,
    diagnostics: Vec<Diagnostic>,
    exports: Vec<ExportPattern>,
    cell_id: Option<String>,
    block: Option<BlockComment>,
    line_run: Option<LineRun>,
    ignore_next: bool,
    priority_next: bool,
    ignore_persistent: Suppression,
}

impl<'a> Scanner<'a> {
    fn new(ctx: &'a ScanContext<'a>) -> Self {
        Self {
            ctx,
            parser: DocParser::new(ctx.renderer.clone()),
            definitions: Vec::new(),
            cursor: ScopeCursor::new(),
            dependencies: Vec::new(),
            diagnostics: Vec::new(),
            exports: Vec::new(),
            cell_id: None,
            block: None,
            line_run: None,
            ignore_next: false,
            priority_next: false,
            ignore_persistent: Suppression::default(),
        }
    }

    fn scan_line(&mut self, line: &Line<'_>, rules: &[(&'static str, Handler<'a>)]) {
        if self.block.is_some() {
            self.block_line(line);
            return;
        }
        self.end_line_run(line);

        for (name, apply) in rules {
            if apply(self, line) {
                log::trace!("{}:{} {}", self.ctx.uri, line.number, name);
                return;
            }
        }
        if !line.text.trim().is_empty() {
            self.parser.reset();
        }
    }

    fn finish(mut self) -> ScanResult {
        if self.cursor.depth() > 0 {
            log::trace!(
                "{} scope(s) still open at end of {}",
                self.cursor.depth(),
                self.ctx.uri
            );
        }
        if self.block.is_some() || self.line_run.is_some() {
            self.parser.finish_tag();
        }
        let documentation = self.parser.take_file_documentation();

        let mut dependencies = Vec::new();
        if !self.ctx.is_notebook_cell {
            if let Some(exports) = self.ctx.exports {
                for exporter in exports.exporters_of(self.ctx.uri) {
                    dependencies.push(Dependency {
                        location: DependencyLocation::File(exporter),
                        loads_at: Position::new(0, 0),
                        range: Range::default(),
                        kind: DependencyKind::Export,
                    });
                }
            }
        }
        dependencies.append(&mut self.dependencies);

        ScanResult {
            documentation,
            definitions: self.definitions,
            dependencies,
            diagnostics: self.diagnostics,
            exports: self.exports,
            cell_id: self.cell_id,
        }
    }

    // ------------------------------------------------------------------
    // comments
    // ------------------------------------------------------------------

    fn block_line(&mut self, line: &Line<'_>) {
        let Some(kind) = self.block else {
            return;
        };
        let close = line.text.find("*/");
        let content = close.map_or(line.text, |i| &line.text[..i]);
        let routed = kind == BlockComment::Doc || self.ctx.config.last_comment_as_documentation;
        if routed {
            self.parser.send(strip_block_prefix(content));
        }
        if let Some(i) = close {
            if routed {
                self.parser.finish_tag();
            }
            self.block = None;
            self.scan_rest(line, i + 2);
        }
    }

    /// Scan whatever follows a closing `*/` as if it started the line.
    fn scan_rest(&mut self, line: &Line<'_>, after: usize) {
        if let Some(rest) = line.rest(after) {
            let rules = patterns::rules();
            self.scan_line(&rest, &rules);
        }
    }

    /// Close a `///` or `//` run when this line does not continue it.
    fn end_line_run(&mut self, line: &Line<'_>) {
        let Some(run) = self.line_run else {
            return;
        };
        let p = patterns();
        let continues = match run {
            LineRun::TripleSlash => p.doc_triple_slash.is_match(line.text),
            LineRun::Plain => {
                p.line_comment.is_match(line.text) && !p.doc_triple_slash.is_match(line.text)
            }
        };
        if !continues {
            self.parser.finish_tag();
            self.line_run = None;
        }
    }

    fn start_doc_comment(&mut self) {
        if self.parser.is_maybe() {
            self.parser.reset();
        }
    }

    pub(crate) fn doc_comment(&mut self, line: &Line<'_>) -> bool {
        let p = patterns();
        let text = line.text;

        if let Some(caps) = p.doc_one_line.captures(text) {
            self.start_doc_comment();
            self.parser.send(caps[1].trim());
            self.parser.finish_tag();
            self.scan_rest(line, caps.get(0).map_or(text.len(), |m| m.end()));
            return true;
        }
        if let Some(caps) = p.doc_open.captures(text) {
            self.start_doc_comment();
            let rest = caps[1].trim();
            if !rest.is_empty() {
                self.parser.send(rest);
            }
            self.block = Some(BlockComment::Doc);
            return true;
        }
        if let Some(caps) = p.doc_triple_slash.captures(text) {
            if self.line_run != Some(LineRun::TripleSlash) {
                self.start_doc_comment();
                self.line_run = Some(LineRun::TripleSlash);
            }
            self.parser.send(strip_one_space(&caps[1]));
            return true;
        }

        let maybe = self.ctx.config.last_comment_as_documentation;
        if let Some(caps) = p.block_one_line.captures(text) {
            if maybe {
                self.parser.begin_maybe();
                self.parser.send(caps[1].trim());
                self.parser.finish_tag();
            }
            self.scan_rest(line, caps.get(0).map_or(text.len(), |m| m.end()));
            return true;
        }
        if let Some(caps) = p.block_open.captures(text) {
            if maybe {
                self.parser.begin_maybe();
                let rest = caps[1].trim();
                if !rest.is_empty() {
                    self.parser.send(rest);
                }
            }
            self.block = Some(BlockComment::Plain);
            return true;
        }
        if let Some(caps) = p.line_comment.captures(text) {
            if maybe {
                if self.line_run != Some(LineRun::Plain) {
                    self.parser.begin_maybe();
                    self.line_run = Some(LineRun::Plain);
                }
                self.parser.send(caps.get(1).map_or("", |m| m.as_str()));
            }
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // directives
    // ------------------------------------------------------------------

    pub(crate) fn ignore_directive(&mut self, line: &Line<'_>) -> bool {
        let p = patterns();
        if let Some(caps) = p.ignore.captures(line.text) {
            match caps.get(1).map(|m| m.as_str()) {
                None => self.ignore_next = true,
                Some("forwards") => self.ignore_persistent.forwards = true,
                Some("functions") => self.ignore_persistent.functions = true,
                Some("variables") => self.ignore_persistent.variables = true,
                Some(_) => {
                    self.ignore_persistent = Suppression {
                        forwards: true,
                        functions: true,
                        variables: true,
                    }
                }
            }
            return true;
        }
        if p.internal.is_match(line.text) {
            self.ignore_next = true;
            return true;
        }
        false
    }

    pub(crate) fn priority_directive(&mut self, line: &Line<'_>) -> bool {
        if patterns().priority.is_match(line.text) {
            self.priority_next = true;
            return true;
        }
        false
    }

    pub(crate) fn cell_reference(&mut self, line: &Line<'_>) -> bool {
        if !self.ctx.is_notebook_cell {
            return false;
        }
        let p = patterns();
        if let Some(caps) = p.use_cell.captures(line.text) {
            let location = match (caps.get(1), caps.get(2)) {
                (Some(index), _) => index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .map(|i| (DependencyLocation::CellIndex(i), index)),
                (None, Some(id)) if !id.as_str().is_empty() => {
                    Some((DependencyLocation::CellId(id.as_str().to_string()), id))
                }
                _ => None,
            };
            if let Some((location, m)) = location {
                let end = caps.get(0).map_or(line.text.len(), |m| m.end());
                self.dependencies.push(Dependency {
                    location,
                    loads_at: line.pos(end),
                    range: line.range(m.start(), m.end()),
                    kind: DependencyKind::Use,
                });
            }
            return true;
        }
        if let Some(caps) = p.cell_id.captures(line.text) {
            if let Some(id) = caps.get(1).or_else(|| caps.get(2)) {
                self.cell_id = Some(id.as_str().to_string());
            }
            return true;
        }
        false
    }

    pub(crate) fn load_statement(&mut self, line: &Line<'_>) -> bool {
        let p = patterns();
        let (caps, kind, options) = if let Some(caps) = p.load.captures(line.text) {
            (caps, DependencyKind::Load, ResolveOptions::exact())
        } else if let Some(caps) = p.require.captures(line.text) {
            (caps, DependencyKind::Require, ResolveOptions::glob())
        } else {
            return false;
        };
        let (Some(quoted), Some(pattern), Some(whole)) = (caps.get(1), caps.get(2), caps.get(0)) else {
            return true;
        };

        let range = line.range(quoted.start(), quoted.end());
        let matches = self
            .ctx
            .resolver
            .resolve(self.ctx.base, pattern.as_str(), options);
        if matches.is_empty() {
            log::trace!("{}:{} no file matches '{}'", self.ctx.uri, line.number, pattern.as_str());
            self.diagnostics.push(Diagnostic::new(
                range,
                MessageKey::FileNotFound,
                vec![pattern.as_str().to_string()],
                self.ctx.config.missing_file_severity,
            ));
            return true;
        }
        let loads_at = line.pos(whole.end());
        for uri in matches {
            self.dependencies.push(Dependency {
                location: DependencyLocation::File(uri),
                loads_at,
                range,
                kind,
            });
        }
        true
    }

    pub(crate) fn export_directive(&mut self, line: &Line<'_>) -> bool {
        let Some(caps) = patterns().export.captures(line.text) else {
            return false;
        };
        if self.ctx.is_notebook_cell {
            return true;
        }
        let pattern = caps.get(2).map_or("", |m| m.as_str());
        match ExportPattern::new(pattern, self.ctx.uri) {
            Ok(Some(export)) => self.exports.push(export),
            Ok(None) => {}
            Err(e) => log::trace!("{}:{} ignoring export: {}", self.ctx.uri, line.number, e),
        }
        true
    }

    pub(crate) fn malformed_defines(&mut self, line: &Line<'_>) -> bool {
        let Some(caps) = patterns().defines_any.captures(line.text) else {
            return false;
        };
        let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
        let first = rest
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("");
        let after_first = rest[first.len()..].trim_start();

        let (key, args) = if matches!(first, "function" | "procedure" | "intrinsic") {
            (MessageKey::DefinesMalformedArguments, vec![after_first.to_string()])
        } else if first.is_empty() || after_first.is_empty() || after_first.starts_with('(') {
            (MessageKey::DefinesMissingKind, Vec::new())
        } else {
            (MessageKey::DefinesUnknownKind, vec![first.to_string()])
        };

        let start = line.text.len() - line.text.trim_start().len();
        let end = line.text.trim_end().len();
        self.diagnostics.push(Diagnostic::new(
            line.range(start, end),
            key,
            args,
            DiagnosticSeverity::WARNING,
        ));
        self.parser.reset();
        true
    }

    // ------------------------------------------------------------------
    // definitions
    // ------------------------------------------------------------------

    pub(crate) fn definition(&mut self, line: &Line<'_>) -> bool {
        let p = patterns();
        let text = line.text;

        if let Some(caps) = p.defines.captures(text) {
            let (Some(keyword), Some(name), Some(args)) = (caps.get(1), caps.get(2), caps.get(3)) else {
                return false;
            };
            let kind = if keyword.as_str() == "procedure" {
                DefinitionKind::Procedure
            } else {
                DefinitionKind::Function
            };
            let signature = format!(
                "{} {}({})",
                keyword.as_str(),
                unquote(name.as_str()),
                args.as_str().trim()
            );
            let def = self.callable(line, name, kind, Some((args.start(), args.as_str())), signature, true);
            self.cursor.push(&mut self.definitions, def);
            return true;
        }

        if let Some(caps) = p.forward.captures(text) {
            let Some(name) = caps.get(1) else {
                return false;
            };
            let signature = format!("forward {}", unquote(name.as_str()));
            let def = self.callable(line, name, DefinitionKind::Forward, None, signature, false);
            self.cursor.push(&mut self.definitions, def);
            return true;
        }

        if let Some(caps) = p.assign_function.captures(text) {
            let (Some(name), Some(keyword), Some(whole)) = (caps.get(1), caps.get(2), caps.get(0)) else {
                return false;
            };
            let args = caps.get(3).map(|m| (m.start(), m.as_str()));
            let kind = keyword_kind(keyword.as_str());
            let signature = format!(
                "{} {}({})",
                keyword.as_str(),
                unquote(name.as_str()),
                args.map_or("", |(_, a)| a.trim())
            );
            let def = self.callable(line, name, kind, args, signature, false);
            self.open_scope(line, def, whole.end());
            return true;
        }

        if let Some(caps) = p.assign_closure.captures(text) {
            let (Some(name), Some(keyword)) = (caps.get(1), caps.get(2)) else {
                return false;
            };
            let args = caps
                .get(3)
                .map(|m| (m.start(), m.as_str().trim_end_matches('|')));
            let kind = if keyword.as_str() == "proc" {
                DefinitionKind::Procedure
            } else {
                DefinitionKind::Function
            };
            let signature = format!(
                "{}< {} >",
                keyword.as_str(),
                args.map_or("", |(_, a)| a.trim())
            );
            let signature = format!("{} := {}", unquote(name.as_str()), signature);
            let def = self.callable(line, name, kind, args, signature, false);
            self.cursor.push(&mut self.definitions, def);
            return true;
        }

        if let Some(caps) = p.function.captures(text) {
            let (Some(keyword), Some(name), Some(whole)) = (caps.get(1), caps.get(2), caps.get(0)) else {
                return false;
            };
            let args = caps.get(3).map(|m| (m.start(), m.as_str()));
            let kind = keyword_kind(keyword.as_str());
            let signature = format!(
                "{} {}({})",
                keyword.as_str(),
                unquote(name.as_str()),
                args.map_or("", |(_, a)| a.trim())
            );
            let def = self.callable(line, name, kind, args, signature, false);
            self.open_scope(line, def, whole.end());
            return true;
        }

        false
    }

    /// Enter the body of `def`, unless its end marker is on the same line.
    fn open_scope(&mut self, line: &Line<'_>, mut def: Definition, after: usize) {
        let scope_start = def.name_range.end;
        def.scope_start = Some(scope_start);
        if let Some(end) = patterns().end_anywhere.find(&line.text[after..]) {
            def.body_range = Some(Range::new(scope_start, line.pos(after + end.end())));
            self.cursor.push(&mut self.definitions, def);
        } else {
            self.cursor.descend(&mut self.definitions, def);
        }
    }

    fn callable(
        &mut self,
        line: &Line<'_>,
        name: Match<'_>,
        kind: DefinitionKind,
        args: Option<(usize, &str)>,
        signature: String,
        synthetic: bool,
    ) -> Definition {
        let name_range = line.range(name.start(), name.end());
        let param_docs = self.parser.take_params();
        let mut def = self.take_pending(unquote(name.as_str()), kind, name_range);
        def.signature = Some(signature);
        def.synthetic = synthetic;
        def.children = parameters(line, name_range, param_docs, args);

        if !synthetic
            && matches!(kind, DefinitionKind::Function | DefinitionKind::Procedure)
            && is_intrinsic(&def.name)
        {
            self.diagnostics.push(Diagnostic::new(
                name_range,
                MessageKey::RedefinedIntrinsic,
                vec![def.name.clone()],
                self.ctx.config.redefinition_severity,
            ));
        }
        def
    }

    /// Build a definition consuming pending documentation and one-shot flags.
    fn take_pending(&mut self, name: &str, kind: DefinitionKind, name_range: Range) -> Definition {
        let mut def = Definition::new(name, kind, name_range);
        def.has_priority = self.priority_next || self.parser.has_priority();
        def.ignored = self.take_ignored(kind) || self.parser.is_internal();
        def.documentation = self.parser.pop();
        def.enabled = self.is_enabled(kind, &def.documentation);
        self.priority_next = false;
        def
    }

    fn take_ignored(&mut self, kind: DefinitionKind) -> bool {
        let one_shot = std::mem::take(&mut self.ignore_next);
        let suppress = &self.ctx.config.suppress;
        let category = match kind {
            DefinitionKind::Forward => self.ignore_persistent.forwards || suppress.forwards,
            DefinitionKind::Function | DefinitionKind::Procedure => {
                self.ignore_persistent.functions || suppress.functions
            }
            DefinitionKind::Variable => self.ignore_persistent.variables || suppress.variables,
        };
        one_shot || category
    }

    fn is_enabled(&self, kind: DefinitionKind, documentation: &str) -> bool {
        let config = self.ctx.config;
        config.definitions_enabled
            && !(kind.is_callable() && config.only_documented && documentation.is_empty())
    }

    pub(crate) fn assignment(&mut self, line: &Line<'_>) -> bool {
        let Some(lhs) = patterns().assignment.captures(line.text).and_then(|c| c.get(1)) else {
            return false;
        };
        let Some(targets) = split_targets(lhs.as_str()) else {
            return false;
        };

        self.parser.take_params();
        let has_priority = self.priority_next || self.parser.has_priority();
        let ignored = self.take_ignored(DefinitionKind::Variable) || self.parser.is_internal();
        let documentation = self.parser.pop();
        self.priority_next = false;

        for (offset, name) in targets {
            if name == "_" {
                continue;
            }
            let start = lhs.start() + offset;
            let mut def = Definition::new(
                unquote(name),
                DefinitionKind::Variable,
                line.range(start, start + name.len()),
            );
            def.has_priority = has_priority;
            def.ignored = ignored;
            def.documentation = documentation.clone();
            def.enabled = self.is_enabled(DefinitionKind::Variable, &documentation);
            self.cursor.push(&mut self.definitions, def);
        }
        true
    }

    pub(crate) fn end_marker(&mut self, line: &Line<'_>) -> bool {
        let Some(m) = patterns().end.find(line.text) else {
            return false;
        };
        let end = line.pos(m.end());
        match self.cursor.ascend(&mut self.definitions) {
            Some(def) => {
                let start = def.scope_start.unwrap_or(def.name_range.end);
                def.body_range = Some(Range::new(start, end));
            }
            None => log::trace!("{}:{} end marker at global scope", self.ctx.uri, line.number),
        }
        self.parser.reset();
        true
    }
}

fn keyword_kind(keyword: &str) -> DefinitionKind {
    if keyword == "procedure" {
        DefinitionKind::Procedure
    } else {
        DefinitionKind::Function
    }
}

/// Documented parameters first, then undocumented signature names.
fn parameters(
    line: &Line<'_>,
    fallback: Range,
    docs: Vec<ParamDoc>,
    args: Option<(usize, &str)>,
) -> Vec<Definition> {
    let signature: Vec<(String, Range)> = args
        .map(|(offset, text)| {
            split_params(text)
                .into_iter()
                .map(|(start, name)| {
                    let start = offset + start;
                    (name.to_string(), line.range(start, start + name.len()))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut params: Vec<Definition> = docs
        .into_iter()
        .map(|doc| {
            let range = signature
                .iter()
                .find(|(name, _)| *name == doc.name)
                .map_or(fallback, |(_, r)| *r);
            Definition::parameter(doc.name, doc.documentation, range)
        })
        .collect();
    for (name, range) in signature {
        if !params.iter().any(|p| p.name == name) {
            params.push(Definition::parameter(name, "", range));
        }
    }
    params
}

/// Parameter names in an argument list with their byte offsets.
///
/// `x, ~y :: RngIntElt : opt := 3` → `x`, `y`, `opt`. A lone `:` starts the
/// optional parameters; `::` and `:=` do not split.
pub(crate) fn split_params(args: &str) -> Vec<(usize, &str)> {
    let bytes = args.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for i in 0..=bytes.len() {
        let split = match bytes.get(i) {
            None => true,
            Some(b',') => true,
            Some(b':') => {
                let next = bytes.get(i + 1);
                let prev = i.checked_sub(1).and_then(|j| bytes.get(j));
                !matches!(next, Some(b':') | Some(b'=')) && prev != Some(&b':')
            }
            Some(_) => false,
        };
        if split {
            if let Some((offset, name)) = param_name(&args[start..i]) {
                out.push((start + offset, name));
            }
            start = i + 1;
        }
    }
    out
}

fn param_name(segment: &str) -> Option<(usize, &str)> {
    let leading = segment.len() - segment.trim_start().len();
    let rest = &segment[leading..];
    let (marker, rest) = match rest.strip_prefix('~') {
        Some(r) => (1, r),
        None => (0, rest),
    };
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() || name == "_" || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((leading + marker, name))
}

/// Targets of `a, <b>, c := ...`; `None` when any target is not a plain name.
pub(crate) fn split_targets(lhs: &str) -> Option<Vec<(usize, &str)>> {
    let mut targets = Vec::new();
    let mut start = 0;
    let mut iterations = 0usize;
    for (i, c) in lhs.char_indices().chain(std::iter::once((lhs.len(), ','))) {
        iterations += 1;
        if iterations > MAX_ASSIGNMENT_ITERATIONS {
            log::warn!(
                "Assignment target list longer than {} characters; keeping {} name(s)",
                MAX_ASSIGNMENT_ITERATIONS,
                targets.len()
            );
            break;
        }
        if c != ',' {
            continue;
        }
        let piece = &lhs[start..i];
        let (offset, name) = target_name(piece)?;
        targets.push((start + offset, name));
        start = i + 1;
    }
    if targets.is_empty() {
        return None;
    }
    Some(targets)
}

fn target_name(piece: &str) -> Option<(usize, &str)> {
    let mut offset = piece.len() - piece.trim_start().len();
    let mut name = piece.trim();
    if let Some(inner) = name.strip_prefix('<') {
        let inner = inner.strip_suffix('>')?;
        offset += 1 + (inner.len() - inner.trim_start().len());
        name = inner.trim();
    }
    is_name(name).then_some((offset, name))
}

fn is_name(s: &str) -> bool {
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return !s[1..s.len() - 1].contains('\'');
    }
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(name: &str) -> &str {
    name.strip_prefix('\'')
        .and_then(|n| n.strip_suffix('\''))
        .unwrap_or(name)
}

fn strip_one_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

/// ` * text` → `text`; lines without a leading `*` are trimmed.
fn strip_block_prefix(content: &str) -> &str {
    let trimmed = content.trim_start();
    match trimmed.strip_prefix('*') {
        Some(rest) => strip_one_space(rest),
        None => trimmed,
    }
}
