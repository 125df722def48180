//
// doc_comment.rs
//
// Documentation comment parser.
//
// The scanner feeds the content of `/** */` and `///` comments into a `DocParser`
// one line at a time (comment markers already stripped). Tags split the text into
// sections; `@param` sections are collected separately so the scanner can attach
// them to the parameters of the definition that follows.
//

use std::sync::Arc;

use crate::render::{DocRenderer, PlainRenderer};

/// One `@param`/`@arg`/`@argument` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDoc {
    pub name: String,
    pub type_name: Option<String>,
    pub documentation: String,
}

#[derive(Debug, Clone)]
struct TagSection {
    name: String,
    lines: Vec<String>,
}

impl TagSection {
    fn render(&self) -> String {
        let lines = trim_blank_lines(&self.lines);
        if self.name == "example" {
            return format!("*@example*\n```\n{}\n```", lines.join("\n"));
        }
        match lines {
            [] => format!("*@{}*", self.name),
            [only] => format!("*@{}* {}", self.name, only.trim()),
            _ => format!("*@{}*\n{}", self.name, lines.join("\n")),
        }
    }
}

/// Untagged text plus tag sections, in the order they were sent.
#[derive(Debug, Clone, Default)]
struct Collector {
    body: Vec<String>,
    tags: Vec<TagSection>,
    in_tag: bool,
}

impl Collector {
    fn push_line(&mut self, line: &str) {
        match self.tags.last_mut() {
            Some(tag) if self.in_tag => tag.lines.push(line.to_string()),
            _ => self.body.push(line.to_string()),
        }
    }

    fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.body.iter().all(|l| l.trim().is_empty())
    }

    fn render(&self) -> String {
        let mut sections = Vec::new();
        let body = trim_blank_lines(&self.body).join("\n");
        if !body.is_empty() {
            sections.push(body);
        }
        sections.extend(self.tags.iter().map(TagSection::render));
        sections.join("\n\n")
    }
}

#[derive(Debug, Clone)]
struct PendingParam {
    name: String,
    type_name: Option<String>,
    lines: Vec<String>,
}

/// Line-at-a-time documentation parser.
///
/// State lives across comments within one document: the first documentation
/// comment of a file may divert into the file documentation with `@file`.
pub struct DocParser {
    renderer: Arc<dyn DocRenderer>,
    main: Collector,
    file: Collector,
    params: Vec<PendingParam>,
    current_param: Option<usize>,
    priority: bool,
    internal: bool,
    maybe: bool,
    file_mode: bool,
    comment_started: bool,
    comments_seen: bool,
}

impl Default for DocParser {
    fn default() -> Self {
        Self::new(Arc::new(PlainRenderer))
    }
}

impl DocParser {
    pub fn new(renderer: Arc<dyn DocRenderer>) -> Self {
        Self {
            renderer,
            main: Collector::default(),
            file: Collector::default(),
            params: Vec::new(),
            current_param: None,
            priority: false,
            internal: false,
            maybe: false,
            file_mode: false,
            comment_started: false,
            comments_seen: false,
        }
    }

    /// Feed one line of comment content.
    pub fn send(&mut self, line: &str) {
        let line = line.trim_end();
        let trimmed = line.trim_start();
        let first_line = !self.comment_started;
        if !trimmed.is_empty() {
            self.comment_started = true;
        }

        if let Some((tag, rest)) = split_tag(trimmed) {
            self.begin_tag(tag, rest, first_line);
            return;
        }

        if let Some(i) = self.current_param {
            if let Some(param) = self.params.get_mut(i) {
                param.lines.push(trimmed.to_string());
                return;
            }
        }
        self.active_mut().push_line(line);
    }

    fn active_mut(&mut self) -> &mut Collector {
        if self.file_mode {
            &mut self.file
        } else {
            &mut self.main
        }
    }

    fn begin_tag(&mut self, tag: &str, rest: &str, first_line: bool) {
        self.close_section();
        match tag {
            "internal" => self.internal = true,
            "priority" | "priorityInCompletion" => self.priority = true,
            "file" | "fileoverview" if first_line && !self.comments_seen && !self.maybe => {
                log::trace!("doc comment diverted to file documentation");
                self.file_mode = true;
                if !rest.is_empty() {
                    self.file.body.push(rest.to_string());
                }
            }
            "param" | "arg" | "argument" if !self.file_mode => match parse_param(rest) {
                Some(param) => {
                    self.params.push(param);
                    self.current_param = Some(self.params.len() - 1);
                }
                None => self.push_tag(tag, rest, true),
            },
            "author" => self.push_tag(tag, rest, false),
            _ => self.push_tag(tag, rest, true),
        }
    }

    fn push_tag(&mut self, tag: &str, rest: &str, accumulate: bool) {
        let lines = if rest.is_empty() {
            Vec::new()
        } else {
            vec![rest.to_string()]
        };
        let active = self.active_mut();
        active.tags.push(TagSection {
            name: tag.to_string(),
            lines,
        });
        active.in_tag = accumulate;
    }

    fn close_section(&mut self) {
        self.current_param = None;
        self.main.in_tag = false;
        self.file.in_tag = false;
    }

    /// End of a comment block. A dangling tag stays in its section.
    pub fn finish_tag(&mut self) {
        self.close_section();
        self.file_mode = false;
        self.comment_started = false;
        if !self.maybe {
            self.comments_seen = true;
        }
    }

    pub fn has_priority(&self) -> bool {
        self.priority
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.params.is_empty()
    }

    /// Start collecting a plain comment that only counts as documentation if
    /// a definition follows. Drops whatever was pending.
    pub fn begin_maybe(&mut self) {
        self.reset();
        self.maybe = true;
    }

    pub fn is_maybe(&self) -> bool {
        self.maybe
    }

    /// Take the collected parameter documentation, leaving the main text.
    pub fn take_params(&mut self) -> Vec<ParamDoc> {
        self.current_param = None;
        self.params
            .drain(..)
            .map(|p| ParamDoc {
                name: p.name,
                type_name: p.type_name,
                documentation: trim_blank_lines(&p.lines).join("\n"),
            })
            .collect()
    }

    /// Render the pending documentation and reset.
    pub fn pop(&mut self) -> String {
        self.close_section();
        let text = self.main.render();
        self.reset();
        if text.is_empty() {
            return text;
        }
        self.renderer.render(&text)
    }

    /// Drop pending documentation and flags. File documentation survives.
    pub fn reset(&mut self) {
        self.main = Collector::default();
        self.params.clear();
        self.current_param = None;
        self.priority = false;
        self.internal = false;
        self.maybe = false;
        self.file_mode = false;
        self.comment_started = false;
    }

    pub fn take_file_documentation(&mut self) -> String {
        let file = std::mem::take(&mut self.file);
        let text = file.render();
        if text.is_empty() {
            return text;
        }
        self.renderer.render(&text)
    }
}

/// `@name rest` → `("name", "rest")`.
fn split_tag(content: &str) -> Option<(&str, &str)> {
    let after = content.strip_prefix('@')?;
    let end = after
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(after.len());
    if end == 0 {
        return None;
    }
    Some((&after[..end], after[end..].trim()))
}

fn parse_param(rest: &str) -> Option<PendingParam> {
    let (type_name, rest) = match rest.strip_prefix('{').and_then(|r| r.find('}').map(|end| (r, end))) {
        Some((r, end)) => (Some(r[..end].trim().to_string()), r[end + 1..].trim_start()),
        None => (None, rest),
    };
    let (name, description) = split_first_word(rest);
    let name = name.trim_start_matches('~');
    if name.is_empty() {
        return None;
    }
    let lines = if description.is_empty() {
        Vec::new()
    } else {
        vec![description.to_string()]
    };
    Some(PendingParam {
        name: name.to_string(),
        type_name,
        lines,
    })
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn trim_blank_lines(lines: &[String]) -> &[String] {
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    &lines[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str]) -> DocParser {
        let mut parser = DocParser::default();
        for line in lines {
            parser.send(line);
        }
        parser.finish_tag();
        parser
    }

    #[test]
    fn test_plain_text() {
        let mut parser = parse(&["Computes the order.", "", "Second paragraph."]);
        assert_eq!(parser.pop(), "Computes the order.\n\nSecond paragraph.");
    }

    #[test]
    fn test_param_with_type_and_blank_continuation() {
        let mut parser = parse(&["@param {RngIntElt} x description", "@param y", "", "text"]);
        let params = parser.take_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "x");
        assert_eq!(params[0].type_name.as_deref(), Some("RngIntElt"));
        assert_eq!(params[0].documentation, "description");
        assert_eq!(params[1].name, "y");
        assert_eq!(params[1].type_name, None);
        assert_eq!(params[1].documentation, "text");
        assert_eq!(parser.pop(), "");
    }

    #[test]
    fn test_param_aliases_and_reference_marker() {
        let mut parser = parse(&["@arg a first", "@argument ~b second"]);
        let names: Vec<String> = parser.take_params().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_params_excluded_from_documentation() {
        let mut parser = parse(&["Adds numbers.", "@param x the first", "@returns the sum"]);
        assert_eq!(parser.take_params().len(), 1);
        assert_eq!(parser.pop(), "Adds numbers.\n\n*@returns* the sum");
    }

    #[test]
    fn test_multiline_tag_renders_with_line_break() {
        let mut parser = parse(&["@note", "first", "second"]);
        assert_eq!(parser.pop(), "*@note*\nfirst\nsecond");
    }

    #[test]
    fn test_example_is_fenced() {
        let mut parser = parse(&["@example", "  x := Foo(3);"]);
        assert_eq!(parser.pop(), "*@example*\n```\n  x := Foo(3);\n```");
    }

    #[test]
    fn test_author_is_single_line() {
        let mut parser = parse(&["@author Someone", "Body text."]);
        assert_eq!(parser.pop(), "Body text.\n\n*@author* Someone");
    }

    #[test]
    fn test_dangling_tag_is_emitted() {
        let mut parser = parse(&["Text.", "@deprecated"]);
        assert_eq!(parser.pop(), "Text.\n\n*@deprecated*");
    }

    #[test]
    fn test_flags_are_swallowed() {
        let mut parser = parse(&["@priority", "@internal", "Visible."]);
        assert!(parser.has_priority());
        assert!(parser.is_internal());
        assert_eq!(parser.pop(), "Visible.");
        assert!(!parser.has_priority());
        assert!(!parser.is_internal());
    }

    #[test]
    fn test_file_documentation_only_first_comment() {
        let mut parser = DocParser::default();
        parser.send("@file Utilities for lattices.");
        parser.send("More about the file.");
        parser.finish_tag();
        assert!(parser.is_empty());
        assert_eq!(
            parser.take_file_documentation(),
            "Utilities for lattices.\nMore about the file."
        );

        parser.send("@fileoverview not a file doc");
        parser.finish_tag();
        assert_eq!(parser.take_file_documentation(), "");
        assert_eq!(parser.pop(), "*@fileoverview* not a file doc");
    }

    #[test]
    fn test_file_tag_must_be_first_line() {
        let mut parser = parse(&["Summary.", "@file late"]);
        assert_eq!(parser.take_file_documentation(), "");
        assert_eq!(parser.pop(), "Summary.\n\n*@file* late");
    }

    #[test]
    fn test_maybe_mode() {
        let mut parser = DocParser::default();
        parser.send("real docs");
        parser.begin_maybe();
        assert!(parser.is_maybe());
        assert!(parser.is_empty());
        parser.send("plain comment");
        assert_eq!(parser.pop(), "plain comment");
        assert!(!parser.is_maybe());
    }

    #[test]
    fn test_maybe_comment_does_not_consume_file_tag() {
        let mut parser = DocParser::default();
        parser.begin_maybe();
        parser.send("license header");
        parser.finish_tag();
        parser.reset();
        parser.send("@file Real file docs");
        parser.finish_tag();
        assert_eq!(parser.take_file_documentation(), "Real file docs");
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut parser = parse(&["Text.", "@param x doc"]);
        parser.reset();
        assert!(parser.is_empty());
        assert!(parser.take_params().is_empty());
        assert_eq!(parser.pop(), "");
    }

    #[test]
    fn test_split_tag() {
        assert_eq!(split_tag("@param x"), Some(("param", "x")));
        assert_eq!(split_tag("@priorityInCompletion"), Some(("priorityInCompletion", "")));
        assert_eq!(split_tag("@ alone"), None);
        assert_eq!(split_tag("email@host"), None);
    }
}
