//
// definition.rs
//
// Scope model: definitions form a tree rooted at a document's global scope
//

use serde::Serialize;
use tower_lsp::lsp_types::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DefinitionKind {
    Variable,
    Function,
    Procedure,
    Forward,
}

impl DefinitionKind {
    /// Functions, procedures and forwards; the kinds that carry parameters.
    pub fn is_callable(&self) -> bool {
        !matches!(self, DefinitionKind::Variable)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            DefinitionKind::Variable => "variable",
            DefinitionKind::Function => "function",
            DefinitionKind::Procedure => "procedure",
            DefinitionKind::Forward => "forward",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub enabled: bool,
    pub ignored: bool,
    pub documentation: String,
    pub name_range: Range,
    /// Start of the body scope. Set for every definition that opens a scope.
    pub scope_start: Option<Position>,
    /// Set only when the closing `end function;` was seen.
    pub body_range: Option<Range>,
    pub children: Vec<Definition>,
    pub is_parameter: bool,
    pub has_priority: bool,
    pub signature: Option<String>,
    /// Declared through `@defines` rather than real code.
    pub synthetic: bool,
}

impl Definition {
    pub fn new(name: impl Into<String>, kind: DefinitionKind, name_range: Range) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            ignored: false,
            documentation: String::new(),
            name_range,
            scope_start: None,
            body_range: None,
            children: Vec::new(),
            is_parameter: false,
            has_priority: false,
            signature: None,
            synthetic: false,
        }
    }

    pub fn parameter(name: impl Into<String>, documentation: impl Into<String>, name_range: Range) -> Self {
        Self {
            documentation: documentation.into(),
            is_parameter: true,
            ..Self::new(name, DefinitionKind::Variable, name_range)
        }
    }

    /// Whether `pos` lies inside this definition's body scope.
    ///
    /// A scope that never closed extends to end of file.
    pub fn contains(&self, pos: Position) -> bool {
        let Some(start) = self.scope_start else {
            return false;
        };
        if !position_le(start, pos) {
            return false;
        }
        match self.body_range {
            Some(body) => position_le(pos, body.end),
            None => true,
        }
    }

    /// Whether the definition is declared strictly before `pos`.
    pub fn is_before(&self, pos: Position) -> bool {
        position_lt(self.name_range.start, pos)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Definition> {
        self.children.iter().filter(|c| c.is_parameter)
    }
}

pub fn position_lt(a: Position, b: Position) -> bool {
    (a.line, a.character) < (b.line, b.character)
}

pub fn position_le(a: Position, b: Position) -> bool {
    (a.line, a.character) <= (b.line, b.character)
}

/// Chain of definitions whose scope contains `pos`, outermost first.
pub fn scope_chain(definitions: &[Definition], pos: Position) -> Vec<&Definition> {
    let mut chain = Vec::new();
    let mut level = definitions;
    while let Some(def) = level.iter().rev().find(|d| d.contains(pos)) {
        chain.push(def);
        level = &def.children;
    }
    chain
}

/// Cursor into a definition tree while scanning.
///
/// The cursor stores the index path from the global scope to the definition
/// whose body is currently open. Ascending past the global scope is a no-op.
#[derive(Debug, Default, Clone)]
pub struct ScopeCursor {
    path: Vec<usize>,
}

impl ScopeCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The list the next definition at the current depth is appended to.
    pub fn sibling_slot<'a>(&self, root: &'a mut Vec<Definition>) -> &'a mut Vec<Definition> {
        let mut slot = root;
        for &i in &self.path {
            if i >= slot.len() {
                log::error!("scope cursor index {} out of bounds (len {})", i, slot.len());
                break;
            }
            slot = &mut slot[i].children;
        }
        slot
    }

    /// The definition whose body is currently open, if any.
    pub fn current<'a>(&self, root: &'a mut Vec<Definition>) -> Option<&'a mut Definition> {
        let (&last, parents) = self.path.split_last()?;
        let mut slot = root;
        for &i in parents {
            slot = &mut slot.get_mut(i)?.children;
        }
        slot.get_mut(last)
    }

    /// Append `definition` at the current depth without entering it.
    pub fn push(&self, root: &mut Vec<Definition>, definition: Definition) {
        self.sibling_slot(root).push(definition);
    }

    /// Append `definition` at the current depth and enter its body.
    pub fn descend(&mut self, root: &mut Vec<Definition>, definition: Definition) {
        let slot = self.sibling_slot(root);
        slot.push(definition);
        let index = slot.len() - 1;
        self.path.push(index);
    }

    /// Leave the current body, returning the definition that was exited.
    pub fn ascend<'a>(&mut self, root: &'a mut Vec<Definition>) -> Option<&'a mut Definition> {
        let index = self.path.pop()?;
        self.sibling_slot(root).get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(line: u32, start: u32, end: u32) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    fn function(name: &str, line: u32) -> Definition {
        let mut def = Definition::new(name, DefinitionKind::Function, range(line, 9, 9 + name.len() as u32));
        def.scope_start = Some(def.name_range.end);
        def
    }

    #[test]
    fn test_contains_closed_body() {
        let mut def = function("Foo", 0);
        def.body_range = Some(Range::new(Position::new(0, 12), Position::new(2, 13)));
        assert!(def.contains(Position::new(1, 2)));
        assert!(def.contains(Position::new(2, 13)));
        assert!(!def.contains(Position::new(2, 14)));
        assert!(!def.contains(Position::new(0, 3)));
    }

    #[test]
    fn test_contains_unclosed_body_extends_to_eof() {
        let def = function("Foo", 0);
        assert!(def.contains(Position::new(5000, 0)));
    }

    #[test]
    fn test_variable_has_no_scope() {
        let def = Definition::new("x", DefinitionKind::Variable, range(0, 0, 1));
        assert!(!def.contains(Position::new(0, 0)));
    }

    #[test]
    fn test_is_before_is_strict() {
        let def = Definition::new("x", DefinitionKind::Variable, range(3, 4, 5));
        assert!(!def.is_before(Position::new(3, 4)));
        assert!(def.is_before(Position::new(3, 5)));
        assert!(!def.is_before(Position::new(2, 80)));
    }

    #[test]
    fn test_cursor_descend_and_ascend() {
        let mut root = Vec::new();
        let mut cursor = ScopeCursor::new();
        cursor.descend(&mut root, function("Outer", 0));
        cursor.push(&mut root, Definition::new("y", DefinitionKind::Variable, range(1, 2, 3)));
        cursor.descend(&mut root, function("Inner", 2));
        assert_eq!(cursor.depth(), 2);
        assert_eq!(cursor.current(&mut root).map(|d| d.name.clone()), Some("Inner".to_string()));

        let exited = cursor.ascend(&mut root).map(|d| d.name.clone());
        assert_eq!(exited, Some("Inner".to_string()));
        let exited = cursor.ascend(&mut root).map(|d| d.name.clone());
        assert_eq!(exited, Some("Outer".to_string()));

        assert_eq!(root.len(), 1);
        assert_eq!(root[0].children.len(), 2);
        assert_eq!(root[0].children[0].name, "y");
        assert_eq!(root[0].children[1].name, "Inner");
    }

    #[test]
    fn test_cursor_ascend_saturates_at_root() {
        let mut root = vec![function("Foo", 0)];
        let mut cursor = ScopeCursor::new();
        assert!(cursor.ascend(&mut root).is_none());
        assert_eq!(cursor.depth(), 0);
        assert!(cursor.current(&mut root).is_none());
        cursor.push(&mut root, function("Bar", 4));
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_scope_chain() {
        let mut outer = function("Outer", 0);
        outer.body_range = Some(Range::new(Position::new(0, 14), Position::new(10, 13)));
        let mut inner = function("Inner", 2);
        inner.body_range = Some(Range::new(Position::new(2, 14), Position::new(4, 13)));
        outer.children.push(inner);
        let defs = vec![outer];

        let names: Vec<&str> = scope_chain(&defs, Position::new(3, 0))
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Outer", "Inner"]);

        let names: Vec<&str> = scope_chain(&defs, Position::new(6, 0))
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Outer"]);

        assert!(scope_chain(&defs, Position::new(11, 0)).is_empty());
    }
}
