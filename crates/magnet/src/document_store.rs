//
// document_store.rs
//
// Text buffers for documents the editor has open
//

use dashmap::DashMap;
use ropey::Rope;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};

use crate::utf16::utf16_column_to_byte_offset;

/// An open document's text.
#[derive(Debug, Clone)]
pub struct Document {
    pub contents: Rope,
    pub version: Option<i32>,
    /// Bumped on every applied change.
    pub revision: u64,
}

impl Document {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            contents: Rope::from_str(text),
            version,
            revision: 0,
        }
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        match change.range {
            Some(range) => {
                let start = self.char_index(range.start.line, range.start.character);
                let end = self.char_index(range.end.line, range.end.character);
                let (start, end) = if start <= end { (start, end) } else { (end, start) };
                self.contents.remove(start..end);
                self.contents.insert(start, &change.text);
            }
            // full document sync
            None => self.contents = Rope::from_str(&change.text),
        }
        self.revision += 1;
    }

    /// Char index of an LSP position, clamped to the document.
    fn char_index(&self, line: u32, utf16_col: u32) -> usize {
        let line = line as usize;
        if line >= self.contents.len_lines() {
            return self.contents.len_chars();
        }
        let text = self.contents.line(line).to_string();
        let text = text.trim_end_matches(['\n', '\r']);
        let byte = utf16_column_to_byte_offset(text, utf16_col);
        let line_start = self.contents.line_to_byte(line);
        self.contents.byte_to_char(line_start + byte)
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }

    /// Line `line` without its terminator.
    pub fn line(&self, line: u32) -> Option<String> {
        let line = line as usize;
        if line >= self.contents.len_lines() {
            return None;
        }
        let text = self.contents.line(line).to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Open documents keyed by URI. Open text is authoritative over disk.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, uri: Url, text: &str, version: Option<i32>) {
        self.documents.insert(uri, Document::new(text, version));
    }

    /// Apply changes in order. Returns `false` if the document is not open.
    pub fn apply_changes(
        &self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: Option<i32>,
    ) -> bool {
        let Some(mut doc) = self.documents.get_mut(uri) else {
            log::warn!("Change for unopened document {}", uri);
            return false;
        };
        for change in changes {
            doc.apply_change(change);
        }
        if version.is_some() {
            doc.version = version;
        }
        true
    }

    pub fn close(&self, uri: &Url) -> bool {
        self.documents.remove(uri).is_some()
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn text(&self, uri: &Url) -> Option<String> {
        self.documents.get(uri).map(|d| d.text())
    }

    pub fn line(&self, uri: &Url, line: u32) -> Option<String> {
        self.documents.get(uri).and_then(|d| d.line(line))
    }

    pub fn version(&self, uri: &Url) -> Option<i32> {
        self.documents.get(uri).and_then(|d| d.version)
    }

    pub fn uris(&self) -> Vec<Url> {
        self.documents.iter().map(|d| d.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(sl, sc), Position::new(el, ec))),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_incremental_edit() {
        let mut doc = Document::new("x := 1;\ny := 2;\n", Some(1));
        doc.apply_change(edit(1, 0, 1, 1, "zz"));
        assert_eq!(doc.text(), "x := 1;\nzz := 2;\n");
        assert_eq!(doc.revision, 1);
    }

    #[test]
    fn test_edit_after_multibyte_character() {
        // "é" is one UTF-16 unit but two bytes
        let mut doc = Document::new("s := \"é\"; t := 1;", None);
        doc.apply_change(edit(0, 10, 0, 11, "u"));
        assert_eq!(doc.text(), "s := \"é\"; u := 1;");
    }

    #[test]
    fn test_full_sync_and_line() {
        let store = DocumentStore::new();
        let uri = Url::parse("file:///workspace/a.m").unwrap();
        store.open(uri.clone(), "a\nb", Some(1));
        let full = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "first\r\nsecond".to_string(),
        };
        assert!(store.apply_changes(&uri, vec![full], Some(2)));
        assert_eq!(store.line(&uri, 0).as_deref(), Some("first"));
        assert_eq!(store.line(&uri, 1).as_deref(), Some("second"));
        assert_eq!(store.line(&uri, 5), None);
        assert_eq!(store.version(&uri), Some(2));
        assert!(store.close(&uri));
        assert!(!store.apply_changes(&uri, Vec::new(), None));
    }
}
