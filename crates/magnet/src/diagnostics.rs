//
// diagnostics.rs
//
// Scanner diagnostics: a stable message key plus positional arguments
//

use dashmap::DashMap;
use serde::Serialize;
use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString, Range, Url};

/// Stable identifiers for user-facing messages.
///
/// The key string is what clients localize against; `template` is the English
/// fallback with `{0}`, `{1}` placeholders for the positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKey {
    FileNotFound,
    RedefinedIntrinsic,
    DefinesMissingKind,
    DefinesUnknownKind,
    DefinesMalformedArguments,
}

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::FileNotFound => "magnet.fileNotFound",
            MessageKey::RedefinedIntrinsic => "magnet.redefinedIntrinsic",
            MessageKey::DefinesMissingKind => "magnet.definesMissingKind",
            MessageKey::DefinesUnknownKind => "magnet.definesUnknownKind",
            MessageKey::DefinesMalformedArguments => "magnet.definesMalformedArguments",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            MessageKey::FileNotFound => "No file matches '{0}'",
            MessageKey::RedefinedIntrinsic => "'{0}' redefines a built-in intrinsic",
            MessageKey::DefinesMissingKind => {
                "@defines needs a kind: function, procedure or intrinsic"
            }
            MessageKey::DefinesUnknownKind => {
                "Unknown @defines kind '{0}'; expected function, procedure or intrinsic"
            }
            MessageKey::DefinesMalformedArguments => "Malformed argument list in @defines '{0}'",
        }
    }
}

/// A diagnostic produced while scanning one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub key: MessageKey,
    pub args: Vec<String>,
    pub severity: DiagnosticSeverity,
}

impl Diagnostic {
    pub fn new(range: Range, key: MessageKey, args: Vec<String>, severity: DiagnosticSeverity) -> Self {
        Self {
            range,
            key,
            args,
            severity,
        }
    }

    /// Render the English message, substituting positional arguments.
    pub fn message(&self) -> String {
        let mut text = self.key.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", i), arg);
        }
        text
    }

    pub fn to_lsp(&self) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: self.range,
            severity: Some(self.severity),
            code: Some(NumberOrString::String(self.key.as_str().to_string())),
            source: Some("magnet".to_string()),
            message: self.message(),
            ..Default::default()
        }
    }
}

/// Per-document diagnostics, overwritten on every rescan.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    inner: DashMap<Url, Vec<Diagnostic>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.inner.insert(uri, diagnostics);
    }

    pub fn get(&self, uri: &Url) -> Vec<Diagnostic> {
        self.inner
            .get(uri)
            .map(|d| d.value().clone())
            .unwrap_or_default()
    }

    pub fn remove(&self, uri: &Url) {
        self.inner.remove(uri);
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}
