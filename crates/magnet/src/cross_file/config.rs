//
// cross_file/config.rs
//
// Configuration for the definition index
//

use std::time::Duration;

use serde_json::Value;
use tower_lsp::lsp_types::DiagnosticSeverity;

/// Definition categories that can be hidden from dependency lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Suppression {
    pub forwards: bool,
    pub functions: bool,
    pub variables: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Master switch; disabled definitions are never returned.
    pub definitions_enabled: bool,
    /// Only documented functions, procedures and forwards are enabled.
    pub only_documented: bool,
    /// Treat the plain comment right above a definition as its documentation.
    pub last_comment_as_documentation: bool,
    pub suppress: Suppression,
    pub debounce_ms: u64,
    pub cache_timeout: Duration,
    pub cache_poll_interval: Duration,
    pub watch_files: bool,
    pub missing_file_severity: DiagnosticSeverity,
    pub redefinition_severity: DiagnosticSeverity,
}

impl Default for IndexConfig {
    /// ```
    /// use magnet::cross_file::IndexConfig;
    ///
    /// let cfg = IndexConfig::default();
    /// assert!(cfg.definitions_enabled);
    /// assert_eq!(cfg.debounce_ms, 300);
    /// ```
    fn default() -> Self {
        Self {
            definitions_enabled: true,
            only_documented: false,
            last_comment_as_documentation: false,
            suppress: Suppression::default(),
            debounce_ms: 300,
            cache_timeout: Duration::from_secs(5),
            cache_poll_interval: Duration::from_millis(25),
            watch_files: true,
            missing_file_severity: DiagnosticSeverity::ERROR,
            redefinition_severity: DiagnosticSeverity::WARNING,
        }
    }
}

impl IndexConfig {
    /// Build a config from client settings.
    ///
    /// Accepts either the `magnet` section itself or an object containing it.
    /// Missing or mistyped fields keep their defaults.
    pub fn from_settings(settings: &Value) -> Self {
        let section = settings.get("magnet").unwrap_or(settings);
        let mut config = Self::default();
        if !section.is_object() {
            if !section.is_null() {
                log::warn!("Ignoring non-object magnet settings: {}", section);
            }
            return config;
        }

        if let Some(definitions) = section.get("definitions") {
            if let Some(v) = read_bool(definitions, "enabled") {
                config.definitions_enabled = v;
            }
            if let Some(v) = read_bool(definitions, "onlyDocumented") {
                config.only_documented = v;
            }
        }
        if let Some(v) = read_bool(section, "lastCommentAsDocumentation") {
            config.last_comment_as_documentation = v;
        }
        if let Some(suppress) = section.get("suppress") {
            if let Some(v) = read_bool(suppress, "forwards") {
                config.suppress.forwards = v;
            }
            if let Some(v) = read_bool(suppress, "functions") {
                config.suppress.functions = v;
            }
            if let Some(v) = read_bool(suppress, "variables") {
                config.suppress.variables = v;
            }
        }
        if let Some(v) = read_u64(section, "debounceMs") {
            config.debounce_ms = v;
        }
        if let Some(v) = read_u64(section, "cacheTimeoutSecs") {
            config.cache_timeout = Duration::from_secs(v);
        }
        if let Some(v) = read_u64(section, "cachePollIntervalMs") {
            config.cache_poll_interval = Duration::from_millis(v.max(1));
        }
        if let Some(v) = read_bool(section, "watchFiles") {
            config.watch_files = v;
        }
        if let Some(v) = section.get("missingFileSeverity").and_then(|v| v.as_str()) {
            config.missing_file_severity = parse_severity(v);
        }
        if let Some(v) = section.get("redefinitionSeverity").and_then(|v| v.as_str()) {
            config.redefinition_severity = parse_severity(v);
        }
        config
    }

    /// Whether switching to `other` changes what a scan produces.
    pub fn scan_settings_changed(&self, other: &Self) -> bool {
        self.definitions_enabled != other.definitions_enabled
            || self.only_documented != other.only_documented
            || self.last_comment_as_documentation != other.last_comment_as_documentation
            || self.suppress != other.suppress
            || self.missing_file_severity != other.missing_file_severity
            || self.redefinition_severity != other.redefinition_severity
    }
}

fn read_bool(value: &Value, key: &str) -> Option<bool> {
    let v = value.get(key)?;
    let parsed = v.as_bool();
    if parsed.is_none() {
        log::warn!("Setting '{}' expects a boolean, got {}", key, v);
    }
    parsed
}

fn read_u64(value: &Value, key: &str) -> Option<u64> {
    let v = value.get(key)?;
    let parsed = v.as_u64();
    if parsed.is_none() {
        log::warn!("Setting '{}' expects a non-negative integer, got {}", key, v);
    }
    parsed
}

pub fn parse_severity(s: &str) -> DiagnosticSeverity {
    match s.to_lowercase().as_str() {
        "error" => DiagnosticSeverity::ERROR,
        "warning" => DiagnosticSeverity::WARNING,
        "information" | "info" => DiagnosticSeverity::INFORMATION,
        "hint" => DiagnosticSeverity::HINT,
        _ => {
            log::warn!("Unknown severity '{}', using warning", s);
            DiagnosticSeverity::WARNING
        }
    }
}
