// lib.rs — the magnet library: scanner, cross-file index and LSP front end.
//
// main.rs is a thin command-line wrapper over these modules; benches/ and
// tests/ link against them directly.

pub mod backend;
pub mod builtins;
pub mod cli;
pub mod cross_file;
pub mod definition;
pub mod diagnostics;
pub mod doc_comment;
pub mod document_store;
pub mod handlers;
pub mod perf;
pub mod render;
pub mod scanner;
pub mod state;
pub mod utf16;

// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

#[cfg(test)]
mod property_tests;
