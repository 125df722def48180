//
// cross_file/content_provider.rs
//
// Reading document text for documents that are not open in the editor
//

use tower_lsp::lsp_types::Url;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("file not found: {0}")]
    NotFound(Url),
    #[error("not a file URI: {0}")]
    NotAFile(Url),
    #[error("failed to read {uri}: {source}")]
    Io {
        uri: Url,
        #[source]
        source: std::io::Error,
    },
}

/// Source of text for documents the editor does not own.
///
/// Open documents are authoritative; callers consult their buffers first
/// and fall back to a `TextSource` only for closed documents.
pub trait TextSource: Send + Sync {
    fn read(&self, uri: &Url) -> Result<String, ReadError>;
}

/// Reads `file://` URIs from disk. Invalid UTF-8 is replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextSource;

impl TextSource for FsTextSource {
    fn read(&self, uri: &Url) -> Result<String, ReadError> {
        let path = uri
            .to_file_path()
            .map_err(|_| ReadError::NotAFile(uri.clone()))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ReadError::NotFound(uri.clone())),
            Err(source) => Err(ReadError::Io {
                uri: uri.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.m");
        std::fs::write(&path, "x := 1;\n").unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        assert_eq!(FsTextSource.read(&uri).unwrap(), "x := 1;\n");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let uri = Url::from_file_path(dir.path().join("missing.m")).unwrap();
        assert!(matches!(FsTextSource.read(&uri), Err(ReadError::NotFound(_))));
    }

    #[test]
    fn test_read_non_file_uri() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        assert!(matches!(FsTextSource.read(&uri), Err(ReadError::NotAFile(_))));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.m");
        std::fs::write(&path, [b'x', 0xff, b'y']).unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        assert_eq!(FsTextSource.read(&uri).unwrap(), "x\u{fffd}y");
    }
}
