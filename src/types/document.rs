//! Source documents handed to the pipeline
//!
//! A document is immutable once created. The pipeline only reads its content;
//! cleanup of backing files stays with the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::{QuizError, Result};

/// Where a document's bytes live
#[derive(Debug, Clone)]
pub enum ContentRef {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    content: ContentRef,
    size_bytes: u64,
}

impl SourceDocument {
    /// Reference a file on disk, rejecting empty files up front
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if metadata.len() == 0 {
            return Err(QuizError::EmptyDocument(name));
        }

        Ok(Self {
            name,
            content: ContentRef::File(path.to_path_buf()),
            size_bytes: metadata.len(),
        })
    }

    /// In-memory document, e.g. a fetched transcript
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_bytes(name, text.into().into_bytes())
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            content: ContentRef::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn content(&self) -> &ContentRef {
        &self.content
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match &self.content {
            ContentRef::File(path) => tokio::fs::read(path).await?,
            ContentRef::Memory(bytes) => bytes.to_vec(),
        };

        if bytes.is_empty() {
            return Err(QuizError::EmptyDocument(self.name.clone()));
        }
        Ok(bytes)
    }

    /// MIME type by file extension
    pub fn mime_type(&self) -> &'static str {
        let extension = Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => "application/pdf",
            Some("txt") => "text/plain",
            Some("md") => "text/markdown",
            Some("docx") => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            _ => "application/octet-stream",
        }
    }
}

pub fn total_size(documents: &[SourceDocument]) -> u64 {
    documents.iter().map(SourceDocument::size_bytes).sum()
}

/// Comma-separated document names for error messages
pub fn describe(documents: &[SourceDocument]) -> String {
    documents
        .iter()
        .map(SourceDocument::name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_from_path_reads_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        let body = "# Borrowing\nShared or mutable.";
        std::fs::write(&path, body).unwrap();

        let doc = SourceDocument::from_path(&path).await.unwrap();
        assert_eq!(doc.name(), "notes.md");
        assert_eq!(doc.size_bytes(), body.len() as u64);
        assert_eq!(doc.mime_type(), "text/markdown");
        assert_eq!(doc.read_bytes().await.unwrap(), body.as_bytes());
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, b"").unwrap();

        let err = SourceDocument::from_path(&path).await.unwrap_err();
        assert!(matches!(err, QuizError::EmptyDocument(name) if name == "empty.pdf"));
    }

    #[tokio::test]
    async fn test_empty_memory_document_fails_on_read() {
        let doc = SourceDocument::from_text("blank.txt", "");
        assert!(matches!(
            doc.read_bytes().await,
            Err(QuizError::EmptyDocument(_))
        ));
    }

    #[test]
    fn test_mime_types() {
        let mime = |name: &str| SourceDocument::from_text(name, "x").mime_type();
        assert_eq!(mime("a.PDF"), "application/pdf");
        assert_eq!(mime("a.txt"), "text/plain");
        assert_eq!(
            mime("a.docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(mime("a.bin"), "application/octet-stream");
        assert_eq!(mime("noext"), "application/octet-stream");
    }

    #[test]
    fn test_total_size_and_describe() {
        let docs = vec![
            SourceDocument::from_text("a.txt", "abc"),
            SourceDocument::from_text("b.txt", "de"),
        ];
        assert_eq!(total_size(&docs), 5);
        assert_eq!(describe(&docs), "a.txt, b.txt");
    }
}
