//! Request and response bodies of the translation backend's `/api` endpoints.
//!
//! Only the fields the client consumes are modelled; everything is lenient on input
//! because the backend omits optional fields freely.

use serde::{Deserialize, Serialize};

use crate::domain::{DocumentDescriptor, DocumentId, DocumentKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectFolderRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub original_md_path: Option<String>,
}

impl FileEntry {
    pub fn into_descriptor(self) -> DocumentDescriptor {
        let kind = DocumentKind::classify(self.kind.as_deref(), &self.path);
        let mut descriptor = DocumentDescriptor::new(self.path, kind);
        if let Some(name) = self.name.filter(|name| !name.trim().is_empty()) {
            descriptor.display_name = name;
        }
        descriptor.detected_language = self.language.filter(|code| !code.trim().is_empty());
        descriptor.detection_confidence =
            self.confidence.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8;
        descriptor.original_markdown_path =
            self.original_md_path.filter(|path| !path.trim().is_empty());
        descriptor
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectFolderResponse {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewPdfRequest {
    pub path: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewPdfResponse {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranslateResponse {
    pub fn is_started(&self) -> bool {
        self.status.as_deref() == Some("started")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Job-level status as reported by `translation-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Running,
    Completed,
    Error,
    Other(String),
}

impl RemoteJobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "completed" | "done" => Self::Completed,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationStatusPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub chunks_completed: Option<u32>,
    #[serde(default)]
    pub total_chunks: Option<u32>,
    #[serde(default)]
    pub chunks_info: Option<Vec<ChunkInfo>>,
    #[serde(default)]
    pub partial_results: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranslationStatusPayload {
    pub fn remote_status(&self) -> RemoteJobStatus {
        RemoteJobStatus::parse(self.status.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResultResponse {
    pub content: String,
    #[serde(default)]
    pub translated_path: Option<String>,
}

/// A finished translation as held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub document_id: DocumentId,
    pub content: String,
    pub translated_path: Option<String>,
}

impl TranslationResult {
    /// Path handed to the download endpoint: the translated file when the backend
    /// names one, else the source document.
    pub fn download_path(&self) -> &str {
        self.translated_path
            .as_deref()
            .unwrap_or(self.document_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_with_only_path_gets_defaults() {
        let entry: FileEntry = serde_json::from_str(r#"{"path":"/in/a.pdf"}"#).expect("entry");
        let descriptor = entry.into_descriptor();
        assert_eq!(descriptor.display_name, "a.pdf");
        assert_eq!(descriptor.kind, DocumentKind::Pdf);
        assert_eq!(descriptor.detection_confidence, 0);
        assert!(descriptor.original_markdown_path.is_none());
    }

    #[test]
    fn file_entry_keeps_backend_metadata() {
        let entry: FileEntry = serde_json::from_str(
            r#"{"path":"/in/b.md","name":"b (converted)","language":"en","confidence":87.6,
                "type":"md","original_md_path":"/in/b.md"}"#,
        )
        .expect("entry");
        let descriptor = entry.into_descriptor();
        assert_eq!(descriptor.display_name, "b (converted)");
        assert_eq!(descriptor.kind, DocumentKind::Markdown);
        assert_eq!(descriptor.detected_language.as_deref(), Some("en"));
        assert_eq!(descriptor.detection_confidence, 88);
        assert_eq!(descriptor.original_markdown_path.as_deref(), Some("/in/b.md"));
    }

    #[test]
    fn status_words_map_to_remote_status() {
        assert_eq!(RemoteJobStatus::parse("running"), RemoteJobStatus::Running);
        assert_eq!(RemoteJobStatus::parse("done"), RemoteJobStatus::Completed);
        assert_eq!(RemoteJobStatus::parse("COMPLETED"), RemoteJobStatus::Completed);
        assert_eq!(RemoteJobStatus::parse("error"), RemoteJobStatus::Error);
        assert_eq!(
            RemoteJobStatus::parse("queued"),
            RemoteJobStatus::Other("queued".into())
        );
    }

    #[test]
    fn download_path_prefers_translated_file() {
        let mut result = TranslationResult {
            document_id: DocumentId::from("/in/a.pdf"),
            content: "x".into(),
            translated_path: None,
        };
        assert_eq!(result.download_path(), "/in/a.pdf");
        result.translated_path = Some("/out/a_ko.md".into());
        assert_eq!(result.download_path(), "/out/a_ko.md");
    }
}
