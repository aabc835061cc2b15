use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique key of a listed document: the path the backend reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Text,
    Html,
    Markdown,
    Other,
}

impl DocumentKind {
    /// Maps the backend's `type` tag, falling back to the path extension when the
    /// tag is absent or unrecognised.
    pub fn classify(type_tag: Option<&str>, path: &str) -> Self {
        if let Some(kind) = type_tag.and_then(Self::from_tag) {
            return kind;
        }
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self::from_tag(&extension).unwrap_or(Self::Other)
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Whether the file itself can be read as text and fed to the markdown view.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Html | Self::Markdown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub id: DocumentId,
    pub display_name: String,
    pub kind: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub detection_confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_markdown_path: Option<String>,
}

/// Languages for which the file list shows no badge: the workstation translates into Korean.
const TARGET_LANGUAGE: &str = "ko";
const MIN_BADGE_CONFIDENCE: u8 = 50;

impl DocumentDescriptor {
    pub fn new(path: impl Into<String>, kind: DocumentKind) -> Self {
        let path = path.into();
        let display_name = file_name(&path).to_string();
        Self {
            id: DocumentId(path),
            display_name,
            kind,
            detected_language: None,
            detection_confidence: 0,
            original_markdown_path: None,
        }
    }

    pub fn path(&self) -> &str {
        self.id.as_str()
    }

    /// Path to read for the text view, if the document has one.
    pub fn text_source(&self) -> Option<&str> {
        if self.kind.is_textual() {
            Some(self.path())
        } else {
            self.original_markdown_path
                .as_deref()
                .filter(|path| !path.trim().is_empty())
        }
    }

    /// Display name prefixed with a language flag when a foreign language was detected
    /// with enough confidence.
    pub fn badge_label(&self) -> String {
        let Some(code) = self.detected_language.as_deref() else {
            return self.display_name.clone();
        };
        if self.detection_confidence < MIN_BADGE_CONFIDENCE {
            return self.display_name.clone();
        }
        match language_flag(code) {
            Some(flag) => format!("{flag} {}", self.display_name),
            None => self.display_name.clone(),
        }
    }
}

pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn language_flag(code: &str) -> Option<&'static str> {
    let code = code.trim().to_ascii_lowercase();
    if code.is_empty() || code == TARGET_LANGUAGE {
        return None;
    }
    let flag = match code.as_str() {
        "en" => "🇺🇸",
        "ja" => "🇯🇵",
        "zh" | "zh-cn" => "🇨🇳",
        "zh-tw" => "🇹🇼",
        "es" => "🇪🇸",
        "fr" => "🇫🇷",
        "de" => "🇩🇪",
        "ru" => "🇷🇺",
        "ar" => "🇸🇦",
        "pt" => "🇵🇹",
        "it" => "🇮🇹",
        "vi" => "🇻🇳",
        "th" => "🇹🇭",
        "id" => "🇮🇩",
        "hi" => "🇮🇳",
        "nl" => "🇳🇱",
        "pl" => "🇵🇱",
        "tr" => "🇹🇷",
        "sv" => "🇸🇪",
        "da" => "🇩🇰",
        "no" => "🇳🇴",
        "fi" => "🇫🇮",
        "ms" => "🇲🇾",
        "tl" | "fil" => "🇵🇭",
        "unknown" | "undefined" => "🏳️",
        _ => "🌐",
    };
    Some(flag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Raster,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub mode: ViewMode,
    pub current_page: u32,
    pub total_pages: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            mode: ViewMode::Raster,
            current_page: 1,
            total_pages: 1,
        }
    }
}

impl ViewState {
    /// Adopts the page count reported by a raster fetch, keeping `total_pages >= 1`
    /// and the current page inside the range.
    pub fn reconcile_total_pages(&mut self, reported: u32) {
        self.total_pages = reported.max(1);
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    pub fn page_controls_visible(&self) -> bool {
        self.mode == ViewMode::Raster && self.total_pages > 1
    }

    /// Target page for a relative move, clamped to `[1, total_pages]`.
    pub fn clamped_page(&self, delta: i32) -> u32 {
        let target = i64::from(self.current_page) + i64::from(delta);
        target.clamp(1, i64::from(self.total_pages.max(1))) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    Pending,
    Processing,
    Done,
    Error,
}

impl ChunkState {
    /// Unknown status strings are treated as not started yet.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("completed" | "done") => Self::Done,
            Some("processing" | "running" | "translating" | "in_progress") => Self::Processing,
            Some("error" | "failed") => Self::Error,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStatus {
    pub index: usize,
    pub label: String,
    pub size_chars: u64,
    pub state: ChunkState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Started,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States in which the status endpoint is still being polled.
    pub fn is_polling(self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }
}
