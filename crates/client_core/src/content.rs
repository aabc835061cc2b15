//! Renderer-agnostic descriptions of what the two panels should show.

use shared::protocol::TranslationResult;

use crate::{markdown::RichText, progress::ProgressSnapshot};

/// Operation a host re-invokes from an error's retry affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Render,
    LoadFolder,
    Translate,
    LoadResult,
}

/// A failure outside the two panels, such as a folder scan, with its retry affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub retry: RetryAction,
}

/// Left panel: the document preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Image {
        png: Vec<u8>,
        page: u32,
        total_pages: u32,
    },
    RichText(RichText),
    PlainText(String),
    ErrorMessage {
        message: String,
        retry: Option<RetryAction>,
    },
}

impl Content {
    pub fn error(message: impl Into<String>, retry: RetryAction) -> Self {
        Self::ErrorMessage {
            message: message.into(),
            retry: Some(retry),
        }
    }
}

/// Right panel: translation progress or outcome for the open document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TranslationPanel {
    #[default]
    Empty,
    /// Waiting on the initial `translation-result` lookup or on the start request.
    Loading,
    /// The document has never been translated.
    NotTranslated,
    Progress {
        file_name: String,
        snapshot: ProgressSnapshot,
    },
    Finished {
        result: TranslationResult,
        rendered: RichText,
    },
    Failed {
        message: String,
        retry: RetryAction,
    },
}
