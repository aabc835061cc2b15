//! Client core of the translation workstation: document previews, translation job
//! orchestration and the session that ties them to user intents.

pub mod content;
pub mod error;
pub mod markdown;
pub mod progress;
pub mod render;
pub mod session;
pub mod settings;
pub mod source;
pub mod translation;

pub use content::{Content, ErrorNotice, RetryAction, TranslationPanel};
pub use error::{ClientError, ClientResult};
pub use session::{Completion, Session, SessionController, SessionEvent};
pub use settings::{load_settings, load_settings_from, ClientSettings};
pub use source::{DocumentSource, HttpDocumentSource, PageImage};
pub use translation::{JobTicket, TranslationJob};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
