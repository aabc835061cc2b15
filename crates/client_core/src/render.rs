//! Maps (document, view state) to presentable content.

use shared::domain::{DocumentDescriptor, DocumentKind, ViewMode, ViewState};
use tracing::debug;

use crate::{
    content::Content,
    error::{ClientError, ClientResult},
    markdown,
    source::DocumentSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub content: Content,
    /// Page count reported by a raster fetch; the session reconciles its view with it.
    pub total_pages: Option<u32>,
}

pub async fn render(
    source: &dyn DocumentSource,
    document: &DocumentDescriptor,
    view: ViewState,
    dpi: Option<u32>,
) -> ClientResult<RenderedView> {
    match view.mode {
        ViewMode::Raster if document.kind == DocumentKind::Pdf => {
            debug!(path = document.path(), page = view.current_page, "rendering page image");
            let page = source
                .view_pdf(document.path(), view.current_page, dpi)
                .await
                .map_err(ClientError::into_fetch_failed)?;
            Ok(RenderedView {
                content: Content::Image {
                    png: page.png,
                    page: view.current_page,
                    total_pages: page.total_pages,
                },
                total_pages: Some(page.total_pages),
            })
        }
        ViewMode::Raster => {
            let text = source
                .read_file(document.path())
                .await
                .map_err(ClientError::into_fetch_failed)?;
            Ok(RenderedView {
                content: Content::PlainText(text),
                total_pages: None,
            })
        }
        ViewMode::Text => {
            let path = document.text_source().ok_or(ClientError::UnsupportedView)?;
            debug!(path, "rendering text view");
            let text = source
                .read_file(path)
                .await
                .map_err(ClientError::into_fetch_failed)?;
            Ok(RenderedView {
                content: Content::RichText(markdown::parse(&text)),
                total_pages: None,
            })
        }
    }
}
