//! The document source service: every network call the client core makes goes
//! through [`DocumentSource`].

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    error::{BackendErrorBody, BackendRejection},
    protocol::{
        ReadFileResponse, SelectFolderRequest, SelectFolderResponse, TranslateRequest,
        TranslateResponse, TranslationResultResponse, TranslationStatusPayload, ViewPdfRequest,
        ViewPdfResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A rendered PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub png: Vec<u8>,
    pub total_pages: u32,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn select_folder(&self, path: &str) -> ClientResult<SelectFolderResponse>;
    async fn view_pdf(&self, path: &str, page: u32, dpi: Option<u32>) -> ClientResult<PageImage>;
    async fn read_file(&self, path: &str) -> ClientResult<String>;
    /// Succeeds only when the backend acknowledged the job with `status = "started"`.
    async fn start_translation(&self, path: &str) -> ClientResult<()>;
    async fn translation_status(
        &self,
        path: &str,
        include_partial: bool,
    ) -> ClientResult<TranslationStatusPayload>;
    /// `Ok(None)` when the backend has no translation for the document yet.
    async fn translation_result(&self, path: &str)
        -> ClientResult<Option<TranslationResultResponse>>;
    async fn download(&self, path: &str) -> ClientResult<Vec<u8>>;
}

pub struct HttpDocumentSource {
    http: Client,
    api_base: Url,
}

impl HttpDocumentSource {
    pub fn new(server_url: &str) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Transport(format!("failed to build http client: {err}")))?;
        Self::with_client(server_url, http)
    }

    pub fn with_client(server_url: &str, http: Client) -> ClientResult<Self> {
        let api_base = api_base(server_url)?;
        Ok(Self { http, api_base })
    }

    fn endpoint(&self, name: &str) -> ClientResult<Url> {
        self.api_base
            .join(name)
            .map_err(|err| ClientError::InvalidPayload(format!("bad endpoint {name}: {err}")))
    }

    /// URL of the download endpoint for `path`, for hosts that hand it to a browser
    /// or save dialog.
    pub fn download_url(&self, path: &str) -> ClientResult<Url> {
        let mut url = self.endpoint("download")?;
        url.query_pairs_mut().append_pair("path", path);
        Ok(url)
    }
}

fn api_base(server_url: &str) -> ClientResult<Url> {
    let trimmed = server_url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::InvalidPayload(
            "server_url must start with http:// or https://".into(),
        ));
    }
    Url::parse(&format!("{trimmed}/api/")).map_err(|err| {
        ClientError::InvalidPayload(format!("invalid server_url {server_url}: {err}"))
    })
}

/// Turns a non-success response into [`ClientError::Status`] carrying the backend's
/// error text, and decodes success bodies as `T`.
async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = ensure_success(response).await?;
    response.json::<T>().await.map_err(|err| {
        ClientError::Transport(format!("failed to decode response body: {err}"))
    })
}

async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<BackendErrorBody>(&raw).unwrap_or_else(|_| {
        if raw.trim().is_empty() {
            BackendErrorBody::default()
        } else {
            BackendErrorBody::new(raw.trim())
        }
    });
    Err(BackendRejection::from_body(status.as_u16(), &body).into())
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn select_folder(&self, path: &str) -> ClientResult<SelectFolderResponse> {
        let res = self
            .http
            .post(self.endpoint("select-folder")?)
            .json(&SelectFolderRequest {
                path: path.to_string(),
            })
            .send()
            .await?;
        decode(res).await
    }

    async fn view_pdf(&self, path: &str, page: u32, dpi: Option<u32>) -> ClientResult<PageImage> {
        let res = self
            .http
            .post(self.endpoint("view-pdf")?)
            .json(&ViewPdfRequest {
                path: path.to_string(),
                page,
                dpi,
            })
            .send()
            .await?;
        let body: ViewPdfResponse = decode(res).await?;
        let Some(image) = body.image.filter(|image| !image.is_empty()) else {
            return Err(ClientError::Backend(
                body.error
                    .unwrap_or_else(|| "the backend returned no page image".to_string()),
            ));
        };
        let png = STANDARD.decode(image.trim()).map_err(|err| {
            ClientError::InvalidPayload(format!("page image is not base64: {err}"))
        })?;
        Ok(PageImage {
            png,
            total_pages: body.total_pages.unwrap_or(1).max(1),
        })
    }

    async fn read_file(&self, path: &str) -> ClientResult<String> {
        let res = self
            .http
            .get(self.endpoint("read-file")?)
            .query(&[("path", path)])
            .send()
            .await?;
        let body: ReadFileResponse = decode(res).await?;
        body.content.ok_or_else(|| {
            ClientError::Backend(
                body.error
                    .unwrap_or_else(|| "the backend returned no file content".to_string()),
            )
        })
    }

    async fn start_translation(&self, path: &str) -> ClientResult<()> {
        let res = self
            .http
            .post(self.endpoint("translate")?)
            .json(&TranslateRequest {
                path: path.to_string(),
            })
            .send()
            .await?;
        let body: TranslateResponse = decode(res).await?;
        if body.is_started() {
            debug!(path, "translation job acknowledged");
            return Ok(());
        }
        Err(ClientError::Backend(
            body.error
                .unwrap_or_else(|| "translation failed to start".to_string()),
        ))
    }

    async fn translation_status(
        &self,
        path: &str,
        include_partial: bool,
    ) -> ClientResult<TranslationStatusPayload> {
        let res = self
            .http
            .get(self.endpoint("translation-status")?)
            .query(&[
                ("path", path),
                ("include_partial", if include_partial { "true" } else { "false" }),
            ])
            .send()
            .await?;
        decode(res).await
    }

    async fn translation_result(
        &self,
        path: &str,
    ) -> ClientResult<Option<TranslationResultResponse>> {
        let res = self
            .http
            .get(self.endpoint("translation-result")?)
            .query(&[("path", path)])
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(res).await.map(Some)
    }

    async fn download(&self, path: &str) -> ClientResult<Vec<u8>> {
        let res = self.http.get(self.download_url(path)?).send().await?;
        let res = ensure_success(res).await?;
        Ok(res.bytes().await?.to_vec())
    }
}


#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod http_tests;
