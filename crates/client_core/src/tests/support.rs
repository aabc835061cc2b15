//! In-memory [`DocumentSource`] with scripted responses and a call log.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::protocol::{
    FileEntry, SelectFolderResponse, TranslationResultResponse, TranslationStatusPayload,
};

use crate::{
    error::{ClientError, ClientResult},
    source::{DocumentSource, PageImage},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SelectFolder(String),
    ViewPdf(String, u32),
    ReadFile(String),
    Translate(String),
    Status(String),
    Result(String),
    Download(String),
}

#[derive(Default)]
struct Script {
    folders: HashMap<String, Vec<FileEntry>>,
    pdf_pages: HashMap<String, u32>,
    files: HashMap<String, String>,
    start_errors: HashMap<String, ClientError>,
    statuses: HashMap<String, VecDeque<ClientResult<TranslationStatusPayload>>>,
    results: HashMap<String, TranslationResultResponse>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    pub fn with_folder(self, folder: &str, files: Vec<FileEntry>) -> Self {
        self.script().folders.insert(folder.into(), files);
        self
    }

    pub fn with_pdf(self, path: &str, total_pages: u32) -> Self {
        self.script().pdf_pages.insert(path.into(), total_pages);
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.script().files.insert(path.into(), content.into());
        self
    }

    pub fn with_result(self, path: &str, content: &str) -> Self {
        self.set_result(path, content);
        self
    }

    pub fn set_result(&self, path: &str, content: &str) {
        self.script().results.insert(
            path.into(),
            TranslationResultResponse {
                content: content.into(),
                translated_path: None,
            },
        );
    }

    pub fn with_translated_file(self, path: &str, content: &str, translated_path: &str) -> Self {
        self.script().results.insert(
            path.into(),
            TranslationResultResponse {
                content: content.into(),
                translated_path: Some(translated_path.into()),
            },
        );
        self
    }

    pub fn reject_start(self, path: &str, err: ClientError) -> Self {
        self.script().start_errors.insert(path.into(), err);
        self
    }

    pub fn push_status(&self, path: &str, status: ClientResult<TranslationStatusPayload>) {
        self.script()
            .statuses
            .entry(path.into())
            .or_default()
            .push_back(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.script().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

pub fn running(percent: f64, done: u32, total: u32) -> ClientResult<TranslationStatusPayload> {
    Ok(TranslationStatusPayload {
        status: Some("running".into()),
        progress_percent: Some(percent),
        chunks_completed: Some(done),
        total_chunks: Some(total),
        ..TranslationStatusPayload::default()
    })
}

pub fn finished(word: &str) -> ClientResult<TranslationStatusPayload> {
    Ok(TranslationStatusPayload {
        status: Some(word.into()),
        ..TranslationStatusPayload::default()
    })
}

#[async_trait]
impl DocumentSource for ScriptedSource {
    async fn select_folder(&self, path: &str) -> ClientResult<SelectFolderResponse> {
        self.record(Call::SelectFolder(path.into()));
        let files = self
            .script()
            .folders
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Backend(format!("folder not found: {path}")))?;
        Ok(SelectFolderResponse {
            files,
            message: None,
        })
    }

    async fn view_pdf(&self, path: &str, page: u32, _dpi: Option<u32>) -> ClientResult<PageImage> {
        self.record(Call::ViewPdf(path.into(), page));
        let total_pages = self
            .script()
            .pdf_pages
            .get(path)
            .copied()
            .ok_or_else(|| ClientError::Backend(format!("no scripted page for {path}")))?;
        Ok(PageImage {
            png: format!("png:{path}:{page}").into_bytes(),
            total_pages,
        })
    }

    async fn read_file(&self, path: &str) -> ClientResult<String> {
        self.record(Call::ReadFile(path.into()));
        self.script()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Backend(format!("no scripted file for {path}")))
    }

    async fn start_translation(&self, path: &str) -> ClientResult<()> {
        self.record(Call::Translate(path.into()));
        match self.script().start_errors.get(path) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn translation_status(
        &self,
        path: &str,
        _include_partial: bool,
    ) -> ClientResult<TranslationStatusPayload> {
        self.record(Call::Status(path.into()));
        self.script()
            .statuses
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted status".into())))
    }

    async fn translation_result(
        &self,
        path: &str,
    ) -> ClientResult<Option<TranslationResultResponse>> {
        self.record(Call::Result(path.into()));
        Ok(self.script().results.get(path).cloned())
    }

    async fn download(&self, path: &str) -> ClientResult<Vec<u8>> {
        self.record(Call::Download(path.into()));
        Ok(path.as_bytes().to_vec())
    }
}
