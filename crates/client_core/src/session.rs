//! The document session and the controller that is its only writer.
//!
//! Network calls run on spawned tasks and come back as [`Completion`]s through a
//! queue; the controller applies them one at a time on the caller's task. View and
//! lookup completions carry the sequence number of the request that produced them
//! and job completions carry a [`JobTicket`]; anything older than the latest request
//! for the same resource is dropped.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{
        file_name, DocumentDescriptor, DocumentId, DocumentKind, JobStatus, ViewMode, ViewState,
    },
    protocol::{
        SelectFolderResponse, TranslationResult, TranslationResultResponse,
        TranslationStatusPayload,
    },
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    content::{Content, ErrorNotice, RetryAction, TranslationPanel},
    error::{ClientError, ClientResult},
    markdown,
    render::{self, RenderedView},
    settings::ClientSettings,
    source::DocumentSource,
    translation::{Effect, JobTicket, PollPolicy, TranslationJob},
};

/// Everything that is currently open and being translated.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub folder: Option<String>,
    pub documents: Vec<DocumentDescriptor>,
    pub folder_message: Option<String>,
    pub folder_error: Option<ErrorNotice>,
    pub document: Option<DocumentDescriptor>,
    pub view: ViewState,
    /// `None` while the preview is loading.
    pub content: Option<Content>,
    pub job: Option<TranslationJob>,
    pub panel: TranslationPanel,
}

impl Session {
    pub fn page_controls_visible(&self) -> bool {
        self.document.is_some() && self.view.page_controls_visible()
    }

    pub fn text_view_available(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|document| document.text_source().is_some())
    }

    /// Path to hand to the download endpoint for the finished translation on screen.
    pub fn finished_download_path(&self) -> Option<&str> {
        match &self.panel {
            TranslationPanel::Finished { result, .. } => Some(result.download_path()),
            _ => None,
        }
    }

    fn is_active_document(&self, document_id: &DocumentId) -> bool {
        self.document
            .as_ref()
            .is_some_and(|document| &document.id == document_id)
    }
}

#[derive(Debug)]
pub enum Completion {
    Folder {
        seq: u64,
        path: String,
        result: ClientResult<SelectFolderResponse>,
    },
    View {
        seq: u64,
        document_id: DocumentId,
        result: ClientResult<RenderedView>,
    },
    ExistingResult {
        seq: u64,
        document_id: DocumentId,
        result: ClientResult<Option<TranslationResultResponse>>,
    },
    JobStarted {
        ticket: JobTicket,
        result: ClientResult<()>,
    },
    JobPolled {
        ticket: JobTicket,
        transport_failures: u32,
        result: ClientResult<TranslationStatusPayload>,
    },
    JobResult {
        ticket: JobTicket,
        result: ClientResult<Option<TranslationResultResponse>>,
    },
}

/// Notifications for hosts that redraw on change instead of after every pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    FolderLoaded { count: usize },
    PreviewUpdated,
    ViewChanged(ViewState),
    TranslationUpdated,
    JobFinished { document_id: DocumentId, status: JobStatus },
}

pub struct SessionController {
    source: Arc<dyn DocumentSource>,
    settings: ClientSettings,
    policy: PollPolicy,
    session: Session,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    poll_timer: Option<JoinHandle<()>>,
    next_epoch: u64,
    folder_seq: u64,
    view_seq: u64,
    lookup_seq: u64,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(source: Arc<dyn DocumentSource>, settings: ClientSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        Self {
            source,
            policy: PollPolicy::from(&settings),
            settings,
            session: Session::default(),
            completions_tx,
            completions_rx,
            poll_timer: None,
            next_epoch: 0,
            folder_seq: 0,
            view_seq: 0,
            lookup_seq: 0,
            events,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Whether a status poll is scheduled or in flight.
    pub fn has_active_poll(&self) -> bool {
        self.poll_timer
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits for the next network completion without applying it.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Waits for the next network completion and applies it.
    pub async fn pump(&mut self) -> bool {
        match self.next_completion().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Applies a completion if one is already queued.
    pub fn try_pump(&mut self) -> bool {
        match self.completions_rx.try_recv() {
            Ok(completion) => {
                self.apply(completion);
                true
            }
            Err(_) => false,
        }
    }

    pub fn load_folder(&mut self, path: &str) {
        info!(folder = path, "session: scanning folder");
        self.folder_seq += 1;
        let seq = self.folder_seq;
        self.session.folder = Some(path.to_string());
        self.session.folder_error = None;
        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            let result = source.select_folder(&path).await;
            let _ = tx.send(Completion::Folder { seq, path, result });
        });
    }

    /// Scans the current folder again. Returns `false` when no folder was chosen yet.
    pub fn retry_folder(&mut self) -> bool {
        let Some(folder) = self.session.folder.clone() else {
            return false;
        };
        self.load_folder(&folder);
        true
    }

    /// Opens a path picked outside the folder listing, reusing its catalogue entry when
    /// there is one.
    pub fn open_path(&mut self, path: &str) {
        let descriptor = self
            .session
            .documents
            .iter()
            .find(|document| document.path() == path)
            .cloned()
            .unwrap_or_else(|| DocumentDescriptor::new(path, DocumentKind::classify(None, path)));
        self.open_document(descriptor);
    }

    pub fn open_document(&mut self, descriptor: DocumentDescriptor) {
        info!(path = descriptor.path(), "session: opening document");
        self.abandon_job();
        self.session.view = ViewState::default();
        self.session.document = Some(descriptor);
        self.emit(SessionEvent::ViewChanged(self.session.view));
        self.request_render();
        self.request_existing_result();
    }

    /// Returns `false` when the switch was ignored because the mode is unavailable.
    pub fn switch_view(&mut self, mode: ViewMode) -> bool {
        if self.session.document.is_none() {
            return false;
        }
        if mode == ViewMode::Text && !self.session.text_view_available() {
            debug!("session: text view unavailable, ignoring switch");
            return false;
        }
        self.session.view.mode = mode;
        self.emit(SessionEvent::ViewChanged(self.session.view));
        self.request_render();
        true
    }

    /// Returns `false` when the page did not change.
    pub fn navigate_page(&mut self, delta: i32) -> bool {
        if self.session.document.is_none() || self.session.view.mode != ViewMode::Raster {
            return false;
        }
        let target = self.session.view.clamped_page(delta);
        if target == self.session.view.current_page {
            return false;
        }
        self.session.view.current_page = target;
        self.emit(SessionEvent::ViewChanged(self.session.view));
        self.request_render();
        true
    }

    pub fn retry_view(&mut self) {
        if self.session.document.is_some() {
            self.request_render();
        }
    }

    pub fn translate(&mut self) -> ClientResult<()> {
        let document_id = self
            .session
            .document
            .as_ref()
            .map(|document| document.id.clone())
            .ok_or(ClientError::NoDocument)?;
        self.abandon_job();
        self.next_epoch += 1;
        let (job, effects) = TranslationJob::start(document_id, self.next_epoch);
        let ticket = job.ticket();
        self.session.job = Some(job);
        self.run_effects(&ticket, effects);
        self.refresh_panel();
        Ok(())
    }

    /// Starts the job again after a failure; same as a fresh [`Self::translate`].
    pub fn retry_translation(&mut self) -> ClientResult<()> {
        self.translate()
    }

    /// Drops a running job. The panel then shows whatever translation the backend already
    /// stores for the document.
    pub fn cancel_translation(&mut self) {
        let Some(job) = self.session.job.as_mut() else {
            return;
        };
        let ticket = job.ticket();
        let effects = job.cancel();
        if effects.is_empty() {
            return;
        }
        self.run_effects(&ticket, effects);
        self.session.job = None;
        self.request_existing_result();
        self.emit(SessionEvent::TranslationUpdated);
    }

    /// Fetches the translated text again: for a completed job its result, otherwise the
    /// stored translation of the open document.
    pub fn reload_result(&mut self) {
        if let Some(job) = self.session.job.as_mut() {
            if job.status == JobStatus::Completed {
                let ticket = job.ticket();
                let effects = job.reload_result();
                self.run_effects(&ticket, effects);
                self.refresh_panel();
                return;
            }
            if !job.status.is_terminal() {
                return;
            }
        }
        if self.session.document.is_some() {
            self.session.job = None;
            self.request_existing_result();
        }
    }

    pub async fn download(&self, path: &str) -> ClientResult<Vec<u8>> {
        self.source.download(path).await
    }

    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Folder { seq, path, result } => self.apply_folder(seq, path, result),
            Completion::View {
                seq,
                document_id,
                result,
            } => self.apply_view(seq, &document_id, result),
            Completion::ExistingResult {
                seq,
                document_id,
                result,
            } => self.apply_existing_result(seq, &document_id, result),
            Completion::JobStarted { ticket, result } => {
                let Some(job) = self.current_job(&ticket) else {
                    return;
                };
                let effects = job.on_start_response(result);
                self.after_job_transition(&ticket, effects);
            }
            Completion::JobPolled {
                ticket,
                transport_failures,
                result,
            } => {
                let policy = self.policy;
                let Some(job) = self.current_job(&ticket) else {
                    return;
                };
                let effects = job.on_poll(result, transport_failures, &policy);
                self.after_job_transition(&ticket, effects);
            }
            Completion::JobResult { ticket, result } => {
                let Some(job) = self.current_job(&ticket) else {
                    return;
                };
                job.on_result(result);
                self.refresh_panel();
            }
        }
    }

    fn apply_folder(&mut self, seq: u64, path: String, result: ClientResult<SelectFolderResponse>) {
        if seq != self.folder_seq {
            debug!(folder = path, "session: dropping stale folder listing");
            return;
        }
        match result {
            Ok(listing) => {
                self.session.documents = listing
                    .files
                    .into_iter()
                    .map(|entry| entry.into_descriptor())
                    .collect();
                self.session.folder_message = listing.message;
                self.session.folder_error = None;
                info!(
                    folder = path,
                    count = self.session.documents.len(),
                    "session: folder loaded"
                );
                self.emit(SessionEvent::FolderLoaded {
                    count: self.session.documents.len(),
                });
            }
            Err(err) => {
                warn!(folder = path, error = %err, "session: folder scan failed");
                self.session.folder_error = Some(ErrorNotice {
                    message: err.user_message(),
                    retry: RetryAction::LoadFolder,
                });
            }
        }
    }

    fn apply_view(
        &mut self,
        seq: u64,
        document_id: &DocumentId,
        result: ClientResult<RenderedView>,
    ) {
        if seq != self.view_seq || !self.session.is_active_document(document_id) {
            debug!(path = %document_id, "session: dropping stale view");
            return;
        }
        match result {
            Ok(rendered) => {
                if let Some(total_pages) = rendered.total_pages {
                    self.session.view.reconcile_total_pages(total_pages);
                    self.emit(SessionEvent::ViewChanged(self.session.view));
                }
                self.session.content = Some(rendered.content);
            }
            Err(ClientError::UnsupportedView) => {}
            Err(err) => {
                warn!(path = %document_id, error = %err, "session: preview failed");
                self.session.content =
                    Some(Content::error(err.user_message(), RetryAction::Render));
            }
        }
        self.emit(SessionEvent::PreviewUpdated);
    }

    fn apply_existing_result(
        &mut self,
        seq: u64,
        document_id: &DocumentId,
        result: ClientResult<Option<TranslationResultResponse>>,
    ) {
        if seq != self.lookup_seq
            || !self.session.is_active_document(document_id)
            || self.session.job.is_some()
        {
            debug!(path = %document_id, "session: dropping stale result lookup");
            return;
        }
        self.session.panel = match result {
            Ok(Some(response)) => finished_panel(document_id.clone(), response),
            Ok(None) => TranslationPanel::NotTranslated,
            Err(err) => TranslationPanel::Failed {
                message: err.user_message(),
                retry: RetryAction::LoadResult,
            },
        };
        self.emit(SessionEvent::TranslationUpdated);
    }

    /// The active job, if `ticket` still identifies it and its document is open.
    fn current_job(&mut self, ticket: &JobTicket) -> Option<&mut TranslationJob> {
        if !self.session.is_active_document(&ticket.document_id) {
            debug!(
                path = %ticket.document_id,
                epoch = ticket.epoch,
                "session: dropping response for closed document"
            );
            return None;
        }
        let job = self
            .session
            .job
            .as_mut()
            .filter(|job| job.epoch == ticket.epoch && job.document_id == ticket.document_id);
        if job.is_none() {
            debug!(
                path = %ticket.document_id,
                epoch = ticket.epoch,
                "session: dropping response for replaced job"
            );
        }
        job
    }

    fn after_job_transition(&mut self, ticket: &JobTicket, effects: Vec<Effect>) {
        self.run_effects(ticket, effects);
        self.refresh_panel();
        if let Some(job) = self.session.job.as_ref() {
            if job.status.is_terminal() && !self.has_active_poll() {
                let event = SessionEvent::JobFinished {
                    document_id: job.document_id.clone(),
                    status: job.status,
                };
                self.emit(event);
            }
        }
    }

    fn run_effects(&mut self, ticket: &JobTicket, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::IssueStart => {
                    let source = Arc::clone(&self.source);
                    let tx = self.completions_tx.clone();
                    let ticket = ticket.clone();
                    tokio::spawn(async move {
                        let result = source.start_translation(ticket.document_id.as_str()).await;
                        let _ = tx.send(Completion::JobStarted { ticket, result });
                    });
                }
                Effect::Poll {
                    delay,
                    transport_failures,
                } => self.schedule_poll(ticket.clone(), delay, transport_failures),
                Effect::StopPolling => self.clear_poll_timer(),
                Effect::FetchResult => {
                    let source = Arc::clone(&self.source);
                    let tx = self.completions_tx.clone();
                    let ticket = ticket.clone();
                    tokio::spawn(async move {
                        let result = source.translation_result(ticket.document_id.as_str()).await;
                        let _ = tx.send(Completion::JobResult { ticket, result });
                    });
                }
            }
        }
    }

    fn schedule_poll(&mut self, ticket: JobTicket, delay: Duration, transport_failures: u32) {
        self.clear_poll_timer();
        debug!(
            path = %ticket.document_id,
            delay_ms = delay.as_millis() as u64,
            "session: scheduling status poll"
        );
        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        self.poll_timer = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = source
                .translation_status(ticket.document_id.as_str(), true)
                .await;
            let _ = tx.send(Completion::JobPolled {
                ticket,
                transport_failures,
                result,
            });
        }));
    }

    fn clear_poll_timer(&mut self) {
        if let Some(handle) = self.poll_timer.take() {
            handle.abort();
        }
    }

    /// Stops polling for the current job and forgets it. Terminal jobs are dropped
    /// untouched.
    fn abandon_job(&mut self) {
        if let Some(mut job) = self.session.job.take() {
            let ticket = job.ticket();
            let effects = job.cancel();
            self.run_effects(&ticket, effects);
        }
        self.clear_poll_timer();
    }

    fn request_render(&mut self) {
        let Some(document) = self.session.document.clone() else {
            return;
        };
        self.view_seq += 1;
        let seq = self.view_seq;
        let view = self.session.view;
        let dpi = self.settings.dpi;
        self.session.content = None;
        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = render::render(source.as_ref(), &document, view, dpi).await;
            let _ = tx.send(Completion::View {
                seq,
                document_id: document.id,
                result,
            });
        });
    }

    fn request_existing_result(&mut self) {
        let Some(document_id) = self.session.document.as_ref().map(|d| d.id.clone()) else {
            return;
        };
        self.lookup_seq += 1;
        let seq = self.lookup_seq;
        self.session.panel = TranslationPanel::Loading;
        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = source.translation_result(document_id.as_str()).await;
            let _ = tx.send(Completion::ExistingResult {
                seq,
                document_id,
                result,
            });
        });
    }

    fn refresh_panel(&mut self) {
        let Some(job) = self.session.job.as_ref() else {
            return;
        };
        self.session.panel = match job.status {
            JobStatus::Idle => TranslationPanel::NotTranslated,
            JobStatus::Started | JobStatus::Running => TranslationPanel::Progress {
                file_name: file_name(job.document_id.as_str()).to_string(),
                snapshot: job.snapshot(),
            },
            JobStatus::Completed => match (&job.final_text, &job.result_error) {
                (Some(text), _) => finished_panel(
                    job.document_id.clone(),
                    TranslationResultResponse {
                        content: text.clone(),
                        translated_path: job.translated_path.clone(),
                    },
                ),
                (None, Some(message)) => TranslationPanel::Failed {
                    message: message.clone(),
                    retry: RetryAction::LoadResult,
                },
                (None, None) => TranslationPanel::Loading,
            },
            JobStatus::Failed => TranslationPanel::Failed {
                message: job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "translation failed".to_string()),
                retry: RetryAction::Translate,
            },
        };
        self.emit(SessionEvent::TranslationUpdated);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.clear_poll_timer();
    }
}

fn finished_panel(
    document_id: DocumentId,
    response: TranslationResultResponse,
) -> TranslationPanel {
    let rendered = markdown::parse(&response.content);
    TranslationPanel::Finished {
        result: TranslationResult {
            document_id,
            content: response.content,
            translated_path: response.translated_path,
        },
        rendered,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
