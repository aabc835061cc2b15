//! Lifecycle of a single translation job.
//!
//! The job is plain data owned by the session; every transition returns the
//! [`Effect`]s the caller must perform (network calls, timer changes). Nothing here
//! touches the network or the clock.
//!
//! ```text
//! Idle --start--> Started --poll running--> Running --poll completed|done--> Completed
//!                 Started/Running --poll error--> Failed
//!                 start rejected --> Failed
//! transport failure while polling: state unchanged, next poll after the retry delay
//! cancel: any non-terminal state --> Idle
//! ```

use std::time::Duration;

use shared::{
    domain::{ChunkStatus, DocumentId, JobStatus},
    protocol::{RemoteJobStatus, TranslationResultResponse, TranslationStatusPayload},
};
use tracing::{info, warn};

use crate::{error::ClientResult, progress, progress::ProgressSnapshot, settings::ClientSettings};

/// Identity of one started job. Responses carrying a stale ticket are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobTicket {
    pub document_id: DocumentId,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    IssueStart,
    /// Replace the session's poll timer with one firing after `delay`.
    /// `transport_failures` counts consecutive failed polls before this one.
    Poll {
        delay: Duration,
        transport_failures: u32,
    },
    StopPolling,
    FetchResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub max_transport_retries: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for PollPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            retry_delay: settings.retry_delay(),
            max_transport_retries: settings.max_transport_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJob {
    pub document_id: DocumentId,
    pub epoch: u64,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub chunks: Vec<ChunkStatus>,
    pub chunks_completed: u32,
    pub total_chunks: u32,
    pub partial_text: Option<String>,
    pub final_text: Option<String>,
    pub translated_path: Option<String>,
    pub error_message: Option<String>,
    /// Failure to load the final text after completion; the job itself stays Completed.
    pub result_error: Option<String>,
    acknowledged: bool,
    result_requested: bool,
}

impl TranslationJob {
    /// A job for `document_id` whose start request is about to be issued.
    pub fn start(document_id: DocumentId, epoch: u64) -> (Self, Vec<Effect>) {
        info!(path = %document_id, epoch, "translation: starting job");
        let job = Self {
            document_id,
            epoch,
            status: JobStatus::Started,
            progress_percent: 0,
            chunks: Vec::new(),
            chunks_completed: 0,
            total_chunks: 0,
            partial_text: None,
            final_text: None,
            translated_path: None,
            error_message: None,
            result_error: None,
            acknowledged: false,
            result_requested: false,
        };
        (job, vec![Effect::IssueStart])
    }

    pub fn ticket(&self) -> JobTicket {
        JobTicket {
            document_id: self.document_id.clone(),
            epoch: self.epoch,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            percent: self.progress_percent,
            chunks: self.chunks.clone(),
            chunks_completed: self.chunks_completed,
            total_chunks: self.total_chunks,
            partial_text: self.partial_text.clone(),
        }
    }

    pub fn on_start_response(&mut self, result: ClientResult<()>) -> Vec<Effect> {
        if self.status != JobStatus::Started || self.acknowledged {
            return Vec::new();
        }
        match result {
            Ok(()) => {
                self.acknowledged = true;
                vec![Effect::Poll {
                    delay: Duration::ZERO,
                    transport_failures: 0,
                }]
            }
            Err(err) => {
                warn!(path = %self.document_id, error = %err, "translation: start rejected");
                self.fail(err.user_message());
                vec![Effect::StopPolling]
            }
        }
    }

    pub fn on_poll(
        &mut self,
        result: ClientResult<TranslationStatusPayload>,
        transport_failures: u32,
        policy: &PollPolicy,
    ) -> Vec<Effect> {
        if !self.status.is_polling() || !self.acknowledged {
            return Vec::new();
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(err) if err.is_transport() => {
                let failures = transport_failures + 1;
                if policy
                    .max_transport_retries
                    .is_some_and(|max| failures > max)
                {
                    warn!(
                        path = %self.document_id,
                        failures,
                        error = %err,
                        "translation: status polling gave up"
                    );
                    self.fail(err.user_message());
                    return vec![Effect::StopPolling];
                }
                warn!(
                    path = %self.document_id,
                    failures,
                    error = %err,
                    "translation: status poll failed, backing off"
                );
                return vec![Effect::Poll {
                    delay: policy.retry_delay,
                    transport_failures: failures,
                }];
            }
            Err(err) => {
                self.fail(err.user_message());
                return vec![Effect::StopPolling];
            }
        };

        let next_poll = Effect::Poll {
            delay: policy.poll_interval,
            transport_failures: 0,
        };
        match payload.remote_status() {
            RemoteJobStatus::Running => {
                self.status = JobStatus::Running;
                self.absorb(progress::normalize(&payload));
                vec![next_poll]
            }
            RemoteJobStatus::Completed => {
                info!(path = %self.document_id, "translation: job completed");
                if payload.total_chunks.is_some() || payload.chunks_info.is_some() {
                    self.absorb(progress::normalize(&payload));
                }
                self.chunks_completed = self.total_chunks;
                self.progress_percent = 100;
                self.status = JobStatus::Completed;
                self.result_requested = true;
                vec![Effect::StopPolling, Effect::FetchResult]
            }
            RemoteJobStatus::Error => {
                let message = payload
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "translation failed".to_string());
                warn!(path = %self.document_id, error = %message, "translation: job failed");
                self.fail(message);
                vec![Effect::StopPolling]
            }
            RemoteJobStatus::Other(_) => vec![next_poll],
        }
    }

    pub fn on_result(&mut self, result: ClientResult<Option<TranslationResultResponse>>) {
        if self.status != JobStatus::Completed || !self.result_requested {
            return;
        }
        self.result_requested = false;
        match result {
            Ok(Some(response)) => {
                self.final_text = Some(response.content);
                self.translated_path = response.translated_path;
                self.result_error = None;
            }
            Ok(None) => {
                self.result_error = Some("the translated document is not available yet".into());
            }
            Err(err) => {
                self.result_error = Some(err.user_message());
            }
        }
    }

    /// Re-fetch the final text of a completed job on explicit user request.
    pub fn reload_result(&mut self) -> Vec<Effect> {
        if self.status != JobStatus::Completed || self.result_requested {
            return Vec::new();
        }
        self.result_requested = true;
        self.result_error = None;
        vec![Effect::FetchResult]
    }

    /// Terminal jobs are left as they are.
    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.status.is_terminal() || self.status == JobStatus::Idle {
            return Vec::new();
        }
        info!(path = %self.document_id, epoch = self.epoch, "translation: job cancelled");
        self.status = JobStatus::Idle;
        vec![Effect::StopPolling]
    }

    fn absorb(&mut self, snapshot: ProgressSnapshot) {
        let snapshot = snapshot.clamped_to(self.progress_percent);
        self.progress_percent = snapshot.percent;
        if !snapshot.chunks.is_empty() || self.chunks.is_empty() {
            self.chunks = snapshot.chunks;
        }
        self.chunks_completed = snapshot.chunks_completed;
        self.total_chunks = snapshot.total_chunks;
        if snapshot.partial_text.is_some() {
            self.partial_text = snapshot.partial_text;
        }
    }

    fn fail(&mut self, message: String) {
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
    }
}

#[cfg(test)]
#[path = "tests/translation_tests.rs"]
mod tests;
