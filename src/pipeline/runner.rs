//! Sequential revision job runner.
//!
//! One [`RevisionPipeline`] owns at most one job at a time. The job runs on a
//! spawned task; callers drive it through `resume`, `cancel`, `reset`, and
//! `set_advance_mode`, and observe it through the status and live-view
//! channels.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::namer;
use super::prompt;
use super::status::{AdvanceMode, JobStatus, LiveView, PipelineStatus};
use crate::ai::{CancelHandle, CompletionOptions, CompletionProvider, CompletionStreamer, StreamError};
use crate::core::{Document, DocumentRef, DocumentStore, RetryConfig, StorageError};
use crate::guidance::{AnalysisIndex, GuidanceBuilder, GuidanceKind};

/// Errors returned by pipeline actions.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("A revision job is already {0}")]
    AlreadyActive(JobStatus),

    #[error("No documents to revise")]
    EmptyQueue,
}

/// Failure while revising one document.
#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Everything a job needs besides the queue itself.
#[derive(Clone)]
pub struct PipelineContext {
    pub provider: Arc<dyn CompletionProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub analysis: AnalysisIndex,
    pub guidance: GuidanceBuilder,
    pub options: CompletionOptions,
    pub retry: RetryConfig,
}

impl PipelineContext {
    /// Create a context with no analysis data and default options.
    pub fn new(provider: Arc<dyn CompletionProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            provider,
            store,
            analysis: AnalysisIndex::empty(),
            guidance: GuidanceBuilder::new(),
            options: CompletionOptions::default(),
            retry: RetryConfig::api(),
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisIndex) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_guidance(mut self, guidance: GuidanceBuilder) -> Self {
        self.guidance = guidance;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

struct JobState {
    queue: Vec<DocumentRef>,
    cursor: usize,
    status: JobStatus,
    advance_mode: AdvanceMode,
    error_message: Option<String>,
    cancel: CancelHandle,
    /// Bumped on every `start`; a task only touches state of its own run.
    run_id: u64,
}

impl JobState {
    fn snapshot(&self) -> PipelineStatus {
        PipelineStatus {
            status: self.status,
            current_index: self.cursor,
            total_files: self.queue.len(),
            current_file_name: self.queue.get(self.cursor).map(|d| d.display_name.clone()),
            advance_mode: self.advance_mode,
            error_message: self.error_message.clone(),
        }
    }
}

struct Shared {
    context: PipelineContext,
    job: Mutex<JobState>,
    status_tx: watch::Sender<PipelineStatus>,
    live_tx: watch::Sender<Option<LiveView>>,
}

/// Revises a queue of documents one at a time.
#[derive(Clone)]
pub struct RevisionPipeline {
    shared: Arc<Shared>,
}

impl RevisionPipeline {
    /// Create an idle pipeline.
    pub fn new(context: PipelineContext) -> Self {
        let job = JobState {
            queue: Vec::new(),
            cursor: 0,
            status: JobStatus::Idle,
            advance_mode: AdvanceMode::default(),
            error_message: None,
            cancel: CancelHandle::new(),
            run_id: 0,
        };
        let (status_tx, _) = watch::channel(job.snapshot());
        let (live_tx, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared { context, job: Mutex::new(job), status_tx, live_tx }),
        }
    }

    /// Set the initial advance mode.
    pub fn with_advance_mode(self, mode: AdvanceMode) -> Self {
        self.set_advance_mode(mode);
        self
    }

    /// Current status.
    pub fn status(&self) -> PipelineStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Current live view, if a document has started.
    pub fn live_view(&self) -> Option<LiveView> {
        self.shared.live_tx.borrow().clone()
    }

    /// Receive live view updates, including each streamed chunk.
    pub fn subscribe_live(&self) -> watch::Receiver<Option<LiveView>> {
        self.shared.live_tx.subscribe()
    }

    /// Start revising `documents`.
    ///
    /// Allowed when idle or after a finished job, which is reset implicitly.
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        documents: Vec<DocumentRef>,
        kind: GuidanceKind,
        custom_text: Option<String>,
    ) -> Result<JoinHandle<()>, PipelineError> {
        if documents.is_empty() {
            return Err(PipelineError::EmptyQueue);
        }

        let (run_id, cancel) = {
            let mut job = self.shared.job.lock();
            if job.status.is_active() {
                return Err(PipelineError::AlreadyActive(job.status));
            }
            job.queue = documents;
            job.cursor = 0;
            job.status = JobStatus::Running;
            job.error_message = None;
            job.cancel = CancelHandle::new();
            job.run_id += 1;
            self.shared.publish(&job);
            (job.run_id, job.cancel.clone())
        };
        self.shared.live_tx.send_replace(None);

        tracing::info!(run_id, %kind, "Revision job started");
        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(async move { shared.run(run_id, kind, custom_text, cancel).await }))
    }

    /// Continue after a pause. Returns `false` if the job was not paused.
    pub fn resume(&self) -> bool {
        let mut job = self.shared.job.lock();
        if job.status != JobStatus::Paused {
            return false;
        }
        job.status = JobStatus::Running;
        self.shared.publish(&job);
        tracing::debug!(index = job.cursor, "Revision job resumed");
        true
    }

    /// Stop the job. Returns `false` if no job was running or paused.
    pub fn cancel(&self) -> bool {
        let mut job = self.shared.job.lock();
        if !job.status.is_active() {
            return false;
        }
        job.status = JobStatus::Cancelled;
        job.cancel.cancel();
        self.shared.publish(&job);
        tracing::info!(index = job.cursor, "Revision job cancelled");
        true
    }

    /// Return to idle after a finished job. Returns `false` if the job has not finished.
    pub fn reset(&self) -> bool {
        {
            let mut job = self.shared.job.lock();
            if !job.status.is_terminal() {
                return false;
            }
            job.status = JobStatus::Idle;
            job.cursor = 0;
            job.error_message = None;
            job.queue.clear();
            self.shared.publish(&job);
        }
        self.shared.live_tx.send_replace(None);
        true
    }

    /// Change the advance mode. Switching to `Auto` while paused resumes.
    pub fn set_advance_mode(&self, mode: AdvanceMode) {
        let mut job = self.shared.job.lock();
        job.advance_mode = mode;
        if mode == AdvanceMode::Auto && job.status == JobStatus::Paused {
            job.status = JobStatus::Running;
            tracing::debug!(index = job.cursor, "Advance mode set to auto, resuming");
        }
        self.shared.publish(&job);
    }
}

impl Shared {
    fn publish(&self, job: &JobState) {
        let snapshot = job.snapshot();
        self.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    /// Apply `f` if `run_id` is still the current run.
    fn update<R>(&self, run_id: u64, f: impl FnOnce(&mut JobState) -> R) -> Option<R> {
        let mut job = self.job.lock();
        if job.run_id != run_id {
            return None;
        }
        let result = f(&mut job);
        self.publish(&job);
        Some(result)
    }

    async fn run(
        self: Arc<Self>,
        run_id: u64,
        kind: GuidanceKind,
        custom_text: Option<String>,
        cancel: CancelHandle,
    ) {
        let streamer = CompletionStreamer::new(Arc::clone(&self.context.provider))
            .with_retry(self.context.retry.clone());
        let queue = self.job.lock().queue.clone();
        let total = queue.len();

        for (index, doc) in queue.iter().enumerate() {
            if cancel.is_cancelled() || self.update(run_id, |job| job.cursor = index).is_none() {
                return;
            }

            let outcome = self
                .revise_one(run_id, &streamer, index, doc, kind, custom_text.as_deref(), &cancel)
                .await;

            match outcome {
                Ok(()) => {}
                Err(ItemError::Stream(StreamError::Cancelled)) => {
                    tracing::debug!(document = %doc.display_name, "Revision stopped by cancellation");
                    return;
                }
                Err(e) => {
                    let message = format!("Failed to revise {}: {}", doc.display_name, e);
                    tracing::warn!(document = %doc.display_name, index, error = %e, "Revision job failed");
                    self.update(run_id, |job| {
                        if job.status == JobStatus::Running {
                            job.status = JobStatus::Error;
                            job.error_message = Some(message);
                        }
                    });
                    return;
                }
            }

            if index + 1 == total {
                self.update(run_id, |job| {
                    if job.status == JobStatus::Running {
                        job.status = JobStatus::Complete;
                    }
                });
                tracing::info!(total, "Revision job complete");
                return;
            }

            let paused = self.update(run_id, |job| {
                let pause = job.status == JobStatus::Running && job.advance_mode == AdvanceMode::Pause;
                if pause {
                    job.status = JobStatus::Paused;
                }
                pause
            });
            if paused == Some(true) && !self.wait_while_paused(run_id, &cancel).await {
                return;
            }
        }
    }

    /// Wait for the pause to end. Returns `true` if the job should continue.
    async fn wait_while_paused(&self, run_id: u64, cancel: &CancelHandle) -> bool {
        let mut rx = self.status_tx.subscribe();
        let resumed = async {
            rx.wait_for(|s| s.status != JobStatus::Paused).await.map(|s| s.status).ok()
        };

        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            next = resumed => next,
        };

        let job = self.job.lock();
        next == Some(JobStatus::Running) && job.run_id == run_id && job.status == JobStatus::Running
    }

    #[allow(clippy::too_many_arguments)]
    async fn revise_one(
        &self,
        run_id: u64,
        streamer: &CompletionStreamer,
        index: usize,
        doc: &DocumentRef,
        kind: GuidanceKind,
        custom_text: Option<&str>,
        cancel: &CancelHandle,
    ) -> Result<(), ItemError> {
        let store = self.context.store.as_ref();
        let source = store.read(&doc.path).await?;

        let record = self.context.analysis.find(&doc.display_name, &source);
        let guidance = self.context.guidance.build(kind, record, custom_text);
        tracing::debug!(
            document = %doc.display_name,
            kind = %guidance.kind,
            fallback = guidance.is_fallback,
            "Built revision guidance"
        );

        let revised_path = namer::next_revision_path(store, doc).await?;
        if !store.create(&revised_path).await? {
            tracing::warn!(path = %revised_path.display(), "Revision target already exists, overwriting");
        }

        let revised_name = display_name(&revised_path);
        self.set_live(
            run_id,
            LiveView {
                index,
                source: Document::new(doc.display_name.clone(), source.clone()),
                revised: Document::new(revised_name, String::new()),
                revised_path: revised_path.clone(),
            },
        );

        let messages = prompt::revision_messages(&guidance, &source);
        let mut stream = streamer.open(&messages, &self.context.options, cancel.clone()).await?;

        let mut revised = String::new();
        while let Some(chunk) = stream.next_chunk().await? {
            revised.push_str(&chunk);
            self.live_tx.send_modify(|view| {
                if let Some(view) = view.as_mut().filter(|v| v.index == index) {
                    view.revised.append(&chunk);
                }
            });
        }

        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled.into());
        }

        store.write(&revised_path, &revised).await?;
        self.live_tx.send_modify(|view| {
            if let Some(view) = view.as_mut().filter(|v| v.index == index) {
                view.revised.mark_clean();
            }
        });

        tracing::info!(
            document = %doc.display_name,
            revised = %revised_path.display(),
            chars = revised.len(),
            "Revision saved"
        );
        Ok(())
    }

    fn set_live(&self, run_id: u64, view: LiveView) {
        let job = self.job.lock();
        if job.run_id == run_id {
            self.live_tx.send_replace(Some(view));
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
