/// Download progress orchestration.
///
/// One `Orchestrator` owns the preview, the active job and the displayed
/// progress. Every mutation goes through the shared state mutex, and every
/// polling/tail continuation first checks that its generation is still the
/// current one, so a loop left behind by an abandoned job can never touch
/// the state of a newer job. The generation and the loop handle live outside
/// the mutex so teardown never has to wait for it.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};

use reqwest::Url;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::ProgressConfig;
use crate::errors::{BackendError, ClientError, ClientResult};
use crate::models::{Activity, DownloadJob, MediaReference, PreviewInfo, ProgressPhase, TargetType};
use crate::progress::{PollOutcome, ProgressTracker};

/// One-shot user-facing notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// No URL was entered.
    EmptyReference,
    /// `/info` answered with a `detail`.
    InfoRejected { detail: String },
    /// `/info` could not be reached or decoded.
    InfoUnavailable { reason: String },
    StartFailed { reason: String },
    /// Backend reported `error` for the job.
    DownloadFailed { task_id: String, reason: Option<String> },
    /// Status polling broke off (network or HTTP failure).
    PollAbandoned { task_id: String, reason: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::EmptyReference => write!(f, "أدخل رابط الفيديو أولاً"),
            Notice::InfoRejected { .. } => write!(f, "تعذّر جلب التفاصيل، تأكد من الرابط."),
            Notice::InfoUnavailable { .. } => write!(f, "حدث خطأ أثناء جلب البيانات."),
            Notice::StartFailed { .. } => write!(f, "تعذّر بدء التحميل"),
            Notice::DownloadFailed { .. } => write!(f, "حدث خطأ أثناء التحميل"),
            Notice::PollAbandoned { .. } => write!(f, "انقطع الاتصال بالخادم أثناء متابعة التحميل"),
        }
    }
}

impl Notice {
    /// Technical detail behind the notice, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Notice::EmptyReference => None,
            Notice::InfoRejected { detail } => Some(detail),
            Notice::InfoUnavailable { reason }
            | Notice::StartFailed { reason }
            | Notice::PollAbandoned { reason, .. } => Some(reason),
            Notice::DownloadFailed { reason, .. } => reason.as_deref(),
        }
    }
}

/// Everything a front end needs to render.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    PreviewReady(PreviewInfo),
    Progress {
        task_id: Option<String>,
        value: f64,
        phase: ProgressPhase,
    },
    /// The finished file can be retrieved from `url`.
    FileReady { task_id: String, url: Url },
    Notice(Notice),
    /// Displayed progress reached 100 and the job was cleared.
    Settled { task_id: String },
    /// Progress was reset to 0 after settling.
    Idle,
}

/// Point-in-time view of the orchestrator state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub displayed: f64,
    pub phase: ProgressPhase,
    pub active_task: Option<String>,
    pub activity: Activity,
    pub preview: Option<PreviewInfo>,
}

struct SharedState {
    tracker: ProgressTracker,
    active: Option<DownloadJob>,
    preview: Option<PreviewInfo>,
    /// Completed or Error after a job ends, until the next operation.
    outcome: Option<Activity>,
}

impl SharedState {
    fn activity(&self, lookups_in_flight: usize) -> Activity {
        if self.active.is_some() || self.tracker.phase() == ProgressPhase::ServerPhase {
            Activity::Downloading
        } else if lookups_in_flight > 0 {
            Activity::FetchingInfo
        } else {
            self.outcome.unwrap_or(Activity::Idle)
        }
    }

    fn active_task_id(&self) -> Option<String> {
        self.active.as_ref().map(|job| job.task_id.clone())
    }
}

struct Inner<B> {
    backend: B,
    config: ProgressConfig,
    state: Mutex<SharedState>,
    /// Bumped whenever the current job loop must stop.
    generation: AtomicU64,
    lookups_in_flight: AtomicUsize,
    loop_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl<B: Backend> Inner<B> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Make every running loop stale. Returns the new generation.
    fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the tracked loop task. A replaced loop exits on its next generation check.
    fn track_loop(&self, handle: JoinHandle<()>) {
        *self.loop_handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn abort_loop(&self) {
        if let Some(handle) = self.loop_handle.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        // Receiver gone means nobody is rendering; state still advances.
        let _ = self.events.send(event);
    }

    fn emit_progress(&self, state: &SharedState, task_id: Option<String>) {
        self.emit(OrchestratorEvent::Progress {
            task_id,
            value: state.tracker.displayed(),
            phase: state.tracker.phase(),
        });
    }
}

/// Drives metadata lookup, job start, status polling and the client tail.
pub struct Orchestrator<B: Backend> {
    inner: Arc<Inner<B>>,
}

impl<B: Backend> Orchestrator<B> {
    /// Create an orchestrator and the receiving end of its event stream.
    pub fn new(backend: B, config: ProgressConfig) -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = SharedState {
            tracker: ProgressTracker::new(config.clone()),
            active: None,
            preview: None,
            outcome: None,
        };
        let inner = Arc::new(Inner {
            backend,
            config,
            state: Mutex::new(state),
            generation: AtomicU64::new(0),
            lookups_in_flight: AtomicUsize::new(0),
            loop_handle: std::sync::Mutex::new(None),
            events: tx,
        });
        (Self { inner }, rx)
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        let state = self.inner.state.lock().await;
        ProgressSnapshot {
            displayed: state.tracker.displayed(),
            phase: state.tracker.phase(),
            active_task: state.active_task_id(),
            activity: state.activity(self.inner.lookups_in_flight.load(Ordering::SeqCst)),
            preview: state.preview.clone(),
        }
    }

    fn parse_reference(&self, raw: &str) -> ClientResult<MediaReference> {
        MediaReference::parse(raw).map_err(|e| {
            self.inner.emit(OrchestratorEvent::Notice(Notice::EmptyReference));
            e
        })
    }

    /// Look up preview metadata. Clears the current preview first; the last
    /// lookup to resolve wins.
    pub async fn fetch_info(&self, raw_url: &str) -> ClientResult<PreviewInfo> {
        let media = self.parse_reference(raw_url)?;

        let lookup = {
            let mut state = self.inner.state.lock().await;
            state.preview = None;
            if state.active.is_none() {
                state.outcome = None;
            }
            LookupGuard::enter(&self.inner.lookups_in_flight)
        };

        info!("Fetching preview for {}", media);
        let result = self.inner.backend.fetch_info(&media).await;

        let mut state = self.inner.state.lock().await;
        drop(lookup);
        match result {
            Ok(preview) => {
                debug!("Preview ready: {:?} ({} qualities)", preview.title, preview.video_qualities.len());
                state.preview = Some(preview.clone());
                self.inner.emit(OrchestratorEvent::PreviewReady(preview.clone()));
                Ok(preview)
            }
            Err(e) => {
                warn!("Preview lookup failed for {}: {}", media, e);
                let notice = match &e {
                    BackendError::Rejected(detail) => Notice::InfoRejected { detail: detail.clone() },
                    other => Notice::InfoUnavailable { reason: other.to_string() },
                };
                self.inner.emit(OrchestratorEvent::Notice(notice));
                Err(e.into())
            }
        }
    }

    /// Start a download job and begin polling its status.
    ///
    /// Any job already in flight is abandoned. Returns the new task id.
    pub async fn start_download(
        &self,
        raw_url: &str,
        target: TargetType,
        quality: &str,
    ) -> ClientResult<String> {
        let media = self.parse_reference(raw_url)?;

        let generation = {
            let mut state = self.inner.state.lock().await;
            // The old loop is left to notice its stale generation.
            let generation = self.inner.invalidate();
            if let Some(old) = state.active.take() {
                info!("Abandoning task {} for a new download", old.task_id);
            }
            state.outcome = None;
            state.tracker.begin();
            self.inner.emit_progress(&state, None);
            generation
        };

        info!("Starting {} download ({}) for {}", target, quality, media);
        let result = self.inner.backend.start_download(&media, target, quality).await;

        let mut state = self.inner.state.lock().await;
        if !self.inner.is_current(generation) {
            debug!("Start response for generation {} arrived after a newer request", generation);
            return Err(ClientError::Superseded);
        }

        let task_id = match result {
            Ok(task_id) => task_id,
            Err(e) => {
                warn!("Failed to start download for {}: {}", media, e);
                state.tracker.abort();
                state.outcome = Some(Activity::Error);
                self.inner.emit_progress(&state, None);
                self.inner.emit(OrchestratorEvent::Notice(Notice::StartFailed {
                    reason: e.to_string(),
                }));
                return Err(e.into());
            }
        };

        info!("Task {} started", task_id);
        state.active = Some(DownloadJob {
            task_id: task_id.clone(),
            media,
            target_type: target,
            requested_quality: quality.to_string(),
            generation,
        });
        let handle = tokio::spawn(run_job(self.inner.clone(), task_id.clone(), generation));
        self.inner.track_loop(handle);

        Ok(task_id)
    }

    /// Stop the current job loop and its timers and return to Idle.
    ///
    /// A job still in its server phase keeps its displayed value; anything
    /// else (a start in flight, the tail, the reset delay) drops back to 0.
    pub async fn abandon(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.invalidate();
        self.inner.abort_loop();
        state.outcome = None;

        let job = state.active.take();
        if let Some(job) = &job {
            info!("Task {} abandoned", job.task_id);
        }
        if job.is_some() && state.tracker.phase() == ProgressPhase::ServerPhase {
            state.tracker.halt();
        } else {
            state.tracker.reset();
        }
        self.inner.emit_progress(&state, None);
    }

    /// Tear down: same as `abandon`, for front ends that are going away.
    pub async fn shutdown(&self) {
        self.abandon().await;
        debug!("Orchestrator shut down");
    }
}

impl<B: Backend> Drop for Orchestrator<B> {
    fn drop(&mut self) {
        self.inner.invalidate();
        self.inner.abort_loop();
    }
}

/// Counts an outstanding `/info` lookup, including one whose future is dropped.
struct LookupGuard<'a>(&'a AtomicUsize);

impl<'a> LookupGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LookupGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Poll `/progress/<task_id>` until the job ends or the generation goes stale.
async fn run_job<B: Backend>(inner: Arc<Inner<B>>, task_id: String, generation: u64) {
    loop {
        if !inner.is_current(generation) {
            return;
        }

        let result = inner.backend.poll_progress(&task_id).await;

        let mut state = inner.state.lock().await;
        if !inner.is_current(generation) {
            debug!("Discarding late status for abandoned task {}", task_id);
            return;
        }

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!("Status polling for task {} abandoned: {}", task_id, e);
                state.active = None;
                state.tracker.halt();
                state.outcome = Some(Activity::Error);
                inner.emit(OrchestratorEvent::Notice(Notice::PollAbandoned {
                    task_id: task_id.clone(),
                    reason: e.to_string(),
                }));
                return;
            }
        };

        debug!(
            "Task {} status={} progress={:?}",
            task_id,
            report.status,
            report.progress_percent()
        );

        let before = state.tracker.displayed();
        match state.tracker.apply_report(&report) {
            PollOutcome::Continue => {
                if state.tracker.displayed() != before {
                    inner.emit_progress(&state, Some(task_id.clone()));
                }
            }
            PollOutcome::EnterTail => {
                info!("Task {} finished on the backend, retrieving file", task_id);
                inner.emit_progress(&state, Some(task_id.clone()));
                inner.emit(OrchestratorEvent::FileReady {
                    task_id: task_id.clone(),
                    url: inner.backend.file_url(&task_id),
                });
                drop(state);
                run_tail(inner, task_id, generation).await;
                return;
            }
            PollOutcome::Failed { message } => {
                warn!("Task {} failed: {}", task_id, message.as_deref().unwrap_or("no details"));
                state.active = None;
                state.outcome = Some(Activity::Error);
                inner.emit_progress(&state, Some(task_id.clone()));
                inner.emit(OrchestratorEvent::Notice(Notice::DownloadFailed {
                    task_id,
                    reason: message,
                }));
                return;
            }
        }
        drop(state);

        tokio::time::sleep(inner.config.poll_interval).await;
    }
}

/// Walk the bar from the done floor to 100, clear the job, then reset to 0.
async fn run_tail<B: Backend>(inner: Arc<Inner<B>>, task_id: String, generation: u64) {
    loop {
        tokio::time::sleep(inner.config.tail_interval).await;

        let mut state = inner.state.lock().await;
        if !inner.is_current(generation) {
            return;
        }
        let settled = state.tracker.tail_step();
        inner.emit_progress(&state, Some(task_id.clone()));
        if settled {
            state.active = None;
            state.outcome = Some(Activity::Completed);
            info!("Task {} settled", task_id);
            inner.emit(OrchestratorEvent::Settled { task_id: task_id.clone() });
            break;
        }
    }

    tokio::time::sleep(inner.config.reset_delay).await;

    let mut state = inner.state.lock().await;
    if !inner.is_current(generation) {
        return;
    }
    state.tracker.reset();
    state.outcome = None;
    inner.emit_progress(&state, None);
    inner.emit(OrchestratorEvent::Idle);
}
