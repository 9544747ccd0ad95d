//! Queue scheduler: admission, pipelines, and the control surface.
//!
//! A [`Scheduler`] is an explicit instance owning its pending queue, active
//! set, and id counter behind one mutex; admission's "check slot, occupy
//! slot" sequence is atomic under that lock so the concurrency cap is never
//! transiently exceeded. Each admitted record runs an independent
//! resolve-then-transfer pipeline on a spawned task; per-record errors are
//! contained at the pipeline boundary and can never destabilize the
//! scheduler.
//!
//! State machine per record:
//! `queued → resolving → downloading → {completed | failed | cancelled | paused}`,
//! `paused → queued` (resume re-enters the back of the pending line).
//! Completed and failed records stay visible in the active set for a short
//! grace window so pollers observe the final state; cancelled records are
//! removed immediately and their partial file deleted.

mod error;

pub use error::{ControlError, SubmitError};

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::SettingsHandle;
use crate::download::constants::GRACE_WINDOW;
use crate::download::dest::{TemplateVars, plan_destination, resolve_collision};
use crate::download::{TransferEngine, TransferOutcome, TransferProgress, TransferRequest};
use crate::proxy::{ProxyRoute, select_route};
use crate::record::{DownloadRecord, DownloadStatus};
use crate::resolver::{ResolverRegistry, build_default_registry};

/// One submission from a collaborator (episode scraper, CLI, UI glue).
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Series title; required.
    pub title: String,
    /// Season number.
    pub season: u32,
    /// Episode number.
    pub episode: u32,
    /// Language tag; defaults to "unknown" when empty.
    pub language: String,
    /// Opaque video-host page URL; required.
    pub source_url: String,
}

/// Tunables that are fixed for a scheduler's lifetime.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// How long completed/failed records stay visible in the active set.
    pub grace_window: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            grace_window: GRACE_WINDOW,
        }
    }
}

struct ActiveEntry {
    record: DownloadRecord,
    /// Cancellation handle; exists only while the pipeline is in flight.
    cancel: Option<watch::Sender<bool>>,
    /// Distinguishes a pause from a true cancel once the abort settles.
    pause_requested: bool,
}

#[derive(Default)]
struct State {
    pending: VecDeque<DownloadRecord>,
    active: Vec<ActiveEntry>,
    next_id: u64,
    /// Destination paths owned by live records or files completed this
    /// process; new submissions colliding with these get a numeric suffix.
    claimed_paths: HashSet<PathBuf>,
}

impl State {
    fn slots_in_use(&self) -> usize {
        self.active
            .iter()
            .filter(|entry| entry.record.status.occupies_slot())
            .count()
    }

    fn entry_mut(&mut self, id: u64) -> Option<&mut ActiveEntry> {
        self.active.iter_mut().find(|entry| entry.record.id == id)
    }

    fn entry_index(&self, id: u64) -> Option<usize> {
        self.active.iter().position(|entry| entry.record.id == id)
    }

    fn pending_index(&self, id: u64) -> Option<usize> {
        self.pending.iter().position(|record| record.id == id)
    }
}

struct Inner {
    state: Mutex<State>,
    settings: SettingsHandle,
    registry: ResolverRegistry,
    engine: TransferEngine,
    options: SchedulerOptions,
}

impl Inner {
    /// A poisoned lock (a pipeline panicked while holding it) still yields
    /// the state; record bookkeeping must survive any single pipeline.
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The download-queue engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Scheduler")
            .field("pending", &state.pending.len())
            .field("active", &state.active.len())
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler with the default resolver registry and options.
    #[must_use]
    pub fn new(settings: SettingsHandle) -> Self {
        Self::with_parts(settings, build_default_registry(), SchedulerOptions::default())
    }

    /// Creates a scheduler with a custom registry and options.
    ///
    /// Callers can prepend host-specific resolvers; tests shorten the grace
    /// window or stub resolution entirely.
    #[must_use]
    pub fn with_parts(
        settings: SettingsHandle,
        registry: ResolverRegistry,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    next_id: 1,
                    ..State::default()
                }),
                settings,
                registry,
                engine: TransferEngine::new(),
                options,
            }),
        }
    }

    /// Validates a submission, plans its destination, enqueues it, and
    /// triggers an admission pass.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::MissingField`] for an empty title or source
    /// URL, and [`SubmitError::CreateDir`] when the destination directory
    /// cannot be created. No record is created on error.
    #[instrument(level = "debug", skip(self, request), fields(title = %request.title))]
    pub async fn submit(&self, request: SubmitRequest) -> Result<u64, SubmitError> {
        if request.title.trim().is_empty() {
            return Err(SubmitError::MissingField { field: "title" });
        }
        if request.source_url.trim().is_empty() {
            return Err(SubmitError::MissingField { field: "source_url" });
        }
        let language = if request.language.trim().is_empty() {
            "unknown".to_string()
        } else {
            request.language.clone()
        };

        let settings = self.inner.settings.snapshot();
        let vars = TemplateVars::new(&request.title, request.season, request.episode, &language);
        let planned = plan_destination(
            &settings.download_path,
            &settings.folder_template,
            &settings.filename_template,
            &vars,
        );

        // Parent directories are independent of collision suffixing, so they
        // can be created before the state lock is taken.
        if let Some(parent) = planned.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SubmitError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let id = {
            let mut state = self.inner.lock();
            let dest_path =
                resolve_collision(planned, |candidate| state.claimed_paths.contains(candidate));
            state.claimed_paths.insert(dest_path.clone());
            let id = state.next_id;
            state.next_id += 1;
            let record = DownloadRecord::new(
                id,
                request.title,
                request.season,
                request.episode,
                language,
                request.source_url,
                dest_path,
            );
            info!(id, dest = %record.dest_path.display(), "download queued");
            state.pending.push_back(record);
            id
        };

        pump(&self.inner);
        Ok(id)
    }

    /// Returns every record: active entries in admission order, then the
    /// pending queue (always reported queued). Safe for sub-second polling.
    #[must_use]
    pub fn list_all(&self) -> Vec<DownloadRecord> {
        let state = self.inner.lock();
        state
            .active
            .iter()
            .map(|entry| entry.record.clone())
            .chain(state.pending.iter().cloned())
            .collect()
    }

    /// Returns the record with this id, checking the active set first and
    /// falling back to the pending queue.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<DownloadRecord> {
        let state = self.inner.lock();
        state
            .active
            .iter()
            .map(|entry| &entry.record)
            .chain(state.pending.iter())
            .find(|record| record.id == id)
            .cloned()
    }

    /// Cancels a record from any non-terminal state.
    ///
    /// Pending records are dequeued before any network activity. Active
    /// records have their in-flight pipeline aborted, their partial file
    /// deleted, and are removed entirely. Terminal records still in their
    /// grace window are simply evicted; their file is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotFound`] for unknown ids.
    #[instrument(level = "debug", skip(self))]
    pub fn cancel(&self, id: u64) -> Result<(), ControlError> {
        let removed_partial = {
            let mut state = self.inner.lock();

            if let Some(index) = state.pending_index(id) {
                if let Some(record) = state.pending.remove(index) {
                    state.claimed_paths.remove(&record.dest_path);
                }
                info!(id, "cancelled pending download before any transfer started");
                None
            } else if let Some(index) = state.entry_index(id) {
                let mut entry = state.active.remove(index);
                if entry.record.status.is_terminal() {
                    // Grace-window eviction on demand; the finished file is
                    // not a partial and must not be deleted.
                    debug!(id, "evicted terminal record on cancel request");
                    None
                } else {
                    if let Some(cancel) = entry.cancel.take() {
                        let _ = cancel.send(true);
                    }
                    state.claimed_paths.remove(&entry.record.dest_path);
                    info!(id, "cancelled active download");
                    Some(entry.record.dest_path.clone())
                }
            } else {
                return Err(ControlError::NotFound { id });
            }
        };

        if let Some(path) = removed_partial {
            // Best effort: an unlinked file disappears once the aborted
            // writer drops its handle.
            tokio::spawn(async move {
                if let Err(error) = tokio::fs::remove_file(&path).await {
                    if error.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), %error, "failed to delete partial file");
                    }
                }
            });
        }

        pump(&self.inner);
        Ok(())
    }

    /// Pauses a downloading record by triggering the engine's cancellation
    /// path; the record reports `paused` once the abort settles and stays in
    /// the active set until resumed or cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotFound`] for unknown ids and
    /// [`ControlError::InvalidState`] unless the record is downloading.
    #[instrument(level = "debug", skip(self))]
    pub fn pause(&self, id: u64) -> Result<(), ControlError> {
        let mut state = self.inner.lock();

        if let Some(record) = state.pending.iter().find(|record| record.id == id) {
            return Err(ControlError::InvalidState {
                id,
                status: record.status,
                required: "downloading",
            });
        }

        let Some(entry) = state.entry_mut(id) else {
            return Err(ControlError::NotFound { id });
        };
        if entry.record.status != DownloadStatus::Downloading {
            return Err(ControlError::InvalidState {
                id,
                status: entry.record.status,
                required: "downloading",
            });
        }

        entry.pause_requested = true;
        if let Some(cancel) = &entry.cancel {
            let _ = cancel.send(true);
        }
        info!(id, "pause requested");
        Ok(())
    }

    /// Resumes a paused record by re-entering it at the back of the pending
    /// line; the next admission pass starts it (re-rolling the proxy choice
    /// and resuming from the bytes already on disk). Leniently a no-op for
    /// records still pending.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NotFound`] for unknown ids and
    /// [`ControlError::InvalidState`] for active records that are not
    /// paused.
    #[instrument(level = "debug", skip(self))]
    pub fn resume(&self, id: u64) -> Result<(), ControlError> {
        {
            let mut state = self.inner.lock();

            if state.pending_index(id).is_some() {
                debug!(id, "resume on a still-pending record is a no-op");
            } else if let Some(index) = state.entry_index(id) {
                if state.active[index].record.status != DownloadStatus::Paused {
                    return Err(ControlError::InvalidState {
                        id,
                        status: state.active[index].record.status,
                        required: "paused",
                    });
                }
                let mut entry = state.active.remove(index);
                entry.record.status = DownloadStatus::Queued;
                entry.record.bytes_per_sec = 0.0;
                entry.record.error = None;
                info!(id, "resumed; re-queued behind pending records");
                state.pending.push_back(entry.record);
            } else {
                return Err(ControlError::NotFound { id });
            }
        }

        pump(&self.inner);
        Ok(())
    }
}

/// Admission pass: FIFO-drains the pending queue while slots are free.
///
/// The concurrency limit and proxy pool are re-read from live settings on
/// every pass so configuration changes apply without restart. Spawning
/// happens after the lock is released; admission never blocks on a
/// pipeline.
fn pump(inner: &Arc<Inner>) {
    let settings = inner.settings.snapshot();
    let limit = settings.concurrency_limit();

    let mut admitted = Vec::new();
    {
        let mut state = inner.lock();
        while state.slots_in_use() < limit {
            let Some(mut record) = state.pending.pop_front() else {
                break;
            };
            let id = record.id;
            let proxy = select_route(&settings.proxies);
            record.status = DownloadStatus::Resolving;
            record.proxy = proxy.as_ref().map(ProxyRoute::display);
            debug!(
                id,
                proxy = record.proxy.as_deref().unwrap_or("direct"),
                "admitted download"
            );
            let (cancel_tx, cancel_rx) = watch::channel(false);
            state.active.push(ActiveEntry {
                record,
                cancel: Some(cancel_tx),
                pause_requested: false,
            });
            admitted.push((id, cancel_rx, proxy));
        }
    }

    for (id, cancel_rx, proxy) in admitted {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let pipeline =
                AssertUnwindSafe(run_pipeline(&inner, id, cancel_rx, proxy)).catch_unwind();
            if pipeline.await.is_err() {
                warn!(id, "pipeline panicked; converting to a failed record");
                finish_failed(&inner, id, "internal error in download pipeline".to_string());
            }
        });
    }
}

/// One record's resolve-then-transfer pipeline.
async fn run_pipeline(
    inner: &Arc<Inner>,
    id: u64,
    cancel_rx: watch::Receiver<bool>,
    proxy: Option<ProxyRoute>,
) {
    let Some((source_url, dest_path)) = ({
        let state = inner.lock();
        state
            .active
            .iter()
            .find(|entry| entry.record.id == id)
            .map(|entry| (entry.record.source_url.clone(), entry.record.dest_path.clone()))
    }) else {
        // Cancelled between admission and task start.
        return;
    };

    let resolved = inner.registry.resolve(&source_url, proxy.as_ref()).await;
    let media = match resolved {
        Ok(media) => media,
        Err(error) => {
            finish_failed(inner, id, format!("resolution failed: {error}"));
            return;
        }
    };

    // A cancel may have landed while the page fetch was in flight; never
    // start a transfer that is already doomed.
    if *cancel_rx.borrow() {
        settle_cancelled(inner, id);
        return;
    }

    let resume_from = tokio::fs::metadata(&dest_path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);

    {
        let mut state = inner.lock();
        let Some(entry) = state.entry_mut(id) else {
            return;
        };
        entry.record.status = DownloadStatus::Downloading;
        entry.record.media_url = Some(media.media_url.clone());
        entry.record.bytes_downloaded = resume_from;
    }
    if resume_from > 0 {
        info!(id, resume_from, "resuming from existing partial file");
    }

    let request = TransferRequest {
        media_url: media.media_url,
        referer: media.referer,
        dest_path,
        resume_from,
        proxy,
    };
    let progress_inner = Arc::clone(inner);
    let outcome = inner
        .engine
        .transfer(request, cancel_rx, move |progress| {
            update_progress(&progress_inner, id, progress);
        })
        .await;

    match outcome {
        Ok(TransferOutcome::Completed {
            bytes_downloaded,
            bytes_total,
        }) => finish_completed(inner, id, bytes_downloaded, bytes_total),
        Ok(TransferOutcome::Cancelled) => settle_cancelled(inner, id),
        Err(error) => finish_failed(inner, id, error.to_string()),
    }
}

/// Applies a per-chunk progress sample to the owning record.
fn update_progress(inner: &Arc<Inner>, id: u64, progress: TransferProgress) {
    let mut state = inner.lock();
    if let Some(entry) = state.entry_mut(id) {
        if entry.record.status == DownloadStatus::Downloading {
            entry.record.progress = progress.percent;
            entry.record.bytes_downloaded = progress.bytes_downloaded;
            entry.record.bytes_total = progress.bytes_total;
            entry.record.bytes_per_sec = progress.bytes_per_sec;
        }
    }
}

/// Resolves what a cancelled transfer outcome means for the record.
///
/// A pause intent parks the record in the active set; a cancel intent was
/// already fully handled by [`Scheduler::cancel`] (entry removed, partial
/// deleted), so a missing entry needs nothing further. Never a failure.
fn settle_cancelled(inner: &Arc<Inner>, id: u64) {
    {
        let mut state = inner.lock();
        if let Some(entry) = state.entry_mut(id) {
            if entry.pause_requested {
                entry.record.status = DownloadStatus::Paused;
                entry.record.bytes_per_sec = 0.0;
                entry.cancel = None;
                entry.pause_requested = false;
                info!(id, "download paused");
            }
        }
    }
    pump(inner);
}

fn finish_completed(inner: &Arc<Inner>, id: u64, bytes_downloaded: u64, bytes_total: u64) {
    {
        let mut state = inner.lock();
        let Some(entry) = state.entry_mut(id) else {
            return;
        };
        entry.record.status = DownloadStatus::Completed;
        entry.record.progress = 100.0;
        entry.record.bytes_downloaded = bytes_downloaded;
        entry.record.bytes_total = Some(bytes_total);
        entry.record.bytes_per_sec = 0.0;
        entry.cancel = None;
        info!(id, bytes = bytes_downloaded, "download completed");
    }
    schedule_eviction(inner, id);
    pump(inner);
}

fn finish_failed(inner: &Arc<Inner>, id: u64, detail: String) {
    {
        let mut state = inner.lock();
        let Some(entry) = state.entry_mut(id) else {
            return;
        };
        entry.record.status = DownloadStatus::Failed;
        entry.record.error = Some(detail.clone());
        entry.record.bytes_per_sec = 0.0;
        entry.cancel = None;
        warn!(id, detail, "download failed");
    }
    schedule_eviction(inner, id);
    pump(inner);
}

/// Evicts a terminal record from the active set after the grace window.
///
/// The concurrency slot was already freed at the terminal transition;
/// eviction only ends the record's visibility to pollers. Failed records
/// release their destination claim so a re-submission maps to the same path
/// and resumes the partial file.
fn schedule_eviction(inner: &Arc<Inner>, id: u64) {
    let grace = inner.options.grace_window;
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        {
            let mut state = inner.lock();
            if let Some(index) = state.entry_index(id) {
                if state.active[index].record.status.is_terminal() {
                    let entry = state.active.remove(index);
                    if entry.record.status == DownloadStatus::Failed {
                        state.claimed_paths.remove(&entry.record.dest_path);
                    }
                    debug!(id, "evicted terminal record after grace window");
                }
            }
        }
        pump(&inner);
    });
}
