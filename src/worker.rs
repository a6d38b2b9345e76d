//! Background track simplification.
//!
//! RDP on a multi-hour track is the only computation slow enough to stall an
//! interactive view, so it runs on the tokio blocking pool. Every submission
//! gets a new job id and cancels the one before it. Results whose id is not
//! the latest are reported as [`SimplifyError::Stale`] and must be ignored;
//! until a result arrives the caller renders the full track.
//!
//! ```rust,no_run
//! use igc_analysis::{Fix, SimplifyConfig, worker::SimplifyWorker};
//!
//! # async fn render(fixes: Vec<Fix>) {
//! let worker = SimplifyWorker::from_current().expect("inside a tokio runtime");
//! let handle = worker.submit(fixes.clone(), &SimplifyConfig::default());
//!
//! // Never blocks on failure: falls back to the full track
//! let track = handle.simplified_or(&fixes).await;
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::SimplifyError;
use crate::simplify::{simplify_cancellable, SimplifyConfig};
use crate::Fix;

/// One simplification request.
#[derive(Debug, Clone)]
pub struct SimplifyJob {
    pub job_id: u64,
    pub fixes: Vec<Fix>,
    pub epsilon_meters: f64,
    pub min_points_no_rdp: usize,
}

/// Result of a finished [`SimplifyJob`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimplifyResponse {
    pub job_id: u64,
    pub simplified_fixes: Vec<Fix>,
}

/// Submits simplification jobs to a tokio runtime.
pub struct SimplifyWorker {
    runtime: Handle,
    latest: Arc<AtomicU64>,
    /// Cancel flag of the most recent job
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl SimplifyWorker {
    /// Create a worker that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            latest: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
        }
    }

    /// Create a worker on the runtime of the calling task, if any.
    pub fn from_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Id of the most recently submitted job (0 before the first submission).
    pub fn latest_job_id(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Submit a track for simplification, cancelling any earlier job.
    pub fn submit(&self, fixes: Vec<Fix>, config: &SimplifyConfig) -> SimplifyHandle {
        let job_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));

        let previous = {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            current.replace(Arc::clone(&cancel))
        };
        if let Some(previous) = previous {
            previous.store(true, Ordering::SeqCst);
        }

        let job = SimplifyJob {
            job_id,
            fixes,
            epsilon_meters: config.epsilon_meters,
            min_points_no_rdp: config.min_points_no_rdp,
        };
        debug!("[worker] job {} submitted ({} fixes)", job_id, job.fixes.len());

        let (tx, rx) = oneshot::channel();
        let flag = Arc::clone(&cancel);
        let task = self.runtime.spawn_blocking(move || {
            let result = simplify_cancellable(
                &job.fixes,
                job.epsilon_meters,
                job.min_points_no_rdp,
                &flag,
            )
            .map(|simplified_fixes| SimplifyResponse {
                job_id: job.job_id,
                simplified_fixes,
            });
            // Receiver may be gone if the handle was dropped
            let _ = tx.send(result);
        });

        SimplifyHandle {
            job_id,
            cancel,
            latest: Arc::clone(&self.latest),
            task,
            result: rx,
        }
    }
}

/// Handle to one submitted job.
pub struct SimplifyHandle {
    job_id: u64,
    cancel: Arc<AtomicBool>,
    latest: Arc<AtomicU64>,
    task: JoinHandle<()>,
    result: oneshot::Receiver<Option<SimplifyResponse>>,
}

impl SimplifyHandle {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Ask the job to stop. A job already past its last cancellation check
    /// still finishes, but [`wait`](Self::wait) reports it as cancelled.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether no newer job has been submitted since this one.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.job_id
    }

    /// Wait for the result. Superseded and cancelled jobs are errors even if
    /// they produced output.
    pub async fn wait(self) -> Result<SimplifyResponse, SimplifyError> {
        let outcome = self.result.await;

        let latest = self.latest.load(Ordering::SeqCst);
        if latest != self.job_id {
            return Err(SimplifyError::Stale {
                job_id: self.job_id,
                latest,
            });
        }
        if self.cancel.load(Ordering::SeqCst) {
            return Err(SimplifyError::Cancelled);
        }

        match outcome {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(SimplifyError::Cancelled),
            Err(_) => Err(SimplifyError::WorkerFailed(
                "task ended without sending a result".to_string(),
            )),
        }
    }

    /// The simplified track, or `fallback` if the job failed, was cancelled
    /// or went stale.
    pub async fn simplified_or(self, fallback: &[Fix]) -> Vec<Fix> {
        let job_id = self.job_id;
        match self.wait().await {
            Ok(response) => response.simplified_fixes,
            Err(e @ SimplifyError::WorkerFailed(_)) => {
                warn!("[worker] job {}: {}, using full track", job_id, e);
                fallback.to_vec()
            }
            Err(e) => {
                debug!("[worker] job {}: {}, using full track", job_id, e);
                fallback.to_vec()
            }
        }
    }
}
