//! Task boundary for running validation chains off-thread.
//!
//! Each worker thread owns its own SQLite connection, so chains for
//! different images run concurrently with no shared mutable state — the
//! only cross-image read is the duplicate detector's batch scan, whose
//! weak-consistency window is documented there. Work is fire-and-forget
//! from the enqueuer's perspective; the retry contract at this boundary is
//! explicit in `RetryPolicy`, and the default is a single atomic attempt
//! per image. Images left non-terminal by a crash are re-enqueued via
//! `repository::image::pending_images` on restart.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::db::sqlite::open_database;
use crate::pipeline::orchestrator::ImageValidator;
use crate::pipeline::ValidationError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker queue is closed")]
    QueueClosed,
}

/// Retry contract at the worker boundary. The core itself never retries;
/// anything beyond one attempt is this boundary re-running the whole
/// chain after an infrastructure error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // One atomic attempt per image
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Pool of validation worker threads fed through an in-process queue.
///
/// Supports graceful shutdown via `shutdown()` or automatic cleanup on
/// `Drop`: queued work drains, then the threads exit.
pub struct ValidationWorker {
    sender: Option<Sender<Uuid>>,
    handles: Vec<std::thread::JoinHandle<()>>,
}

impl ValidationWorker {
    /// Start `worker_count` threads validating against the database at
    /// `db_path`.
    pub fn start(
        db_path: PathBuf,
        validator: Arc<ImageValidator>,
        worker_count: usize,
        retry: RetryPolicy,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<Uuid>();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..worker_count.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                let validator = validator.clone();
                let db_path = db_path.clone();
                std::thread::spawn(move || {
                    tracing::debug!(worker = index, "Validation worker started");
                    worker_loop(&db_path, &validator, &receiver, retry);
                    tracing::debug!(worker = index, "Validation worker stopped");
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            handles,
        }
    }

    /// Queue an image for validation.
    pub fn enqueue(&self, image_id: Uuid) -> Result<(), WorkerError> {
        self.sender
            .as_ref()
            .ok_or(WorkerError::QueueClosed)?
            .send(image_id)
            .map_err(|_| WorkerError::QueueClosed)
    }

    /// Stop accepting work, drain the queue and join the threads.
    pub fn shutdown(&mut self) {
        // Dropping the sender is the shutdown signal: workers exit once
        // the channel is drained and disconnected.
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ValidationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    db_path: &Path,
    validator: &ImageValidator,
    receiver: &Arc<Mutex<Receiver<Uuid>>>,
    retry: RetryPolicy,
) {
    loop {
        // The mutex is held only while waiting for a job, never while
        // running one, so other workers pick up queued images in parallel.
        let job = {
            let guard = receiver.lock().expect("worker queue poisoned");
            guard.recv()
        };

        match job {
            Ok(image_id) => run_job(db_path, validator, image_id, retry),
            // Sender dropped and queue drained
            Err(_) => return,
        }
    }
}

fn run_job(db_path: &Path, validator: &ImageValidator, image_id: Uuid, retry: RetryPolicy) {
    let conn = match open_database(db_path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(image_id = %image_id, error = %e, "Worker could not open database");
            return;
        }
    };

    for attempt in 1..=retry.max_attempts.max(1) {
        match validator.validate(&conn, &image_id) {
            Ok(status) => {
                tracing::debug!(
                    image_id = %image_id,
                    status = status.as_str(),
                    attempt,
                    "Validation chain finished"
                );
                return;
            }
            // Double enqueue or a restart race: the image is already done
            Err(ValidationError::AlreadyTerminal { id, status }) => {
                tracing::debug!(image_id = %id, status = %status, "Image already terminal, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    image_id = %image_id,
                    attempt,
                    max_attempts = retry.max_attempts,
                    error = %e,
                    "Validation attempt failed"
                );
                if attempt < retry.max_attempts {
                    std::thread::sleep(retry.backoff);
                }
            }
        }
    }
}
