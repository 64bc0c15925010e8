use certgen_engine::{GenerationJob, GenerationOutput, Generator, Progress};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::worker::worker_task;
use crate::{JobCommand, JobId, JobUpdate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Generation cancelled")]
    Cancelled,
    #[error("Generation failed: {0}")]
    Failed(String),
    #[error("Generation worker stopped")]
    WorkerStopped,
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

/// Cloneable handle that aborts the client's most recent job.
///
/// Once that job has finished, cancelling is a no-op; later jobs are not
/// affected.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    command_tx: mpsc::UnboundedSender<JobCommand>,
    current: Arc<AtomicU64>,
}

impl CancelHandle {
    /// Returns false when the worker is gone
    pub fn cancel(&self) -> bool {
        let job_id = JobId(self.current.load(Ordering::SeqCst));
        self.command_tx.send(JobCommand::Cancel { job_id }).is_ok()
    }
}

/// Cancels its job when a `generate` future is dropped before the outcome
struct AbandonGuard {
    command_tx: mpsc::UnboundedSender<JobCommand>,
    job_id: JobId,
    armed: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Job {} abandoned by its caller, cancelling", self.job_id.0);
            let _ = self.command_tx.send(JobCommand::Cancel {
                job_id: self.job_id,
            });
        }
    }
}

/// Caller side of the execution boundary.
///
/// Owns a background worker; `generate` takes `&mut self`, so one client
/// never has two jobs in flight. Every job gets its own id and updates for
/// any other id are discarded.
pub struct GenerationClient {
    command_tx: mpsc::UnboundedSender<JobCommand>,
    update_rx: mpsc::UnboundedReceiver<JobUpdate>,
    worker: JoinHandle<()>,
    next_id: u64,
    current: Arc<AtomicU64>,
    /// Submitted job whose outcome has not been received yet
    in_flight: Option<JobId>,
}

impl GenerationClient {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(generator: Generator) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(worker_task(generator, command_rx, update_tx));
        Self {
            command_tx,
            update_rx,
            worker,
            next_id: 1,
            current: Arc::new(AtomicU64::new(0)),
            in_flight: None,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            command_tx: self.command_tx.clone(),
            current: self.current.clone(),
        }
    }

    /// Submit a job and wait for its outcome, relaying progress.
    ///
    /// Dropping the returned future cancels the job; the next call waits
    /// for it to wind down before submitting.
    pub async fn generate(
        &mut self,
        job: GenerationJob,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<GenerationOutput, ClientError> {
        self.settle_abandoned().await?;

        let job_id = JobId(self.next_id);
        self.next_id += 1;
        self.current.store(job_id.0, Ordering::SeqCst);
        self.command_tx
            .send(JobCommand::Generate { job_id, job })
            .map_err(|_| ClientError::WorkerStopped)?;
        self.in_flight = Some(job_id);

        let mut guard = AbandonGuard {
            command_tx: self.command_tx.clone(),
            job_id,
            armed: true,
        };

        while let Some(update) = self.update_rx.recv().await {
            if update.job_id() != job_id {
                log::debug!("Discarding update for job {}", update.job_id().0);
                continue;
            }
            if update.is_terminal() {
                guard.armed = false;
                self.in_flight = None;
            }
            match update {
                JobUpdate::Progress { progress, .. } => on_progress(progress),
                JobUpdate::Complete { output, .. } => return Ok(output),
                JobUpdate::Cancelled { .. } => return Err(ClientError::Cancelled),
                JobUpdate::Failed { message, .. } => return Err(ClientError::Failed(message)),
            }
        }
        guard.armed = false;
        Err(ClientError::WorkerStopped)
    }

    /// Wait out a job whose caller stopped listening
    async fn settle_abandoned(&mut self) -> Result<(), ClientError> {
        let Some(job_id) = self.in_flight else {
            return Ok(());
        };
        log::debug!("Waiting for abandoned job {} to finish", job_id.0);
        while let Some(update) = self.update_rx.recv().await {
            if update.job_id() == job_id && update.is_terminal() {
                self.in_flight = None;
                return Ok(());
            }
        }
        Err(ClientError::WorkerStopped)
    }

    /// Close the command channel and wait for the worker to finish.
    ///
    /// Outstanding cancel handles keep the channel open; drop them first.
    pub async fn shutdown(self) {
        drop(self.command_tx);
        if let Err(e) = self.worker.await {
            log::error!("Generation worker ended abnormally: {e}");
        }
    }
}
