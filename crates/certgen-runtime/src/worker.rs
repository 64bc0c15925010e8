use certgen_engine::{CancelFlag, GenerationJob, Generator, Progress};
use tokio::sync::mpsc;

use crate::{JobCommand, JobId, JobUpdate};

/// Async worker task that runs generation jobs and sends updates.
///
/// Jobs run one at a time on the blocking pool. While a job runs the worker
/// keeps listening for commands so a `Cancel` for it lands between rows.
pub async fn worker_task(
    generator: Generator,
    mut command_rx: mpsc::UnboundedReceiver<JobCommand>,
    update_tx: mpsc::UnboundedSender<JobUpdate>,
) {
    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            JobCommand::Generate { job_id, job } => {
                run_job(&generator, job_id, job, &mut command_rx, &update_tx).await;
            }
            JobCommand::Cancel { job_id } => {
                log::debug!("Cancel for job {} received with no job running", job_id.0);
            }
        }
    }
    log::debug!("Command channel closed, worker exiting");
}

async fn run_job(
    generator: &Generator,
    job_id: JobId,
    job: GenerationJob,
    command_rx: &mut mpsc::UnboundedReceiver<JobCommand>,
    update_tx: &mpsc::UnboundedSender<JobUpdate>,
) {
    let cancel = CancelFlag::new();
    let progress_tx = update_tx.clone();
    let on_progress = move |progress: Progress| {
        let _ = progress_tx.send(JobUpdate::Progress { job_id, progress });
    };

    let job_future = generator.generate_async(job, on_progress, cancel.clone());
    tokio::pin!(job_future);

    let mut commands_open = true;
    let result = loop {
        tokio::select! {
            result = &mut job_future => break result,
            cmd = command_rx.recv(), if commands_open => match cmd {
                Some(JobCommand::Cancel { job_id: target }) if target == job_id => {
                    log::info!("Cancelling job {}", job_id.0);
                    cancel.cancel();
                }
                Some(JobCommand::Cancel { job_id: target }) => {
                    log::debug!("Ignoring cancel for job {}, job {} is running", target.0, job_id.0);
                }
                Some(JobCommand::Generate { job_id: rejected, .. }) => {
                    log::warn!("Rejecting job {} submitted while job {} is running", rejected.0, job_id.0);
                    let _ = update_tx.send(JobUpdate::Failed {
                        job_id: rejected,
                        message: "A generation job is already running".to_string(),
                    });
                }
                None => {
                    // Nobody is left to receive the result
                    commands_open = false;
                    cancel.cancel();
                }
            },
        }
    };

    let update = match result {
        Ok(output) => JobUpdate::Complete { job_id, output },
        Err(e) if e.is_cancelled() => JobUpdate::Cancelled { job_id },
        Err(e) => {
            log::error!("Job {} failed: {e}", job_id.0);
            JobUpdate::Failed {
                job_id,
                message: e.to_string(),
            }
        }
    };
    let _ = update_tx.send(update);
}
