mod client;
mod worker;

pub use client::{CancelHandle, ClientError, GenerationClient};
pub use worker::worker_task;

// Re-export types from the engine
pub use certgen_engine::{GenerationJob, GenerationOutput, Generator, Progress};

/// Commands sent from the caller to the worker
#[derive(Debug)]
pub enum JobCommand {
    Generate {
        job_id: JobId,
        job: GenerationJob,
    },
    /// Abort the job at its next row boundary; ignored unless it is running
    Cancel {
        job_id: JobId,
    },
}

/// Updates sent from the worker to the caller
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Progress {
        job_id: JobId,
        progress: Progress,
    },
    Complete {
        job_id: JobId,
        output: GenerationOutput,
    },
    Cancelled {
        job_id: JobId,
    },
    Failed {
        job_id: JobId,
        message: String,
    },
}

impl JobUpdate {
    pub fn job_id(&self) -> JobId {
        match self {
            JobUpdate::Progress { job_id, .. }
            | JobUpdate::Complete { job_id, .. }
            | JobUpdate::Cancelled { job_id }
            | JobUpdate::Failed { job_id, .. } => *job_id,
        }
    }

    /// Whether this is the last update the job will send
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobUpdate::Progress { .. })
    }
}

/// Handle to a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);
