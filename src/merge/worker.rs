use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use uuid::Uuid;

use super::{MergeError, MergeProgress, merge_files};
use crate::vocabulary::Vocabulary;

const MERGE_WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Identifier attached to every message produced for one merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeJobId(Uuid);

impl MergeJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MergeJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MergeJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// One merge request submitted to the worker.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub id: MergeJobId,
    pub sources: Vec<PathBuf>,
    /// Name given to the merged vocabulary.
    pub name: String,
}

impl MergeJob {
    pub fn new(sources: Vec<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            id: MergeJobId::new(),
            sources,
            name: name.into(),
        }
    }
}

/// Events published by the worker while a job runs.
#[derive(Debug)]
pub enum MergeMessage {
    FileStarted {
        job: MergeJobId,
        file_name: String,
    },
    RunningTotal {
        job: MergeJobId,
        count: usize,
    },
    Finished {
        job: MergeJobId,
        result: Result<Vocabulary, MergeError>,
        elapsed: Duration,
    },
}

impl MergeMessage {
    pub fn job(&self) -> MergeJobId {
        match self {
            MergeMessage::FileStarted { job, .. }
            | MergeMessage::RunningTotal { job, .. }
            | MergeMessage::Finished { job, .. } => *job,
        }
    }
}

/// Join handle and shutdown signal for the merge worker thread.
pub struct MergeWorkerHandle {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl MergeWorkerHandle {
    /// Stop taking new jobs and wait for the thread to exit.
    ///
    /// A merge that is already running finishes first.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MergeWorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ChannelProgress<'a> {
    job: MergeJobId,
    tx: &'a Sender<MergeMessage>,
}

impl MergeProgress for ChannelProgress<'_> {
    fn on_file_start(&mut self, file_name: &str) {
        let _ = self.tx.send(MergeMessage::FileStarted {
            job: self.job,
            file_name: file_name.to_string(),
        });
    }

    fn on_running_total(&mut self, count: usize) {
        let _ = self.tx.send(MergeMessage::RunningTotal {
            job: self.job,
            count,
        });
    }
}

/// Spawn the merge worker and return its job channel, message channel and handle.
pub fn spawn_merge_worker() -> (Sender<MergeJob>, Receiver<MergeMessage>, MergeWorkerHandle) {
    let (tx, rx) = std::sync::mpsc::channel::<MergeJob>();
    let (result_tx, result_rx) = std::sync::mpsc::channel::<MergeMessage>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_worker = Arc::clone(&shutdown);
    let handle = thread::spawn(move || {
        while !shutdown_worker.load(Ordering::Relaxed) {
            match rx.recv_timeout(MERGE_WORKER_POLL_INTERVAL) {
                Ok(job) => run_job(job, &result_tx),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
    (
        tx,
        result_rx,
        MergeWorkerHandle {
            shutdown,
            join_handle: Some(handle),
        },
    )
}

fn run_job(job: MergeJob, result_tx: &Sender<MergeMessage>) {
    let start = Instant::now();
    tracing::info!("Starting merge job {} ({} files)", job.id, job.sources.len());
    let mut progress = ChannelProgress {
        job: job.id,
        tx: result_tx,
    };
    let result = merge_files(&job.sources, &job.name, &mut progress);
    if let Err(err) = &result {
        tracing::warn!("Merge job {} failed: {err}", job.id);
    }
    let _ = result_tx.send(MergeMessage::Finished {
        job: job.id,
        result,
        elapsed: start.elapsed(),
    });
}
