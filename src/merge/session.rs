//! State for one merge dialog: submits jobs, tracks progress and keeps the
//! merged vocabulary until it has been saved.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use super::worker::{MergeJob, MergeJobId, MergeMessage, MergeWorkerHandle, spawn_merge_worker};
use super::{MergeError, check_source_count};
use crate::vocabulary::{Vocabulary, store};

/// Coarse state shown next to the progress indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    Idle,
    Running,
    /// Merge finished; the result is waiting to be saved.
    Ready,
    Saved(PathBuf),
    Failed(String),
}

struct ActiveJob {
    id: MergeJobId,
    output: PathBuf,
}

/// Controller for a merge workflow backed by a dedicated worker thread.
pub struct MergeSession {
    job_tx: Sender<MergeJob>,
    message_rx: Receiver<MergeMessage>,
    worker: MergeWorkerHandle,
    active: Option<ActiveJob>,
    output: Option<PathBuf>,
    merged: Option<Vocabulary>,
    current_file: Option<String>,
    running_total: usize,
    status: MergeStatus,
}

impl MergeSession {
    pub fn new() -> Self {
        let (job_tx, message_rx, worker) = spawn_merge_worker();
        Self::from_worker(job_tx, message_rx, worker)
    }

    fn from_worker(
        job_tx: Sender<MergeJob>,
        message_rx: Receiver<MergeMessage>,
        worker: MergeWorkerHandle,
    ) -> Self {
        Self {
            job_tx,
            message_rx,
            worker,
            active: None,
            output: None,
            merged: None,
            current_file: None,
            running_total: 0,
            status: MergeStatus::Idle,
        }
    }

    /// Submit a merge of `sources` whose result will be saved to `output`.
    ///
    /// The output file stem becomes the merged vocabulary's name. Source count
    /// limits are checked here so nothing is queued for a rejected request.
    pub fn start(&mut self, sources: Vec<PathBuf>, output: PathBuf) -> Result<MergeJobId, MergeError> {
        if self.active.is_some() {
            return Err(MergeError::InProgress);
        }
        if let Err(err) = check_source_count(sources.len()) {
            self.status = MergeStatus::Failed(err.to_string());
            return Err(err);
        }
        let job = MergeJob::new(sources, store::name_from_path(&output));
        let id = job.id;
        self.job_tx.send(job).map_err(|_| {
            self.status = MergeStatus::Failed(MergeError::WorkerUnavailable.to_string());
            MergeError::WorkerUnavailable
        })?;
        tracing::debug!("Queued merge job {id} for {}", output.display());
        self.active = Some(ActiveJob { id, output });
        self.merged = None;
        self.current_file = None;
        self.running_total = 0;
        self.status = MergeStatus::Running;
        Ok(id)
    }

    /// Apply any pending worker messages without blocking.
    ///
    /// Returns `true` when the active merge finished during this call.
    pub fn poll(&mut self) -> bool {
        loop {
            match self.message_rx.try_recv() {
                Ok(message) => {
                    if self.apply(message) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return self.worker_lost(),
            }
        }
    }

    /// Block until the active merge finishes, calling `on_update` after each message.
    pub fn wait(&mut self, mut on_update: impl FnMut(&MergeSession)) {
        while self.active.is_some() {
            match self.message_rx.recv() {
                Ok(message) => {
                    let finished = self.apply(message);
                    on_update(&*self);
                    if finished {
                        return;
                    }
                }
                Err(_) => {
                    self.worker_lost();
                    return;
                }
            }
        }
    }

    /// Like [`MergeSession::wait`] but gives up after `timeout` without a message.
    ///
    /// Returns `true` when the active merge ended, including when the worker
    /// went away and the merge was marked failed.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        while self.active.is_some() {
            match self.message_rx.recv_timeout(timeout) {
                Ok(message) => {
                    if self.apply(message) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return self.worker_lost(),
            }
        }
        false
    }

    /// Write the retained merged vocabulary to the chosen output path.
    ///
    /// On failure the vocabulary is kept so the save can be retried.
    pub fn save_result(&mut self) -> Result<PathBuf, MergeError> {
        let (Some(vocabulary), Some(output)) = (self.merged.as_ref(), self.output.as_ref()) else {
            return Err(MergeError::NothingToSave);
        };
        match store::save(vocabulary, output) {
            Ok(()) => {
                let path = output.clone();
                tracing::info!("Saved merged vocabulary ({} words) to {}", vocabulary.len(), path.display());
                self.merged = None;
                self.status = MergeStatus::Saved(path.clone());
                Ok(path)
            }
            Err(source) => {
                let err = MergeError::SaveFailure {
                    path: output.clone(),
                    source,
                };
                tracing::warn!("{err}");
                self.status = MergeStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Choose a different destination for the pending result before retrying the save.
    pub fn set_output(&mut self, output: PathBuf) {
        if let Some(vocabulary) = self.merged.as_mut() {
            vocabulary.name = store::name_from_path(&output);
        }
        self.output = Some(output);
    }

    pub fn status(&self) -> &MergeStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// File currently being read by the worker.
    pub fn current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    /// Merged word count after the most recently finished source file.
    pub fn running_total(&self) -> usize {
        self.running_total
    }

    /// Merged vocabulary waiting to be saved.
    pub fn merged(&self) -> Option<&Vocabulary> {
        self.merged.as_ref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Stop the worker thread. Further `start` calls fail.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }

    fn apply(&mut self, message: MergeMessage) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        if message.job() != active.id {
            tracing::debug!("Ignoring message for stale merge job {}", message.job());
            return false;
        }
        match message {
            MergeMessage::FileStarted { file_name, .. } => {
                self.current_file = Some(file_name);
                false
            }
            MergeMessage::RunningTotal { count, .. } => {
                self.running_total = count;
                false
            }
            MergeMessage::Finished { result, elapsed, .. } => {
                let output = self.active.take().map(|job| job.output);
                self.current_file = None;
                match result {
                    Ok(vocabulary) => {
                        tracing::info!("Merge finished in {elapsed:?}: {} words", vocabulary.len());
                        self.running_total = vocabulary.len();
                        self.merged = Some(vocabulary);
                        self.output = output;
                        self.status = MergeStatus::Ready;
                    }
                    Err(err) => {
                        self.status = MergeStatus::Failed(err.to_string());
                    }
                }
                true
            }
        }
    }

    fn worker_lost(&mut self) -> bool {
        if self.active.take().is_some() {
            self.status = MergeStatus::Failed(MergeError::WorkerUnavailable.to_string());
            return true;
        }
        false
    }
}

impl Default for MergeSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MAX_SOURCE_FILES;
    use crate::vocabulary::{Caption, VocabularyType, Word};
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn write_vocab(dir: &Path, name: &str, words: Vec<Word>) -> PathBuf {
        let path = dir.join(format!("{name}.json"));
        let vocab = Vocabulary::new(name, VocabularyType::Subtitles, "english")
            .with_video(format!("{name}.mp4"), 0)
            .with_words(words);
        store::save(&vocab, &path).unwrap();
        path
    }

    #[test]
    fn merge_then_save_writes_named_output() {
        let dir = tempdir().unwrap();
        let mut word = Word::new("run");
        word.captions.push(Caption::new("1", "2", "run fast"));
        let a = write_vocab(dir.path(), "a", vec![word, Word::new("walk")]);
        let b = write_vocab(dir.path(), "b", vec![Word::new("walk"), Word::new("jump")]);
        let output = dir.path().join("out").join("Combined.json");
        let mut session = MergeSession::new();

        session.start(vec![a, b], output.clone()).unwrap();
        let mut totals = Vec::new();
        session.wait(|session| totals.push(session.running_total()));

        assert_eq!(session.status(), &MergeStatus::Ready);
        assert_eq!(session.merged().map(Vocabulary::len), Some(3));
        assert!(totals.contains(&2));
        assert_eq!(session.save_result().unwrap(), output);
        assert_eq!(session.status(), &MergeStatus::Saved(output.clone()));
        assert!(session.merged().is_none());

        let saved = store::load(&output).unwrap();
        assert_eq!(saved.name, "Combined");
        assert_eq!(saved.size(), 3);
        let run = &saved.words()[0];
        assert_eq!(run.external_captions[0].subtitles_name, "a");
        assert!(run.captions.is_empty());
    }

    #[test]
    fn failed_save_keeps_result_for_retry() {
        let dir = tempdir().unwrap();
        let a = write_vocab(dir.path(), "a", vec![Word::new("one")]);
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let mut session = MergeSession::new();

        session.start(vec![a], blocker.join("merged.json")).unwrap();
        assert!(session.wait_timeout(TIMEOUT));

        let err = session.save_result().unwrap_err();
        assert!(matches!(err, MergeError::SaveFailure { .. }));
        assert!(matches!(session.status(), MergeStatus::Failed(_)));
        assert!(session.merged().is_some());

        let retry = dir.path().join("Retry.json");
        session.set_output(retry.clone());
        assert_eq!(session.save_result().unwrap(), retry);
        assert_eq!(store::load(&retry).unwrap().name, "Retry");
    }

    #[test]
    fn load_failure_surfaces_as_status_and_session_stays_usable() {
        let dir = tempdir().unwrap();
        let mut session = MergeSession::new();

        session
            .start(vec![dir.path().join("missing.json")], dir.path().join("m.json"))
            .unwrap();
        assert!(session.wait_timeout(TIMEOUT));
        assert!(matches!(session.status(), MergeStatus::Failed(msg) if msg.contains("missing.json")));
        assert!(session.merged().is_none());
        assert!(matches!(session.save_result(), Err(MergeError::NothingToSave)));

        let a = write_vocab(dir.path(), "a", vec![Word::new("one")]);
        session.start(vec![a], dir.path().join("m.json")).unwrap();
        assert!(session.wait_timeout(TIMEOUT));
        assert_eq!(session.status(), &MergeStatus::Ready);
    }

    #[test]
    fn too_many_sources_never_reach_the_worker() {
        let dir = tempdir().unwrap();
        let sources: Vec<PathBuf> = (0..=MAX_SOURCE_FILES)
            .map(|idx| dir.path().join(format!("{idx}.json")))
            .collect();
        let mut session = MergeSession::new();

        let err = session.start(sources, dir.path().join("m.json")).unwrap_err();

        assert!(matches!(err, MergeError::TooManySourceFiles { count: 101, .. }));
        assert!(!session.is_running());
        assert!(!session.poll());
        assert!(session.current_file().is_none());
    }

    #[test]
    fn second_start_while_running_is_rejected() {
        let dir = tempdir().unwrap();
        let a = write_vocab(dir.path(), "a", vec![Word::new("one")]);
        let mut session = MergeSession::new();

        session.start(vec![a.clone()], dir.path().join("m.json")).unwrap();
        let second = session.start(vec![a], dir.path().join("n.json"));

        assert!(matches!(second, Err(MergeError::InProgress)));
        assert!(session.wait_timeout(TIMEOUT));
        assert_eq!(session.output(), Some(dir.path().join("m.json").as_path()));
    }

    #[test]
    fn lost_worker_fails_the_merge_and_frees_the_session() {
        let dir = tempdir().unwrap();
        let a = write_vocab(dir.path(), "a", vec![Word::new("one")]);
        let (job_tx, _job_rx) = std::sync::mpsc::channel::<MergeJob>();
        let (message_tx, message_rx) = std::sync::mpsc::channel::<MergeMessage>();
        drop(message_tx);
        let (_, _, worker) = spawn_merge_worker();
        let mut session = MergeSession::from_worker(job_tx, message_rx, worker);

        session.start(vec![a.clone()], dir.path().join("m.json")).unwrap();

        assert!(session.wait_timeout(Duration::from_millis(50)));
        assert!(!session.is_running());
        assert_eq!(
            session.status(),
            &MergeStatus::Failed(MergeError::WorkerUnavailable.to_string())
        );
        assert!(!matches!(
            session.start(vec![a], dir.path().join("m.json")),
            Err(MergeError::InProgress)
        ));
    }
}
