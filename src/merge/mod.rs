//! Merge several vocabulary files into one deduplicated vocabulary.
//!
//! Words are keyed by their exact `value`. Inline captions are converted into
//! external captions carrying the provenance of the vocabulary they came from,
//! and each merged word keeps at most [`MAX_EXTERNAL_CAPTIONS`] of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::vocabulary::{CaptionSource, ExternalCaption, Vocabulary, VocabularyType, Word, store};

pub mod session;
pub mod worker;

pub use crate::vocabulary::MAX_EXTERNAL_CAPTIONS;
pub use session::{MergeSession, MergeStatus};
pub use worker::{MergeJob, MergeJobId, MergeMessage, MergeWorkerHandle, spawn_merge_worker};

/// Maximum number of source files accepted by a single merge.
pub const MAX_SOURCE_FILES: usize = 100;

/// Errors surfaced by a merge request.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No source files were selected.
    #[error("Select at least one vocabulary file to merge")]
    NoSourceFiles,
    /// More source files than a single merge accepts.
    #[error("Too many vocabulary files selected ({count}); at most {max} can be merged at once")]
    TooManySourceFiles { count: usize, max: usize },
    /// A source file could not be read or parsed. Nothing was merged.
    #[error("Failed to load {path}: {source}")]
    SourceLoadFailure {
        path: PathBuf,
        source: store::StoreError,
    },
    /// The merged vocabulary could not be written.
    #[error("Failed to save merged vocabulary to {path}: {source}")]
    SaveFailure {
        path: PathBuf,
        source: store::StoreError,
    },
    /// A merge is already running for this session.
    #[error("A merge is already in progress")]
    InProgress,
    /// There is no merged vocabulary waiting to be saved.
    #[error("No merged vocabulary to save")]
    NothingToSave,
    /// The background worker is no longer accepting jobs.
    #[error("Merge worker is not running")]
    WorkerUnavailable,
}

/// Observer for merge progress, invoked on the thread running the merge.
pub trait MergeProgress {
    /// A source file is about to be read.
    fn on_file_start(&mut self, file_name: &str);
    /// A source file finished; `count` is the merged word count so far.
    fn on_running_total(&mut self, count: usize);
}

/// Progress observer that ignores every event.
pub struct NoProgress;

impl MergeProgress for NoProgress {
    fn on_file_start(&mut self, _file_name: &str) {}
    fn on_running_total(&mut self, _count: usize) {}
}

/// Progress observer built from one closure per callback.
pub struct ProgressCallbacks<S, T> {
    pub on_file_start: S,
    pub on_running_total: T,
}

impl<S, T> MergeProgress for ProgressCallbacks<S, T>
where
    S: FnMut(&str),
    T: FnMut(usize),
{
    fn on_file_start(&mut self, file_name: &str) {
        (self.on_file_start)(file_name);
    }

    fn on_running_total(&mut self, count: usize) {
        (self.on_running_total)(count);
    }
}

/// Reject source lists the merge will not attempt.
pub fn check_source_count(count: usize) -> Result<(), MergeError> {
    if count == 0 {
        return Err(MergeError::NoSourceFiles);
    }
    if count > MAX_SOURCE_FILES {
        return Err(MergeError::TooManySourceFiles {
            count,
            max: MAX_SOURCE_FILES,
        });
    }
    Ok(())
}

/// Merge vocabulary files from disk into a new vocabulary called `name`.
pub fn merge_files<P, R>(sources: &[P], name: &str, progress: &mut R) -> Result<Vocabulary, MergeError>
where
    P: AsRef<Path>,
    R: MergeProgress + ?Sized,
{
    merge_with_loader(sources, name, progress, store::load)
}

/// Merge using a caller-supplied loader for each source path.
pub fn merge_with_loader<P, R, L>(
    sources: &[P],
    name: &str,
    progress: &mut R,
    mut load: L,
) -> Result<Vocabulary, MergeError>
where
    P: AsRef<Path>,
    R: MergeProgress + ?Sized,
    L: FnMut(&Path) -> Result<Vocabulary, store::StoreError>,
{
    check_source_count(sources.len())?;
    tracing::info!("Merging {} vocabulary files into '{name}'", sources.len());

    let mut merger = VocabularyMerger::new(name);
    for entry in sources {
        let path = entry.as_ref();
        progress.on_file_start(&store::display_name(path));
        let vocabulary = load(path).map_err(|source| {
            tracing::warn!("Aborting merge, failed to load {}: {source}", path.display());
            MergeError::SourceLoadFailure {
                path: path.to_path_buf(),
                source,
            }
        })?;
        merger.absorb(vocabulary);
        progress.on_running_total(merger.len());
    }

    let merged = merger.finish();
    tracing::info!("Merged vocabulary '{name}' has {} words", merged.len());
    Ok(merged)
}

/// Incremental merge state: one merged vocabulary plus a lookup by word value.
#[derive(Debug)]
pub struct VocabularyMerger {
    merged: Vocabulary,
    index: HashMap<String, usize>,
    dropped_captions: usize,
}

impl VocabularyMerger {
    /// Start an empty merged vocabulary.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            merged: Vocabulary::new(name, VocabularyType::Document, String::new()),
            index: HashMap::new(),
            dropped_captions: 0,
        }
    }

    /// Fold every word of `source` into the merged vocabulary, in source order.
    pub fn absorb(&mut self, mut source: Vocabulary) {
        if self.merged.language.is_empty() && !source.language.is_empty() {
            self.merged.language = source.language.clone();
        }
        let caption_source = source.caption_source();
        let before = self.merged.len();
        for mut word in source.take_words() {
            match self.index.get(&word.value) {
                None => {
                    self.dropped_captions += word.externalize_captions(&caption_source);
                    self.index.insert(word.value.clone(), self.merged.len());
                    self.merged.push_word(word);
                }
                Some(&idx) => {
                    let existing = &mut self.merged.words_mut()[idx];
                    self.dropped_captions += merge_duplicate(existing, word, &caption_source);
                }
            }
        }
        tracing::debug!(
            "Absorbed '{}': {} new words, {} total",
            source.name,
            self.merged.len() - before,
            self.merged.len()
        );
    }

    /// Number of distinct words merged so far.
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Captions discarded because their word was already at capacity.
    pub fn dropped_captions(&self) -> usize {
        self.dropped_captions
    }

    /// Hand over the merged vocabulary.
    pub fn finish(self) -> Vocabulary {
        if self.dropped_captions > 0 {
            tracing::debug!(
                "Dropped {} captions over the per-word limit of {MAX_EXTERNAL_CAPTIONS}",
                self.dropped_captions
            );
        }
        self.merged
    }
}

/// Add captions from a duplicate `incoming` word onto `existing`.
///
/// External captions win over inline ones. Returns the number dropped.
fn merge_duplicate(
    existing: &mut Word,
    mut incoming: Word,
    source: &CaptionSource,
) -> usize {
    let candidates: Vec<_> = if !incoming.external_captions.is_empty() {
        std::mem::take(&mut incoming.external_captions)
    } else {
        std::mem::take(&mut incoming.captions)
            .into_iter()
            .map(|caption| ExternalCaption::from_caption(caption, source))
            .collect()
    };
    candidates
        .into_iter()
        .map(|caption| existing.push_external_caption(caption))
        .filter(|pushed| !pushed)
        .count()
}
