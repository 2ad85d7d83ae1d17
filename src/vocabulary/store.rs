//! JSON persistence for vocabulary files.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::Vocabulary;
use crate::atomic_file::atomic_write;

/// Extension used for vocabulary files written by this crate.
pub const VOCABULARY_EXTENSION: &str = "json";

/// Errors raised while reading or writing a vocabulary file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read the file from disk.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file was read but is not a valid vocabulary.
    #[error("Invalid vocabulary file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Failed to serialize the vocabulary.
    #[error("Failed to serialize vocabulary for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Failed to create the destination directory.
    #[error("Unable to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the destination file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Read and parse a vocabulary file.
pub fn load(path: &Path) -> Result<Vocabulary, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let vocabulary: Vocabulary =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(vocabulary.normalized())
}

/// Write a vocabulary to `path`, replacing any existing file atomically.
pub fn save(vocabulary: &Vocabulary, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = serde_json::to_vec_pretty(vocabulary).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, &data).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Saved {} words to {}", vocabulary.len(), path.display());
    Ok(())
}

/// Vocabulary name for a file: its file name without the extension.
pub fn name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Display label for a file in progress messages.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{Caption, VocabularyType, Word};
    use tempfile::tempdir;

    #[test]
    fn save_then_load_preserves_words_and_captions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("movie.json");
        let mut word = Word::new("run");
        word.translation = "跑".into();
        word.captions.push(Caption::new("00:00:01,000", "00:00:02,000", "run!"));
        let vocab = Vocabulary::new("movie", VocabularyType::Subtitles, "english")
            .with_video("/videos/movie.mkv", 2)
            .with_words(vec![word.clone(), Word::new("walk")]);

        save(&vocab, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, vocab);
        assert_eq!(loaded.words()[0], word);
    }

    #[test]
    fn load_reads_application_json_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{
                "name": "legacy",
                "type": "MKV",
                "language": "english",
                "size": 99,
                "relateVideoPath": "",
                "subtitlesTrackId": 1,
                "wordList": [
                    {"value": "apple", "collins": 2, "oxford": true, "frq": 120,
                     "captions": [{"start": "a", "end": "b", "content": "an apple"}]}
                ],
                "unknownField": true
            }"#,
        )
        .unwrap();

        let loaded = load(&path).unwrap();

        assert_eq!(loaded.vocabulary_type, VocabularyType::Mkv);
        assert_eq!(loaded.size(), 1);
        assert_eq!(loaded.relate_video_path, None);
        assert_eq!(loaded.subtitles_track_id, Some(1));
        let apple = &loaded.words()[0];
        assert!(apple.oxford);
        assert_eq!(apple.frq, Some(120));
        assert_eq!(apple.captions[0].content, "an apple");
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = tempdir().unwrap();
        let result = load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(StoreError::Read { .. })));
    }

    #[test]
    fn name_drops_extension() {
        assert_eq!(name_from_path(Path::new("/tmp/My Words.json")), "My Words");
        assert_eq!(display_name(Path::new("/tmp/My Words.json")), "My Words.json");
    }
}
