//! Vocabulary data model shared by the store and the merger.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod store;

pub use store::StoreError;

/// Maximum number of external captions a single word may carry.
pub const MAX_EXTERNAL_CAPTIONS: usize = 3;

/// Where a vocabulary's words were collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VocabularyType {
    /// Words extracted from a plain document.
    #[default]
    Document,
    /// Words extracted from a standalone subtitle file.
    Subtitles,
    /// Words extracted from a subtitle track embedded in an MKV container.
    Mkv,
}

impl std::fmt::Display for VocabularyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VocabularyType::Document => f.write_str("DOCUMENT"),
            VocabularyType::Subtitles => f.write_str("SUBTITLES"),
            VocabularyType::Mkv => f.write_str("MKV"),
        }
    }
}

/// Subtitle line attached to a word, valid only inside its own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Caption {
    pub start: String,
    pub end: String,
    pub content: String,
}

impl Caption {
    pub fn new(start: impl Into<String>, end: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            content: content.into(),
        }
    }
}

/// Provenance stamped onto captions when they leave their vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptionSource {
    pub video_path: Option<PathBuf>,
    pub track_id: Option<i32>,
    pub vocabulary_name: String,
}

/// Caption that records which video and subtitle track it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCaption {
    #[serde(default)]
    pub relate_video_path: Option<PathBuf>,
    #[serde(default)]
    pub subtitles_track_id: Option<i32>,
    #[serde(default)]
    pub subtitles_name: String,
    pub start: String,
    pub end: String,
    pub content: String,
}

impl ExternalCaption {
    /// Tag an inline caption with the vocabulary it belongs to.
    pub fn from_caption(caption: Caption, source: &CaptionSource) -> Self {
        Self {
            relate_video_path: source.video_path.clone(),
            subtitles_track_id: source.track_id,
            subtitles_name: source.vocabulary_name.clone(),
            start: caption.start,
            end: caption.end,
            content: caption.content,
        }
    }
}

/// A single vocabulary entry. Two words are the same entry when their
/// `value` strings are identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub value: String,
    #[serde(default)]
    pub usphone: String,
    #[serde(default)]
    pub ukphone: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub collins: i32,
    #[serde(default)]
    pub oxford: bool,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub bnc: Option<i32>,
    #[serde(default)]
    pub frq: Option<i32>,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub external_captions: Vec<ExternalCaption>,
    #[serde(default)]
    pub captions: Vec<Caption>,
}

impl Word {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// True once the word holds the maximum number of external captions.
    pub fn external_captions_full(&self) -> bool {
        self.external_captions.len() >= MAX_EXTERNAL_CAPTIONS
    }

    /// Append an external caption unless the word is already at capacity.
    ///
    /// Returns `false` when the caption was dropped.
    pub fn push_external_caption(&mut self, caption: ExternalCaption) -> bool {
        if self.external_captions_full() {
            return false;
        }
        self.external_captions.push(caption);
        true
    }

    /// Move all inline captions into the external list, tagged with `source`.
    ///
    /// Captions beyond capacity are dropped. Returns how many were dropped.
    pub fn externalize_captions(&mut self, source: &CaptionSource) -> usize {
        let mut dropped = 0;
        for caption in std::mem::take(&mut self.captions) {
            if !self.push_external_caption(ExternalCaption::from_caption(caption, source)) {
                dropped += 1;
            }
        }
        dropped
    }
}

/// Named, ordered collection of words with an optional linked video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub name: String,
    #[serde(rename = "type", default)]
    pub vocabulary_type: VocabularyType,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    size: usize,
    #[serde(default)]
    pub relate_video_path: Option<PathBuf>,
    #[serde(default)]
    pub subtitles_track_id: Option<i32>,
    #[serde(default)]
    word_list: Vec<Word>,
}

impl Vocabulary {
    /// Create an empty vocabulary.
    pub fn new(name: impl Into<String>, vocabulary_type: VocabularyType, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vocabulary_type,
            language: language.into(),
            size: 0,
            relate_video_path: None,
            subtitles_track_id: None,
            word_list: Vec::new(),
        }
    }

    /// Link the vocabulary to the video and subtitle track its captions came from.
    pub fn with_video(mut self, path: impl Into<PathBuf>, track_id: i32) -> Self {
        self.relate_video_path = Some(path.into());
        self.subtitles_track_id = Some(track_id);
        self
    }

    /// Replace the word list.
    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.word_list = words;
        self.size = self.word_list.len();
        self
    }

    pub fn words(&self) -> &[Word] {
        &self.word_list
    }

    pub(crate) fn words_mut(&mut self) -> &mut [Word] {
        &mut self.word_list
    }

    /// Take ownership of the word list, leaving the vocabulary empty.
    pub fn take_words(&mut self) -> Vec<Word> {
        self.size = 0;
        std::mem::take(&mut self.word_list)
    }

    pub fn push_word(&mut self, word: Word) {
        self.word_list.push(word);
        self.size = self.word_list.len();
    }

    /// Stored word count. Always equal to `words().len()`.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.word_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_list.is_empty()
    }

    /// Provenance stamped onto captions taken out of this vocabulary.
    pub fn caption_source(&self) -> CaptionSource {
        CaptionSource {
            video_path: self.relate_video_path.clone(),
            track_id: self.subtitles_track_id,
            vocabulary_name: self.name.clone(),
        }
    }

    /// Repair fields read from disk: recount words and drop empty video links.
    pub(crate) fn normalized(mut self) -> Self {
        self.size = self.word_list.len();
        if self
            .relate_video_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            self.relate_video_path = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CaptionSource {
        CaptionSource {
            video_path: Some(PathBuf::from("a.mp4")),
            track_id: Some(0),
            vocabulary_name: "A".into(),
        }
    }

    #[test]
    fn externalize_moves_inline_captions_with_provenance() {
        let mut word = Word::new("run");
        word.captions = vec![
            Caption::new("00:00:01,000", "00:00:02,000", "I run"),
            Caption::new("00:00:03,000", "00:00:04,000", "They run"),
        ];

        let dropped = word.externalize_captions(&source());

        assert_eq!(dropped, 0);
        assert!(word.captions.is_empty());
        assert_eq!(word.external_captions.len(), 2);
        let first = &word.external_captions[0];
        assert_eq!(first.relate_video_path.as_deref(), Some(std::path::Path::new("a.mp4")));
        assert_eq!(first.subtitles_track_id, Some(0));
        assert_eq!(first.subtitles_name, "A");
        assert_eq!(first.content, "I run");
    }

    #[test]
    fn externalize_respects_caption_cap() {
        let mut word = Word::new("go");
        word.captions = (0..5)
            .map(|idx| Caption::new("s", "e", format!("line {idx}")))
            .collect();

        let dropped = word.externalize_captions(&source());

        assert_eq!(dropped, 2);
        assert_eq!(word.external_captions.len(), MAX_EXTERNAL_CAPTIONS);
        assert_eq!(word.external_captions[2].content, "line 2");
    }

    #[test]
    fn size_tracks_word_list() {
        let mut vocab = Vocabulary::new("v", VocabularyType::Document, "english");
        vocab.push_word(Word::new("a"));
        vocab.push_word(Word::new("b"));
        assert_eq!(vocab.size(), 2);
        let words = vocab.take_words();
        assert_eq!(words.len(), 2);
        assert_eq!(vocab.size(), vocab.len());
    }

    #[test]
    fn type_tag_uses_uppercase_names() {
        let json = serde_json::to_string(&VocabularyType::Subtitles).unwrap();
        assert_eq!(json, "\"SUBTITLES\"");
        let parsed: VocabularyType = serde_json::from_str("\"MKV\"").unwrap();
        assert_eq!(parsed, VocabularyType::Mkv);
        assert_eq!(VocabularyType::default().to_string(), "DOCUMENT");
    }
}
