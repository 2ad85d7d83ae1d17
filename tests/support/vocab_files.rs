use std::path::{Path, PathBuf};

use vocabmerge::vocabulary::{Caption, Vocabulary, VocabularyType, Word, store};

/// Word carrying `count` inline captions.
pub fn captioned_word(value: &str, count: usize) -> Word {
    let mut word = Word::new(value);
    word.captions = (0..count)
        .map(|idx| {
            Caption::new(
                format!("00:00:0{idx},000"),
                format!("00:00:0{idx},900"),
                format!("{value} line {idx}"),
            )
        })
        .collect();
    word
}

/// Write a subtitle vocabulary linked to `video`/`track` and return its path.
pub fn write_subtitle_vocab(dir: &Path, name: &str, video: &str, track: i32, words: Vec<Word>) -> PathBuf {
    let vocab = Vocabulary::new(name, VocabularyType::Subtitles, "english")
        .with_video(video, track)
        .with_words(words);
    write(dir, name, &vocab)
}

/// Write a document vocabulary of plain words and return its path.
pub fn write_document_vocab(dir: &Path, name: &str, values: &[String]) -> PathBuf {
    let vocab = Vocabulary::new(name, VocabularyType::Document, "english")
        .with_words(values.iter().map(|value| Word::new(value.as_str())).collect());
    write(dir, name, &vocab)
}

fn write(dir: &Path, name: &str, vocab: &Vocabulary) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    store::save(vocab, &path).expect("write vocabulary");
    path
}
