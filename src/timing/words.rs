//! Canonicalization of recognition segment/word trees.

use super::WordTiming;
use crate::engine::whisper::RecognitionResult;

/// Flatten every segment's words into the canonical sequence, in segment
/// then word order.
///
/// Text is taken verbatim — NOT trimmed. The recognizer prefixes a space
/// to tokens that open a new word, and downstream consumers rely on that
/// boundary information. A segment without a `words` list is non-lexical
/// (silence, noise) and contributes nothing; that is not an error.
pub fn flatten_words(result: &RecognitionResult) -> Vec<WordTiming> {
    let mut timings = Vec::new();

    for segment in &result.segments {
        let Some(words) = &segment.words else {
            continue;
        };
        for word in words {
            timings.push(WordTiming {
                text: word.word.clone(),
                start: word.start,
                end: word.end,
            });
        }
    }

    timings
}
