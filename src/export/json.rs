//! Canonical word-timing serialization.
//!
//! Two fixed-key record shapes exist on disk, and which one applies is a
//! property of the source backend, not a caller choice: read-along
//! consumers distinguish recognition output (whose text keeps its
//! leading-space word boundaries) from alignment output by these keys.
//! Both are UTF-8 JSON with stable 2-space indentation and non-ASCII
//! characters left unescaped.

use crate::error::{AppError, Result};
use crate::timing::WordTiming;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// On-disk key set for the canonical sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingSchema {
    /// `{"text": ..., "timestamp": [start, end]}` — recognition-sourced.
    Recognition,
    /// `{"word": ..., "time": [start, end]}` — alignment-sourced.
    Alignment,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecognitionRecord {
    text: String,
    timestamp: [f64; 2],
}

#[derive(Debug, Serialize, Deserialize)]
struct AlignmentRecord {
    word: String,
    time: [f64; 2],
}

/// Serialize the sequence in the given schema.
pub fn render_words(words: &[WordTiming], schema: TimingSchema) -> Result<String> {
    let rendered = match schema {
        TimingSchema::Recognition => {
            let records: Vec<RecognitionRecord> = words
                .iter()
                .map(|w| RecognitionRecord {
                    text: w.text.clone(),
                    timestamp: [w.start, w.end],
                })
                .collect();
            serde_json::to_string_pretty(&records)?
        }
        TimingSchema::Alignment => {
            let records: Vec<AlignmentRecord> = words
                .iter()
                .map(|w| AlignmentRecord {
                    word: w.text.clone(),
                    time: [w.start, w.end],
                })
                .collect();
            serde_json::to_string_pretty(&records)?
        }
    };

    Ok(rendered + "\n")
}

/// Parse a canonical sequence back into word timings.
pub fn parse_words(data: &str, schema: TimingSchema) -> Result<Vec<WordTiming>> {
    let words = match schema {
        TimingSchema::Recognition => serde_json::from_str::<Vec<RecognitionRecord>>(data)?
            .into_iter()
            .map(|r| WordTiming {
                text: r.text,
                start: r.timestamp[0],
                end: r.timestamp[1],
            })
            .collect(),
        TimingSchema::Alignment => serde_json::from_str::<Vec<AlignmentRecord>>(data)?
            .into_iter()
            .map(|r| WordTiming {
                text: r.word,
                start: r.time[0],
                end: r.time[1],
            })
            .collect(),
    };

    Ok(words)
}

/// Write the whole sequence to `destination`, all-or-nothing.
///
/// The content goes to a temporary file in the destination's directory
/// first and is renamed into place, so a failed run never leaves a
/// partial file behind.
pub fn write_words(words: &[WordTiming], schema: TimingSchema, destination: &Path) -> Result<()> {
    let rendered = render_words(words, schema)?;

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(parent)
        .map_err(|source| write_error(destination, source))?;
    file.write_all(rendered.as_bytes())
        .map_err(|source| write_error(destination, source))?;
    file.persist(destination)
        .map_err(|e| write_error(destination, e.error))?;

    info!("Wrote {} word timings to {:?}", words.len(), destination);
    Ok(())
}

fn write_error(destination: &Path, source: std::io::Error) -> AppError {
    AppError::OutputWrite {
        path: destination.to_path_buf(),
        source,
    }
}
