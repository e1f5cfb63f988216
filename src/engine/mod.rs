//! Timing backends.
//!
//! Two interchangeable external collaborators produce word timings:
//! forced alignment against a known transcript (aeneas) and transcript-free
//! recognition (Whisper). Their call shapes and output trees are
//! incompatible, so each keeps its own entry point and the outputs stay a
//! tagged variant until the normalizer flattens them.

pub mod aeneas;
pub mod whisper;

use crate::export::TimingSchema;
use serde::{Deserialize, Serialize};
use std::process::Command;

pub use aeneas::{AeneasBackend, BoundaryAdjustment, SyncFragment, SyncMap};
pub use whisper::{
    FormatOutcome, RecognitionResult, RecognitionSegment, RecognizedWord, WhisperBackend,
};

/// Which backend produces the timing tree for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimingBackend {
    /// Transcript-free recognition (Whisper)
    #[default]
    Recognition,
    /// Alignment of a known transcript (aeneas)
    ForcedAlignment,
}

impl TimingBackend {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            TimingBackend::Recognition => "recognition",
            TimingBackend::ForcedAlignment => "forced alignment",
        }
    }
}

/// Backend-native timing output.
///
/// The two shapes are structurally irreconcilable; consumers match on the
/// tag instead of the backends forcing them into one lossy type.
#[derive(Debug, Clone)]
pub enum TimingTree {
    /// Fragment tree from forced alignment.
    Fragments(SyncMap),
    /// Segment/word tree from recognition.
    Words(RecognitionResult),
}

impl TimingTree {
    /// The canonical on-disk schema this tree's words serialize to.
    pub fn schema(&self) -> TimingSchema {
        match self {
            TimingTree::Fragments(_) => TimingSchema::Alignment,
            TimingTree::Words(_) => TimingSchema::Recognition,
        }
    }
}

/// Raw and parsed output of one backend invocation.
#[derive(Debug, Clone)]
pub struct BackendOutput {
    /// Backend-native JSON exactly as the backend produced it.
    pub raw_json: String,
    pub tree: TimingTree,
}

/// Compute device for the recognition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Probe for a GPU, fall back to CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    /// Resolve to the device name the backend CLI understands.
    pub fn resolve(self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Auto => {
                if cuda_available() {
                    "cuda"
                } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
                    "mps"
                } else {
                    "cpu"
                }
            }
        }
    }
}

fn cuda_available() -> bool {
    Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Last part of a subprocess stderr stream, for error messages.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    const LIMIT: usize = 400;
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let start = text
        .char_indices()
        .nth_back(LIMIT - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    format!("...{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_schema_follows_source() {
        let fragments = TimingTree::Fragments(SyncMap::default());
        assert_eq!(fragments.schema(), TimingSchema::Alignment);

        let words = TimingTree::Words(RecognitionResult::default());
        assert_eq!(words.schema(), TimingSchema::Recognition);
    }

    #[test]
    fn test_explicit_devices_resolve_verbatim() {
        assert_eq!(Device::Cpu.resolve(), "cpu");
        assert_eq!(Device::Cuda.resolve(), "cuda");
        assert_eq!(Device::Mps.resolve(), "mps");
    }

    #[test]
    fn test_stderr_tail_truncates_long_output() {
        let long = "x".repeat(1000);
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), 403);
        assert!(tail.starts_with("..."));

        assert_eq!(stderr_tail(b"  short  "), "short");
    }
}
