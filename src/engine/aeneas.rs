//! Forced-alignment backend (aeneas).
//!
//! aeneas maps an audio file plus a plain-text transcript (one lexical
//! unit per line) to a tree of timed fragments. It is an external Python
//! tool, driven here through its `execute_task` command line; the JSON
//! sync map it writes is parsed into [`SyncMap`].

use crate::error::{AppError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::{stderr_tail, BackendOutput, TimingTree};

/// Fragment id aeneas assigns to the non-speech lead-in region.
pub const HEAD_ID: &str = "HEAD";
/// Fragment id aeneas assigns to the non-speech lead-out region.
pub const TAIL_ID: &str = "TAIL";

/// Boundary-adjustment policy, forwarded verbatim to the aligner.
///
/// `algorithm` and `percent_value` trade boundary tightness for recall;
/// they are opaque tuning knobs of the backend and are not reinterpreted
/// here.
#[derive(Debug, Clone)]
pub struct BoundaryAdjustment {
    /// e.g. "rate" or "percent"
    pub algorithm: String,
    /// 0-100
    pub percent_value: u32,
}

/// One timed unit of the sync map.
///
/// `begin`/`end` stay raw JSON values: aeneas emits them as strings,
/// other sync-map producers emit numbers, and a malformed value must drop
/// only this fragment rather than fail the whole tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncFragment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub begin: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
}

impl SyncFragment {
    /// HEAD/TAIL fragments bound the speech region and carry no words.
    pub fn is_sentinel(&self) -> bool {
        self.id == HEAD_ID || self.id == TAIL_ID
    }
}

/// The fragment tree aeneas produces for one task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncMap {
    #[serde(default)]
    pub fragments: Vec<SyncFragment>,
}

/// Wrapper around the `aeneas.tools.execute_task` command line.
pub struct AeneasBackend {
    python: String,
    language: String,
    boundary: Option<BoundaryAdjustment>,
}

impl AeneasBackend {
    pub fn new(language: impl Into<String>, boundary: Option<BoundaryAdjustment>) -> Self {
        Self {
            python: "python3".to_string(),
            language: language.into(),
            boundary,
        }
    }

    /// Override the Python interpreter used to run aeneas.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Build the task configuration string the backend expects.
    fn config_string(&self) -> String {
        let mut config = format!(
            "task_language={}|is_text_type=plain|os_task_file_format=json",
            self.language
        );
        if let Some(boundary) = &self.boundary {
            config.push_str(&format!(
                "|task_adjust_boundary_algorithm={}|task_adjust_boundary_percent_value={}",
                boundary.algorithm, boundary.percent_value
            ));
        }
        config
    }

    /// Align `transcript` against `audio` and return the fragment tree.
    ///
    /// Backend failures are terminal for the run: the tool is
    /// deterministic for identical input, so there is no retry.
    pub fn align(&self, audio: &Path, transcript: &Path) -> Result<BackendOutput> {
        let workdir = fs_scratch_dir()?;
        let sync_map_path = workdir.path().join("sync_map.json");
        let config = self.config_string();

        info!("Aligning transcript to audio (config: {})", config);

        let output = Command::new(&self.python)
            .args(["-m", "aeneas.tools.execute_task"])
            .arg(audio)
            .arg(transcript)
            .arg(&config)
            .arg(&sync_map_path)
            .output()
            .map_err(|e| {
                AppError::AlignmentBackend(format!("failed to run {}: {}", self.python, e))
            })?;

        if !output.status.success() {
            return Err(AppError::AlignmentBackend(format!(
                "execute_task exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let raw_json = fs::read_to_string(&sync_map_path).map_err(|e| {
            AppError::AlignmentBackend(format!("sync map was not produced: {}", e))
        })?;
        let map = parse_sync_map(&raw_json)?;

        debug!("aeneas produced {} fragments", map.fragments.len());

        Ok(BackendOutput {
            raw_json,
            tree: TimingTree::Fragments(map),
        })
    }
}

/// Parse a JSON sync map string.
pub fn parse_sync_map(raw_json: &str) -> Result<SyncMap> {
    serde_json::from_str(raw_json)
        .map_err(|e| AppError::AlignmentBackend(format!("malformed sync map: {}", e)))
}

fn fs_scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir()
        .map_err(|e| AppError::AlignmentBackend(format!("failed to create scratch dir: {}", e)))
}
