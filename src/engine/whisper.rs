//! Recognition backend (Whisper).
//!
//! Whisper infers both the words and their boundaries from the audio
//! alone, so no transcript is required. The model runs behind its own
//! command line; one invocation yields the segment/word tree as JSON, and
//! the same tool renders the presentation formats (txt/vtt/srt/tsv) when
//! asked.

use crate::audio::RawAudio;
use crate::error::{AppError, Result};
use crate::export::PresentationFormat;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use super::{stderr_tail, BackendOutput, Device, TimingTree};

/// The segment/word tree for one recognized recording.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<RecognitionSegment>,
}

/// One recognized span of speech.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognitionSegment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    /// Absent for non-lexical segments (silence, noise markers).
    #[serde(default)]
    pub words: Option<Vec<RecognizedWord>>,
}

/// One word within a segment. `word` is the display text and usually
/// starts with a space when the token opens a new word.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognizedWord {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

/// Result of placing one delegated presentation format.
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    pub format: PresentationFormat,
    pub output: std::result::Result<PathBuf, String>,
}

/// Wrapper around the `whisper` command line.
pub struct WhisperBackend {
    binary: String,
    model: String,
    device: Device,
    language: Option<String>,
}

impl WhisperBackend {
    pub fn new(model: impl Into<String>, device: Device, language: Option<String>) -> Self {
        Self {
            binary: "whisper".to_string(),
            model: model.into(),
            device,
            language,
        }
    }

    /// Override the whisper executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Argument vector for one backend invocation.
    fn build_args(&self, audio: &Path, output_dir: &Path, output_format: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![audio.as_os_str().to_os_string()];
        args.push("--model".into());
        args.push(self.model.clone().into());
        args.push("--device".into());
        args.push(self.device.resolve().into());
        args.push("--word_timestamps".into());
        args.push("True".into());
        args.push("--output_format".into());
        args.push(output_format.into());
        args.push("--output_dir".into());
        args.push(output_dir.as_os_str().to_os_string());
        if let Some(language) = &self.language {
            args.push("--language".into());
            args.push(language.clone().into());
        }
        args
    }

    fn run(&self, args: Vec<OsString>) -> Result<()> {
        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            AppError::RecognitionBackend(format!("failed to run {}: {}", self.binary, e))
        })?;

        if !output.status.success() {
            return Err(AppError::RecognitionBackend(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        Ok(())
    }

    /// Transcribe `audio` with word-level timestamps.
    ///
    /// Backend failures are terminal for the run: the model is
    /// deterministic for identical input, so there is no retry.
    pub fn recognize(&self, audio: &Path) -> Result<BackendOutput> {
        let workdir = scratch_dir()?;
        let stem = file_stem(audio)?;

        info!(
            "Transcribing {:?} (model: {}, device: {})",
            audio,
            self.model,
            self.device.resolve()
        );

        self.run(self.build_args(audio, workdir.path(), "json"))?;

        let result_path = workdir.path().join(format!("{}.json", stem));
        let raw_json = fs::read_to_string(&result_path).map_err(|e| {
            AppError::RecognitionBackend(format!("recognition result was not produced: {}", e))
        })?;
        let result = parse_recognition_result(&raw_json)?;

        debug!("whisper produced {} segments", result.segments.len());

        Ok(BackendOutput {
            raw_json,
            tree: TimingTree::Words(result),
        })
    }

    /// Ask the backend to emit its own presentation formats into `out_dir`.
    ///
    /// One invocation renders every format; each requested format is then
    /// placed independently, so a format the backend failed to produce is
    /// reported in its outcome without blocking the others.
    pub fn export_formats(
        &self,
        audio: &Path,
        out_dir: &Path,
        formats: &[PresentationFormat],
    ) -> Result<Vec<FormatOutcome>> {
        if formats.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(out_dir)?;
        let workdir = scratch_dir()?;
        let stem = file_stem(audio)?;

        self.run(self.build_args(audio, workdir.path(), "all"))?;

        let mut outcomes = Vec::with_capacity(formats.len());
        for &format in formats {
            let name = format!("{}.{}", stem, format.extension());
            let produced = workdir.path().join(&name);
            let destination = out_dir.join(&name);

            let output = match fs::copy(&produced, &destination) {
                Ok(_) => {
                    info!("Saved {} transcript to {:?}", format.extension(), destination);
                    Ok(destination)
                }
                Err(e) => {
                    warn!("Failed to save {} format: {}", format.extension(), e);
                    Err(e.to_string())
                }
            };
            outcomes.push(FormatOutcome { format, output });
        }

        Ok(outcomes)
    }
}

/// Parse a JSON recognition result string.
pub fn parse_recognition_result(raw_json: &str) -> Result<RecognitionResult> {
    serde_json::from_str(raw_json)
        .map_err(|e| AppError::RecognitionBackend(format!("malformed recognition result: {}", e)))
}

/// Decode any input to mono 16 kHz f32 via ffmpeg.
///
/// This is the same loader the recognition backend applies to its own
/// input files; the audio conditioner uses it as the final decode
/// strategy when the in-process decoders cannot read a file.
pub fn load_audio(path: &Path) -> Result<RawAudio> {
    let output = Command::new("ffmpeg")
        .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args([
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "1",
            "-ar",
            "16000",
            "-",
        ])
        .output()
        .map_err(|e| AppError::Audio(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        return Err(AppError::Audio(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        )));
    }

    let samples: Vec<f32> = output
        .stdout
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect();

    if samples.is_empty() {
        return Err(AppError::Audio("ffmpeg produced no samples".to_string()));
    }

    Ok(RawAudio {
        samples,
        channels: 1,
        sample_rate: 16000,
    })
}

fn file_stem(audio: &Path) -> Result<&str> {
    audio
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| {
            AppError::RecognitionBackend(format!("audio path {:?} has no usable file stem", audio))
        })
}

fn scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir()
        .map_err(|e| AppError::RecognitionBackend(format!("failed to create scratch dir: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_order_and_passthrough() {
        let backend = WhisperBackend::new("medium", Device::Cpu, Some("en".to_string()));
        let args = backend.build_args(Path::new("book.wav"), Path::new("/tmp/out"), "json");

        let rendered: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "book.wav",
                "--model",
                "medium",
                "--device",
                "cpu",
                "--word_timestamps",
                "True",
                "--output_format",
                "json",
                "--output_dir",
                "/tmp/out",
                "--language",
                "en",
            ]
        );
    }

    #[test]
    fn test_build_args_without_language() {
        let backend = WhisperBackend::new("tiny", Device::Cpu, None);
        let args = backend.build_args(Path::new("a.wav"), Path::new("out"), "all");
        assert!(!args.iter().any(|a| a == "--language"));
    }

    #[test]
    fn test_parse_recognition_result() {
        let raw = r#"{
            "text": " The pigs built houses.",
            "language": "en",
            "segments": [
                {
                    "start": 0.0,
                    "end": 2.5,
                    "words": [
                        {"word": " The", "start": 0.5, "end": 0.64},
                        {"word": " pigs", "start": 0.64, "end": 1.02}
                    ]
                },
                {"start": 2.5, "end": 3.0}
            ]
        }"#;

        let result = parse_recognition_result(raw).unwrap();
        assert_eq!(result.language.as_deref(), Some("en"));
        assert_eq!(result.segments.len(), 2);

        let words = result.segments[0].words.as_ref().unwrap();
        assert_eq!(words[0].word, " The");
        assert_eq!(words[0].start, 0.5);
        assert!(result.segments[1].words.is_none());
    }

    #[test]
    fn test_parse_recognition_result_empty_tree() {
        let result = parse_recognition_result("{}").unwrap();
        assert!(result.segments.is_empty());
    }

    #[test]
    fn test_parse_recognition_result_rejects_invalid_json() {
        let err = parse_recognition_result("[not json").unwrap_err();
        assert!(matches!(err, AppError::RecognitionBackend(_)));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/a/b/story.wav")).unwrap(), "story");
        assert!(file_stem(Path::new("/")).is_err());
    }
}
