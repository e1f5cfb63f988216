//! Sequential run orchestration: condition, invoke, flatten.
//!
//! One run handles one audio/transcript pair and owns its waveform for
//! the duration; runs share no state, so callers may parallelize across
//! files as long as the external backends tolerate it.

use crate::audio;
use crate::engine::{
    AeneasBackend, BackendOutput, BoundaryAdjustment, Device, TimingBackend, WhisperBackend,
};
use crate::error::{AppError, Result};
use crate::export::TimingSchema;
use crate::timing::{self, WordTiming};
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a run needs, decided up front by the caller.
///
/// Device selection lives here rather than in ambient environment
/// inspection: `Device::Auto` is one explicit choice among the overrides.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub backend: TimingBackend,
    /// Recognition model size (tiny, base, small, medium, large, ...).
    pub model: String,
    pub device: Device,
    /// Language code forwarded verbatim; `None` lets the recognizer
    /// auto-detect (the aligner falls back to "eng").
    pub language: Option<String>,
    /// Boundary tuning forwarded verbatim to the aligner.
    pub boundary: Option<BoundaryAdjustment>,
    /// Also persist the backend-native JSON here.
    pub raw_output: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: TimingBackend::Recognition,
            model: "medium".to_string(),
            device: Device::Auto,
            language: None,
            boundary: None,
            raw_output: None,
        }
    }
}

/// Canonical result of one run.
#[derive(Debug, Clone)]
pub struct AlignedTranscript {
    pub words: Vec<WordTiming>,
    /// Which on-disk schema the sequence serializes to, decided by the
    /// backend that produced it.
    pub schema: TimingSchema,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline for one audio file.
    ///
    /// `transcript` is required by the forced-alignment backend and
    /// ignored by recognition.
    pub fn run(&self, audio_path: &Path, transcript: Option<&Path>) -> Result<AlignedTranscript> {
        info!(
            "Starting {} run for {:?}",
            self.config.backend.display_name(),
            audio_path
        );

        let samples = audio::condition(audio_path)?;
        let duration_s = samples.len() as f64 / audio::TARGET_SAMPLE_RATE as f64;
        info!(
            "Conditioned audio: {} samples ({:.2}s at {}Hz mono)",
            samples.len(),
            duration_s,
            audio::TARGET_SAMPLE_RATE
        );

        // Both backends consume files, so the conditioned waveform goes
        // through a scratch WAV that lives only for the backend call.
        let workdir = tempfile::tempdir()?;
        let conditioned = workdir.path().join("conditioned.wav");
        audio::write_wav(&conditioned, &samples)?;
        drop(samples);

        let output = self.invoke_backend(&conditioned, transcript)?;

        if let Some(raw_path) = &self.config.raw_output {
            std::fs::write(raw_path, &output.raw_json).map_err(|source| {
                AppError::OutputWrite {
                    path: raw_path.clone(),
                    source,
                }
            })?;
            info!("Raw backend output saved to {:?}", raw_path);
        }

        let schema = output.tree.schema();
        let words = timing::flatten(&output.tree);

        info!("Aligned {} words over {:.2}s of audio", words.len(), duration_s);
        if let Some(last) = words.last() {
            if last.end > 0.0 {
                info!(
                    "Average words per second: {:.2}",
                    words.len() as f64 / last.end
                );
            }
        }

        Ok(AlignedTranscript { words, schema })
    }

    fn invoke_backend(&self, audio: &Path, transcript: Option<&Path>) -> Result<BackendOutput> {
        match self.config.backend {
            TimingBackend::ForcedAlignment => {
                let transcript = transcript.ok_or_else(|| {
                    AppError::AlignmentBackend(
                        "forced alignment requires a transcript".to_string(),
                    )
                })?;
                if !transcript.exists() {
                    return Err(AppError::NotFound(transcript.to_path_buf()));
                }

                let language = self.config.language.as_deref().unwrap_or("eng");
                AeneasBackend::new(language, self.config.boundary.clone())
                    .align(audio, transcript)
            }
            TimingBackend::Recognition => self.recognizer().recognize(audio),
        }
    }

    /// The configured recognition backend, also used for delegated
    /// presentation-format export.
    pub fn recognizer(&self) -> WhisperBackend {
        WhisperBackend::new(
            self.config.model.as_str(),
            self.config.device,
            self.config.language.clone(),
        )
    }
}
