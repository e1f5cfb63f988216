//! Audio conditioning for the timing backends.
//!
//! Both backends expect mono 16 kHz float samples in [-1.0, 1.0]. Input
//! files arrive in arbitrary containers, channel counts and rates, so
//! decoding is an ordered list of strategies tried in sequence: native WAV,
//! general container decode, and finally the recognition backend's own
//! loader (ffmpeg). The decoded audio then goes through one shared
//! conditioning pass (downmix, resample, peak rescale).

use crate::error::{AppError, Result};
use rubato::{FftFixedInOut, Resampler};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Decoded audio before conditioning: interleaved samples at the source
/// rate and channel count.
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

struct DecodeStrategy {
    name: &'static str,
    decode: fn(&Path) -> Result<RawAudio>,
}

const DECODE_STRATEGIES: &[DecodeStrategy] = &[
    DecodeStrategy {
        name: "wav",
        decode: decode_wav,
    },
    DecodeStrategy {
        name: "container",
        decode: decode_container,
    },
    DecodeStrategy {
        name: "recognizer-loader",
        decode: crate::engine::whisper::load_audio,
    },
];

/// Load an audio file and convert it to mono 16 kHz normalized f32.
///
/// Strategies are tried in order; the run only fails when every strategy
/// has failed, and the error carries the last strategy's message.
pub fn condition(path: &Path) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(AppError::NotFound(path.to_path_buf()));
    }

    let mut last_error = String::from("no decode strategy available");
    for strategy in DECODE_STRATEGIES {
        let attempt = (strategy.decode)(path).and_then(|raw| {
            debug!(
                "Decoded {:?} via {} strategy: {}Hz, {} channels, {} samples",
                path,
                strategy.name,
                raw.sample_rate,
                raw.channels,
                raw.samples.len()
            );
            condition_raw(raw)
        });
        match attempt {
            Ok(samples) => return Ok(samples),
            Err(e) => {
                debug!("{} decode failed for {:?}: {}", strategy.name, path, e);
                last_error = e.to_string();
            }
        }
    }

    Err(AppError::audio_decode(path, last_error))
}

fn condition_raw(raw: RawAudio) -> Result<Vec<f32>> {
    let mono = downmix_to_mono(&raw.samples, raw.channels);
    let mut samples = resample_to_16k(&mono, raw.sample_rate)?;
    normalize_peak(&mut samples);
    Ok(samples)
}

/// Convert interleaved samples to mono by averaging all channels.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio to 16kHz
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Result<Vec<f32>> {
    if source_rate == TARGET_SAMPLE_RATE {
        return Ok(samples.to_vec());
    }

    info!(
        "Resampling from {}Hz to {}Hz",
        source_rate, TARGET_SAMPLE_RATE
    );

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        TARGET_SAMPLE_RATE as usize,
        1024,
        1,
    )
    .map_err(|e| AppError::Audio(format!("Failed to create resampler: {}", e)))?;

    let chunk_size = resampler.input_frames_next();
    let mut output = Vec::new();

    for chunk in samples.chunks(chunk_size) {
        let mut input_chunk = chunk.to_vec();

        // Pad last chunk if needed
        if input_chunk.len() < chunk_size {
            input_chunk.resize(chunk_size, 0.0);
        }

        let result = resampler
            .process(&[input_chunk], None)
            .map_err(|e| AppError::Audio(format!("Resampling failed: {}", e)))?;

        if !result.is_empty() {
            output.extend(&result[0]);
        }
    }

    // The zero-padded tail chunk produces samples past the true end of the
    // signal; keep exactly the length the rate ratio dictates.
    let expected =
        (samples.len() as u64 * TARGET_SAMPLE_RATE as u64 / source_rate as u64) as usize;
    output.truncate(expected);

    Ok(output)
}

/// Rescale so that the peak absolute amplitude is at most 1.0.
///
/// Audio already within range is left untouched.
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 1.0 {
        info!("Peak amplitude {:.3} exceeds 1.0, rescaling", peak);
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
}

fn decode_wav(path: &Path) -> Result<RawAudio> {
    let reader = hound::WavReader::open(path).map_err(|e| AppError::Audio(e.to_string()))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Audio(e.to_string()))?
        }
    };

    Ok(RawAudio {
        samples,
        channels: spec.channels as usize,
        sample_rate: spec.sample_rate,
    })
}

/// Decode any container/codec symphonia understands, preserving the
/// source rate and channel count.
fn decode_container(path: &Path) -> Result<RawAudio> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::Audio(format!("unrecognized container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AppError::Audio("no default audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::Audio(format!("unsupported codec: {}", e)))?;

    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AppError::Audio(format!("demux failed: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                sample_rate = spec.rate;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // A corrupt packet only drops itself, not the whole file.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(AppError::Audio(format!("decode failed: {}", e))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(AppError::Audio("no decodable audio data".to_string()));
    }

    Ok(RawAudio {
        samples,
        channels: channels.max(1),
        sample_rate,
    })
}

/// Write mono 16 kHz samples as a 16-bit PCM WAV file.
///
/// The subprocess backends consume files, not buffers, so the conditioned
/// waveform passes through a scratch WAV on its way to them.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| AppError::Audio(e.to_string()))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| AppError::Audio(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| AppError::Audio(e.to_string()))?;

    Ok(())
}

/// Calculate the duration in milliseconds
pub fn duration_ms(samples: &[f32], sample_rate: u32) -> i64 {
    ((samples.len() as f64 / sample_rate as f64) * 1000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        // Two stereo frames: (0.2, 0.4) and (-1.0, 0.0)
        let samples = vec![0.2, 0.4, -1.0, 0.0];
        let mono = downmix_to_mono(&samples, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples);
    }

    #[test]
    fn test_normalize_peak_rescales_loud_audio() {
        let mut samples = vec![0.5, -2.0, 1.0];
        normalize_peak(&mut samples);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((peak - 1.0).abs() < 1e-6);
        assert!((samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_peak_leaves_quiet_audio_alone() {
        let mut samples = vec![0.5, -0.25];
        normalize_peak(&mut samples);
        assert_eq!(samples, vec![0.5, -0.25]);
    }

    #[test]
    fn test_resample_passthrough_at_target_rate() {
        let samples = vec![0.1f32; 16000];
        let resampled = resample_to_16k(&samples, TARGET_SAMPLE_RATE).unwrap();
        assert_eq!(resampled, samples);
    }

    #[test]
    fn test_resample_produces_exact_length() {
        // 2 seconds at 44.1kHz must become exactly 2 seconds at 16kHz.
        let samples: Vec<f32> = (0..88200).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let resampled = resample_to_16k(&samples, 44100).unwrap();
        assert_eq!(resampled.len(), 32000);
    }

    #[test]
    fn test_condition_stereo_wav_end_to_end() {
        // Stereo 44.1kHz 2s WAV in, 32000 mono samples out, peak <= 1.0.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..88200 {
            let value = ((i as f32 * 0.02).sin() * 12000.0) as i16;
            writer.write_sample(value).unwrap();
            writer.write_sample(value / 2).unwrap();
        }
        writer.finalize().unwrap();

        let samples = condition(&path).unwrap();
        assert_eq!(samples.len(), 32000);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.0);
        assert!(peak <= 1.0 + 1e-6);
    }

    #[test]
    fn test_condition_missing_file() {
        let err = condition(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_condition_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not audio").unwrap();

        let err = condition(&path).unwrap_err();
        assert!(matches!(err, AppError::AudioDecode { .. }));
    }

    #[test]
    fn test_write_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples = vec![0.0, 0.5, -0.5, 1.0];

        write_wav(&path, &samples).unwrap();

        let raw = decode_wav(&path).unwrap();
        assert_eq!(raw.channels, 1);
        assert_eq!(raw.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(raw.samples.len(), samples.len());
        for (written, read) in samples.iter().zip(&raw.samples) {
            assert!((written - read).abs() < 1e-3);
        }
    }

    #[test]
    fn test_duration_ms() {
        let samples = vec![0.0f32; 16000];
        assert_eq!(duration_ms(&samples, 16000), 1000);
        assert_eq!(duration_ms(&samples, 8000), 2000);
    }
}
