pub mod processor;

pub use processor::{
    condition, downmix_to_mono, duration_ms, normalize_peak, resample_to_16k, write_wav,
    RawAudio, TARGET_SAMPLE_RATE,
};
