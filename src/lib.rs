pub mod audio;
pub mod engine;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod timing;

pub use engine::{BoundaryAdjustment, Device, TimingBackend, TimingTree};
pub use error::{AppError, Result};
pub use export::{PresentationFormat, TimingSchema};
pub use pipeline::{AlignedTranscript, Pipeline, PipelineConfig};
pub use timing::WordTiming;
