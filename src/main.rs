use clap::{Parser, ValueEnum};
use readalign::engine::{BoundaryAdjustment, Device, TimingBackend};
use readalign::export::{self, PresentationFormat};
use readalign::pipeline::{Pipeline, PipelineConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Align spoken-word audio with its transcript and emit per-word timings
/// for read-along playback.
#[derive(Parser, Debug)]
#[command(name = "readalign", version, about, long_about = None)]
struct Args {
    /// Input audio file
    audio: PathBuf,

    /// Plain-text transcript, one word per line; selects forced alignment
    /// instead of transcript-free recognition
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Where to write the canonical word timings (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recognition model size
    #[arg(long, default_value = "medium")]
    model: String,

    /// Compute device for the recognition backend
    #[arg(long, value_enum, default_value_t = DeviceArg::Auto)]
    device: DeviceArg,

    /// Language code, forwarded verbatim (e.g. "en" for recognition,
    /// "eng" for forced alignment)
    #[arg(long)]
    language: Option<String>,

    /// Boundary-adjustment algorithm forwarded to the aligner (e.g. "rate")
    #[arg(long)]
    boundary_algorithm: Option<String>,

    /// Boundary-adjustment percent value (0-100)
    #[arg(long, default_value_t = 30)]
    boundary_percent: u32,

    /// Also save the backend-native JSON here
    #[arg(long)]
    raw_output: Option<PathBuf>,

    /// Presentation formats to render via the recognition backend
    #[arg(long, value_enum, value_delimiter = ',')]
    export_formats: Vec<FormatArg>,

    /// Directory for presentation formats
    #[arg(long, default_value = "./output")]
    export_dir: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum DeviceArg {
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Device::Auto,
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Mps => Device::Mps,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Json,
    Txt,
    Vtt,
    Srt,
    Tsv,
}

impl From<FormatArg> for PresentationFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => PresentationFormat::Json,
            FormatArg::Txt => PresentationFormat::Txt,
            FormatArg::Vtt => PresentationFormat::Vtt,
            FormatArg::Srt => PresentationFormat::Srt,
            FormatArg::Tsv => PresentationFormat::Tsv,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("readalign=info".parse().expect("valid directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> readalign::Result<()> {
    let backend = if args.transcript.is_some() {
        TimingBackend::ForcedAlignment
    } else {
        TimingBackend::Recognition
    };

    let boundary = args.boundary_algorithm.clone().map(|algorithm| {
        BoundaryAdjustment {
            algorithm,
            percent_value: args.boundary_percent,
        }
    });

    let config = PipelineConfig {
        backend,
        model: args.model.clone(),
        device: args.device.into(),
        language: args.language.clone(),
        boundary,
        raw_output: args.raw_output.clone(),
    };

    let pipeline = Pipeline::new(config);
    let result = pipeline.run(&args.audio, args.transcript.as_deref())?;

    match &args.output {
        Some(path) => export::write_words(&result.words, result.schema, path)?,
        None => print!("{}", export::render_words(&result.words, result.schema)?),
    }

    if !args.export_formats.is_empty() {
        let formats: Vec<PresentationFormat> =
            args.export_formats.iter().map(|&f| f.into()).collect();
        let outcomes =
            pipeline
                .recognizer()
                .export_formats(&args.audio, &args.export_dir, &formats)?;

        let failed = outcomes.iter().filter(|o| o.output.is_err()).count();
        if failed > 0 {
            info!(
                "{}/{} presentation formats written to {:?}",
                outcomes.len() - failed,
                outcomes.len(),
                args.export_dir
            );
        }
    }

    Ok(())
}
