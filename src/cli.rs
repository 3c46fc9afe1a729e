use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::{
    correlation::{MarkerConfig, MatchMode},
    host::{adb, injector_from_settings, KeyPressPlan, TimestampHost},
    models::{CaptureRecord, LagReport},
    recognition::{CommandRecognizer, TextRecognizer, TranscriptRecognizer},
    session::{replay, AnalysisSession, LogSink, ResultSink, SessionConfig, WriterSink},
    settings::SettingsStore,
    video::{ImageSequenceSource, VideoSource},
};

#[derive(Debug, Parser)]
#[command(name = "keylag", version, about = "Measure keypress-to-display lag from a screen recording")]
pub struct Cli {
    /// Settings file (JSON). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "keylag.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve keypress timestamps to one analyzer
    Host(HostArgs),
    /// Signal a capture, then analyze its extracted frames
    Measure(MeasureArgs),
    /// Re-run the correlation on a saved capture
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct HostArgs {
    /// Listen address, e.g. 127.0.0.1:5555
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long)]
    pub key: Option<char>,
    #[arg(long)]
    pub presses: Option<usize>,
    /// Launch the capture app and reverse-forward the port with adb
    #[arg(long)]
    pub adb: bool,
}

#[derive(Debug, Args, Default)]
pub struct MarkerArgs {
    /// Character the typed marker is made of
    #[arg(long)]
    pub unit: Option<char>,
    #[arg(long, value_enum)]
    pub match_mode: Option<MatchMode>,
}

impl MarkerArgs {
    fn apply(&self, mut marker: MarkerConfig) -> MarkerConfig {
        if let Some(unit) = self.unit {
            marker.unit = unit;
        }
        if let Some(mode) = self.match_mode {
            marker.match_mode = mode;
        }
        marker
    }
}

#[derive(Debug, Args)]
pub struct MeasureArgs {
    /// Host timestamp server, `host:port`
    #[arg(long)]
    pub host: Option<String>,
    /// Directory of frames extracted from the recording
    #[arg(long)]
    pub frames: PathBuf,
    #[arg(long)]
    pub fps: u32,
    /// Wall-clock start of the recording, epoch milliseconds
    #[arg(long)]
    pub recording_start: i64,
    /// Use recorded frame texts instead of running OCR
    #[arg(long)]
    pub transcript: Option<PathBuf>,
    #[command(flatten)]
    pub marker: MarkerArgs,
    #[arg(long)]
    pub report: Option<PathBuf>,
    #[arg(long)]
    pub save_capture: Option<PathBuf>,
    /// Analyze immediately instead of waiting for Enter
    #[arg(long)]
    pub no_wait: bool,
    /// Send lag lines to the log instead of stdout
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    pub capture: PathBuf,
    #[command(flatten)]
    pub marker: MarkerArgs,
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Send lag lines to the log instead of stdout
    #[arg(long)]
    pub quiet: bool,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = SettingsStore::new(cli.config.clone())?;

    match cli.command {
        Command::Host(args) => run_host(&settings, args).await,
        Command::Measure(args) => run_measure(&settings, args).await,
        Command::Replay(args) => run_replay(&settings, args),
    }
}

async fn run_host(settings: &SettingsStore, args: HostArgs) -> Result<()> {
    let mut host_settings = settings.host();
    if let Some(bind) = args.bind {
        host_settings.bind_addr = bind;
    }
    if let Some(key) = args.key {
        host_settings.key = key;
    }
    if let Some(presses) = args.presses {
        host_settings.key_press_count = presses;
    }
    host_settings.adb.enabled |= args.adb;

    let injector = injector_from_settings(&host_settings);
    let host = TimestampHost::bind(
        &host_settings.bind_addr,
        KeyPressPlan::from(&host_settings),
        injector,
    )
    .await?;
    let local = host.local_addr()?;
    log::info!("Host listening on {}", local);
    println!("listening on {local}");

    if host_settings.adb.enabled {
        adb::prepare_device(&host_settings.adb, local.port()).await;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let timestamps = host.serve(cancel).await?;
    log::info!("Host finished with {} timestamps", timestamps.len());
    Ok(())
}

async fn run_measure(settings: &SettingsStore, args: MeasureArgs) -> Result<()> {
    let analyzer = settings.analyzer();
    let host_addr = args
        .host
        .or_else(|| analyzer.host_addr.clone())
        .context("no host address given; pass --host or set analyzer.hostAddr")?;

    let mut config = SessionConfig::from(&analyzer);
    config.marker = args.marker.apply(config.marker);

    let recognizer: Arc<dyn TextRecognizer> = match &args.transcript {
        Some(path) => Arc::new(TranscriptRecognizer::load(path)?),
        None => Arc::new(CommandRecognizer::new(
            analyzer.recognizer_program.clone(),
            analyzer.recognizer_args.clone(),
        )),
    };

    let mut session = AnalysisSession::open(host_addr, config);
    session.signal_capture_start();
    log::info!("Measuring in session {}", session.id());

    if !args.no_wait {
        println!("Capture started. Press Enter once the frames are in {}", args.frames.display());
        wait_for_enter().await?;
    }

    let video: Arc<dyn VideoSource> = Arc::new(ImageSequenceSource::open(
        &args.frames,
        args.recording_start,
        args.fps,
    )?);

    let mut sink = result_sink(args.quiet);
    let outcome = session.analyze(video, recognizer, sink.as_mut()).await?;

    finish(&outcome.report, args.report.as_ref())?;
    if let Some(path) = &args.save_capture {
        outcome.capture.save(path)?;
        log::info!("Capture saved to {}", path.display());
    }
    Ok(())
}

fn run_replay(settings: &SettingsStore, args: ReplayArgs) -> Result<()> {
    let capture = CaptureRecord::load(&args.capture)?;
    let marker = args.marker.apply(settings.analyzer().marker);

    let mut sink = result_sink(args.quiet);
    let report = replay(&capture, &marker, sink.as_mut())?;
    finish(&report, args.report.as_ref())
}

fn result_sink(quiet: bool) -> Box<dyn ResultSink> {
    if quiet {
        Box::new(LogSink)
    } else {
        Box::new(WriterSink::new(io::stdout()))
    }
}

fn finish(report: &LagReport, path: Option<&PathBuf>) -> Result<()> {
    if let Some(summary) = &report.summary {
        println!(
            "min {}ms, max {}ms, mean {:.1}ms over {} keystrokes",
            summary.min_ms,
            summary.max_ms,
            summary.mean_ms,
            report.lags.len()
        );
    }
    if let Some(path) = path {
        report.save(path)?;
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}

async fn wait_for_enter() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| ())
    })
    .await
    .context("stdin reader failed")?
    .context("failed to read stdin")
}
