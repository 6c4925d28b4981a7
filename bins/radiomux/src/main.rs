//! `radiomux`: a multi-channel scanner that sweeps a configured set of
//! frequencies, demodulates whatever is active, and reports channel events
//! to a logger.
//!
//! Grounded on `main`/`CLParser` (`original_source/apps/scanner.py`,
//! `original_source/apps/h2m_parser.py`) for the overall process shape
//! (parse args, build the scanner, run cycles until interrupted), and on the
//! teacher's `main.rs` for the `ctrlc`-driven graceful shutdown and
//! `tracing-subscriber` setup idiom.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Mutex;

use radiomux_backends::{NullReceiver, SoapyConfig, SoapySdrReceiver};
use radiomux_core::logger::{ChannelLogParams, ChannelLogger, LogKind};
use radiomux_core::pipeline::ActivityPipeline;
use radiomux_core::provider::{CenterFrequencyProvider, FrequencyGroup, RangeStep, SingleStep};
use radiomux_core::receiver::Receiver;
use radiomux_core::registry::FrequencyRegistry;
use radiomux_core::scheduler::{ScanConfig, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "radiomux", about = "Multi-channel SDR scanner")]
struct Cli {
    /// Frequency configuration file (YAML).
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of parallel demodulators.
    #[arg(short = 'n', long, default_value_t = 4)]
    demod: usize,

    /// Asking sample rate, in Hz.
    #[arg(short = 'r', long, default_value_t = 4_000_000)]
    rate: i64,

    /// Channel detection threshold, in dB.
    #[arg(short = 't', long, default_value_t = 10.0)]
    threshold: f64,

    /// Channel spacing, in Hz.
    #[arg(short = 'B', long = "channel-spacing", default_value_t = 5_000)]
    channel_spacing: i64,

    /// Seconds the center frequency dwells on a step with no interesting activity.
    #[arg(long = "quiet-timeout", default_value_t = 10)]
    quiet_timeout: u64,

    /// Seconds the center frequency dwells after interesting activity.
    #[arg(long = "active-timeout", default_value_t = 16)]
    active_timeout: u64,

    /// Seconds a channel may go quiet before its demodulator is released.
    #[arg(long = "hang-time", default_value_t = 1)]
    hang_time: u64,

    /// Maximum seconds a demodulator may stay assigned to one channel, or 0 for no limit.
    #[arg(long = "max-recording", default_value_t = 0)]
    max_recording: u64,

    /// Channel logger type: `debug`, `fixed-field`, `json-http`, or omit for none.
    #[arg(short = 'T', long = "log-type")]
    log_type: Option<String>,

    /// Logger target: file path for `fixed-field`, URL for `json-http`.
    #[arg(short = 'L', long = "log-target")]
    log_target: Option<String>,

    /// HTTP timeout, in seconds, for the `json-http` logger.
    #[arg(short = 'A', long = "log-active-timeout", default_value_t = 5)]
    log_active_timeout: u64,

    /// Automatically promote frequently-active frequencies to priority.
    #[arg(short = 'P', long = "auto-priority")]
    auto_priority: bool,

    /// Ignore all lockout entries.
    #[arg(long = "disable-lockout")]
    disable_lockout: bool,

    /// Ignore all priority entries.
    #[arg(long = "disable-priority")]
    disable_priority: bool,

    /// Receiver backend to use.
    #[arg(long, value_enum, default_value_t = Backend::Null)]
    backend: Backend,

    /// SoapySDR device argument string (e.g. "driver=rtlsdr"), for `--backend soapy`.
    #[arg(long = "hw-args", default_value = "")]
    hw_args: String,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Backend {
    Null,
    Soapy,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("radiomux={level},radiomux_core={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn exit_code_for_config_error() -> ExitCode {
    ExitCode::from(2)
}

fn exit_code_for_hardware_error() -> ExitCode {
    ExitCode::from(1)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let raw_entries = match &cli.config {
        Some(path) => match radiomux_config::load_frequency_file(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "failed to load frequency configuration");
                return exit_code_for_config_error();
            }
        },
        None => Vec::new(),
    };

    let mut registry = FrequencyRegistry::new(cli.channel_spacing, cli.disable_lockout, cli.disable_priority);
    if let Err(e) = registry.load(raw_entries) {
        tracing::error!(error = %e, "invalid frequency configuration");
        return exit_code_for_config_error();
    }

    let (singles, ranges) = group_entries(&registry);
    let registry = Arc::new(Mutex::new(registry));

    let receiver: Arc<dyn Receiver> = match cli.backend {
        Backend::Null => Arc::new(NullReceiver::silent(cli.rate, 256)),
        Backend::Soapy => {
            let config = SoapyConfig {
                dev_args: cli.hw_args.clone(),
                sample_rate_hz: cli.rate as f64,
                initial_center_freq_hz: singles.first().map(|s| s.freq_hz as f64).unwrap_or(146_000_000.0),
                gain_db: None,
                antenna: None,
                fft_size: 256,
            };
            match SoapySdrReceiver::open(config) {
                Ok(r) => Arc::new(r),
                Err(e) => {
                    tracing::error!(error = %e, "failed to open SoapySDR device");
                    return exit_code_for_hardware_error();
                }
            }
        }
    };

    let sample_rate_hz = receiver.sample_rate_hz();
    let group = FrequencyGroup {
        singles,
        ranges,
        sample_rate_hz,
        quiet_timeout: Duration::from_secs(cli.quiet_timeout),
        active_timeout: Duration::from_secs(cli.active_timeout),
    };

    let registry_for_notify = Arc::clone(&registry);
    let receiver_for_notify = Arc::clone(&receiver);
    let notify = Arc::new(move |center_freq_hz: i64| {
        let registry = Arc::clone(&registry_for_notify);
        let receiver = Arc::clone(&receiver_for_notify);
        tokio::spawn(async move {
            registry.lock().await.set_center(center_freq_hz);
            if let Err(e) = receiver.retune(center_freq_hz).await {
                tracing::error!(error = %e, "failed to retune receiver");
            }
        });
    });

    let provider = Arc::new(CenterFrequencyProvider::new(group, notify));
    {
        let mut guard = registry.lock().await;
        guard.set_center(provider.center_freq().await);
    }
    if let Err(e) = receiver.retune(provider.center_freq().await).await {
        tracing::error!(error = %e, "failed to set initial center frequency");
        return exit_code_for_hardware_error();
    }
    Arc::clone(&provider).start().await;

    let logger = Arc::new(ChannelLogger::new(&ChannelLogParams {
        kind: cli.log_type.as_deref().map(LogKind::from_str_flag).unwrap_or(LogKind::NoOp),
        target: cli.log_target.clone(),
        active_timeout: cli.log_active_timeout,
    }));
    // No backend here produces an actual recording file, so "interesting"
    // activity is defined by a channel simply going active rather than by a
    // finished recording (see `ActivityPipeline::interesting`).
    let pipeline = Arc::new(ActivityPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&provider),
        Arc::clone(&logger),
        false,
        cli.auto_priority,
    ));

    let scan_config = ScanConfig {
        threshold_db: cli.threshold,
        channel_spacing: cli.channel_spacing,
        hang_time: Duration::from_secs(cli.hang_time),
        max_recording: (cli.max_recording > 0).then(|| Duration::from_secs(cli.max_recording)),
    };
    let mut scheduler = Scheduler::new(receiver, registry, pipeline, cli.demod, scan_config);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %e, "failed to install signal handler");
    }

    let mut tick = tokio::time::interval(Duration::from_millis(200));
    while !shutdown.load(Ordering::SeqCst) {
        tick.tick().await;
        if let Err(e) = scheduler.scan_cycle().await {
            tracing::error!(error = %e, "scan cycle failed");
            return exit_code_for_hardware_error();
        }
    }

    tracing::info!("shutting down");
    ExitCode::from(130)
}

fn group_entries(registry: &FrequencyRegistry) -> (Vec<SingleStep>, Vec<RangeStep>) {
    let mut singles = Vec::new();
    let mut ranges = Vec::new();
    for entry in registry.entries() {
        if let Some(single) = entry.single {
            singles.push(SingleStep { freq_hz: (single * 1_000_000.0) as i64 });
        } else if let (Some(lo), Some(hi)) = (entry.lo, entry.hi) {
            ranges.push(RangeStep { lower_hz: (lo * 1_000_000.0) as i64, upper_hz: (hi * 1_000_000.0) as i64 });
        }
    }
    if singles.is_empty() && ranges.is_empty() {
        singles.push(SingleStep { freq_hz: 146_000_000 });
    }
    (singles, ranges)
}
