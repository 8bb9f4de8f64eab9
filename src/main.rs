//! lamco-frame-delay - delayed playback of visual sources
//!
//! Entry point for the demo host binary: drives test-pattern sources through
//! the delay engine with a software surface provider.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use lamco_frame_delay::config::Config;
use lamco_frame_delay::utils::{format_uptime, format_user_error};
use lamco_frame_delay::{
    DelayController, DelaySettings, EngineContext, MonotonicClock, SoftwareSurfaceProvider,
    TestPatternSource, VisualSource,
};

/// Command-line arguments for lamco-frame-delay
#[derive(Parser, Debug)]
#[command(name = "lamco-frame-delay")]
#[command(version, about = "Frame delay engine demo host", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/lamco-frame-delay/config.toml")]
    pub config: String,

    /// Delay in milliseconds (0 disables delaying)
    #[arg(short, long, env = "LAMCO_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Start with delaying suspended
    #[arg(long)]
    pub paused: bool,

    /// Stop after this many seconds (runs until interrupted otherwise)
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<String>,
}

impl Args {
    fn paused_override(&self) -> Option<bool> {
        self.paused.then_some(true)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration first: it carries the default log level
    let (config, from_file) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };
    let config = config.with_overrides(args.delay_ms, args.paused_override());

    if let Err(e) = init_logging(&args, &config) {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-frame-delay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if from_file {
        info!("Configuration loaded from {}", args.config);
    } else {
        warn!("Config file {} not found, using defaults", args.config);
    }
    debug!("Config: {:?}", config);

    if let Err(e) = run(config, &args).await {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("lamco-frame-delay shut down");
    Ok(())
}

/// Load the config file, or defaults when it does not exist
///
/// A file that exists but fails to parse or validate is an error.
fn load_config(path: &str) -> Result<(Config, bool)> {
    if Path::new(path).exists() {
        Ok((Config::load(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

async fn run(config: Config, args: &Args) -> Result<()> {
    let capacity = config.capacity()?;
    let frames_needed = config.frames_needed();
    if (capacity.get() as u64) < frames_needed {
        warn!(
            "Buffer capacity {} is below the {} frames needed for {}ms at {} FPS; \
             playback will show newer frames than requested",
            capacity, frames_needed, config.delay.delay_ms, config.source.frame_rate
        );
    }

    let surfaces = Arc::new(SoftwareSurfaceProvider::new());
    let context = EngineContext::new(
        surfaces.clone(),
        Arc::new(MonotonicClock::new()),
        config.scheduler(),
    );
    let controller = Arc::new(DelayController::new(
        config.delay_settings(),
        context,
        capacity,
    ));

    let sources: Vec<Arc<TestPatternSource>> = (0..config.source.count)
        .map(|_| {
            Arc::new(TestPatternSource::with_frame_rate(
                config.source.width,
                config.source.height,
                config.source.frame_rate,
            ))
        })
        .collect();
    for source in &sources {
        info!(
            "Registering {} ({}x{} @ {} FPS)",
            source.id(),
            config.source.width,
            config.source.height,
            config.source.frame_rate
        );
        controller.register_source(source.clone() as Arc<dyn VisualSource>);
    }

    let cancel = CancellationToken::new();
    let (settings_tx, settings_rx) = watch::channel(config.delay_settings());
    let listener = controller.spawn_settings_listener(settings_rx, cancel.clone());
    let reporter = spawn_stats_reporter(
        Arc::clone(&controller),
        config.logging.stats_interval_secs,
        cancel.clone(),
    );

    info!(
        "Delay engine running: {}ms delay, {} slots, {} Hz display",
        config.delay.delay_ms,
        capacity,
        config.display.refresh_hz
    );

    let mut signals = SignalListener::install()?;
    let deadline = async {
        match args.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Run duration elapsed, shutting down...");
                break;
            }
            event = signals.next() => match event {
                ControlEvent::Shutdown(signal) => {
                    info!("Received {}, shutting down...", signal);
                    break;
                }
                ControlEvent::Reload => reload_settings(args, &settings_tx),
            }
        }
    }

    // Final report before the registry is drained
    for session in controller.live_sessions() {
        info!("{} final: {:?}", session.source_id(), session.stats());
    }

    cancel.cancel();
    controller.shutdown();

    listener.await.context("Settings listener panicked")?;
    if let Some(reporter) = reporter {
        reporter.await.context("Stats reporter panicked")?;
    }

    info!(
        "{} surfaces created, {} still live",
        surfaces.created_count(),
        surfaces.live_surfaces()
    );
    Ok(())
}

/// Re-read the config file and push its delay settings into the feed
///
/// CLI overrides keep precedence over the reloaded file.
fn reload_settings(args: &Args, settings_tx: &watch::Sender<DelaySettings>) {
    info!("Received SIGHUP, reloading {}", args.config);
    match Config::load(&args.config) {
        Ok(config) => {
            let config = config.with_overrides(args.delay_ms, args.paused_override());
            let settings = config.delay_settings();
            settings_tx.send_replace(settings);
            info!(
                "Configuration reloaded: delay {}ms, paused {}",
                settings.delay_ms, settings.paused
            );
        }
        Err(e) => warn!("Config reload failed, keeping current settings: {:#}", e),
    }
}

fn spawn_stats_reporter(
    controller: Arc<DelayController>,
    interval_secs: u64,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    Some(tokio::spawn(async move {
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let settings = controller.settings();
                    info!(
                        "Uptime {} | delay {}ms{} | {} sessions",
                        format_uptime(started.elapsed()),
                        settings.delay_ms,
                        if settings.paused { " (paused)" } else { "" },
                        controller.live_sessions().len()
                    );
                    for session in controller.live_sessions() {
                        let stats = session.stats();
                        info!(
                            "  {}: captured={} rendered={} skipped={} overflow={:.1}% failures={:.1}% ({}/{} slots)",
                            session.source_id(),
                            stats.frames_captured,
                            stats.frames_rendered,
                            stats.renders_skipped,
                            stats.overflow_rate() * 100.0,
                            stats.render_failure_rate() * 100.0,
                            session.filled_slots(),
                            session.capacity()
                        );
                    }
                }
            }
        }
    }))
}

enum ControlEvent {
    Shutdown(&'static str),
    Reload,
}

struct SignalListener {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl SignalListener {
    fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                terminate: signal(SignalKind::terminate())
                    .context("Failed to install SIGTERM handler")?,
                hangup: signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn next(&mut self) -> ControlEvent {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => ControlEvent::Shutdown("SIGINT"),
                _ = self.terminate.recv() => ControlEvent::Shutdown("SIGTERM"),
                _ = self.hangup.recv() => ControlEvent::Reload,
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            ControlEvent::Shutdown("Ctrl+C")
        }
    }
}

/// Logging layer boxed so stdout and file outputs share one registry type
type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Format layer for one log output
///
/// Files never get ANSI colours; the pretty format stays on the terminal and
/// files fall back to the full single-line format.
fn output_layer<W>(format: &str, writer: W, to_file: bool) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(!to_file);

    match format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ if to_file => layer.boxed(),
        _ => layer.pretty().boxed(),
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("lamco={level},warn", level = log_level))
    });

    let log_file_path = args
        .log_file
        .as_deref()
        .map(Path::new)
        .or(config.logging.log_file.as_deref());

    let mut outputs = vec![output_layer(&args.log_format, std::io::stdout, false)];

    // If log file is specified, write to both stdout and file
    if let Some(log_file_path) = log_file_path {
        let file = File::create(log_file_path).with_context(|| {
            format!("Failed to create log file: {}", log_file_path.display())
        })?;
        outputs.push(output_layer(&args.log_format, Arc::new(file), true));
    }

    tracing_subscriber::registry()
        .with(outputs)
        .with(env_filter)
        .init();

    if let Some(log_file_path) = log_file_path {
        info!("Logging to file: {}", log_file_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_through(format: &str) -> String {
        let file = tempfile::NamedTempFile::new().unwrap();
        let writer = Arc::new(file.reopen().unwrap());
        let subscriber = tracing_subscriber::registry().with(vec![output_layer(format, writer, true)]);

        tracing::subscriber::with_default(subscriber, || {
            info!(slot = 3, "Rendered delayed frame");
        });

        std::fs::read_to_string(file.path()).unwrap()
    }

    #[test]
    fn test_file_output_has_no_ansi() {
        for format in ["pretty", "compact", "json"] {
            let written = log_through(format);
            assert!(written.contains("Rendered delayed frame"), "{}: {}", format, written);
            assert!(!written.contains('\u{1b}'), "{} wrote colour codes", format);
        }
    }

    #[test]
    fn test_json_file_output_is_one_object_per_line() {
        let written = log_through("json");
        let line = written.lines().next().unwrap();
        assert!(line.starts_with('{') && line.ends_with('}'));
        assert!(line.contains("\"slot\":3"));
    }

    #[test]
    fn test_pretty_file_output_is_single_line() {
        let written = log_through("pretty");
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("slot=3"));
    }
}
