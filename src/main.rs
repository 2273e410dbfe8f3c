//! vqscore CLI
//!
//! Scores a distorted video against its reference and prints the summed
//! per-frame distance to stdout.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use vqscore::{score_files, CancelToken, FfprobeProbe, FileConfig, PipelineMetrics, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "vqscore", version, about = "Full-reference video quality scoring")]
struct Cli {
    /// Reference (source) video
    #[arg(short = 's', long = "source")]
    source: Option<PathBuf>,

    /// Distorted video
    #[arg(short = 'd', long = "dist")]
    distorted: Option<PathBuf>,

    /// Norm exponent, in (0, 100]
    #[arg(short = 'p', long)]
    pnorm: Option<f32>,

    /// Display intensity target in nits, in (0, 1000]
    #[arg(short = 'l', long)]
    intensity_target: Option<f32>,

    /// Number of comparison workers [default: half the CPUs]
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Capacity of the job and result queues
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Frame width; skips probing when given with --height
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Frame height; skips probing when given with --width
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this port while scoring
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Log at debug level
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,

    /// Log warnings and errors only
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Cli {
    /// Applies command line values over `options`.
    fn apply(&self, options: &mut RunOptions) {
        if let Some(source) = &self.source {
            options.source = Some(source.clone());
        }
        if let Some(distorted) = &self.distorted {
            options.distorted = Some(distorted.clone());
        }
        if let Some(pnorm) = self.pnorm {
            options.pnorm = pnorm;
        }
        if let Some(intensity) = self.intensity_target {
            options.intensity_target = intensity;
        }
        if self.threads.is_some() {
            options.threads = self.threads;
        }
        if let Some(capacity) = self.queue_capacity {
            options.queue_capacity = capacity;
        }
        if self.width.is_some() {
            options.width = self.width;
        }
        if self.height.is_some() {
            options.height = self.height;
        }
    }

    fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            configured
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The config file may fail to load before logging is up; report that
    // with the default level.
    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path),
        None => Ok(FileConfig::default()),
    };
    let configured = file
        .as_ref()
        .map(|file| file.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level(&configured))),
        )
        .init();

    let file = match file {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("vqscore v{}", vqscore::VERSION);

    let mut options = file.run.clone();
    cli.apply(&mut options);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("Interrupted, aborting run");
        handler_token.cancel();
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let metrics = match PipelineMetrics::new() {
        Ok(metrics) => Some(Arc::new(metrics)),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    #[cfg(feature = "metrics")]
    {
        let port = cli.metrics_port.unwrap_or(file.metrics.port);
        if let (true, Some(metrics)) = (port != 0, &metrics) {
            let server = vqscore::metrics::MetricsServer::new(
                vqscore::metrics::MetricsServerConfig::with_port(port),
                Arc::clone(metrics),
            );
            // Detached; the thread logs its own failure
            drop(server.spawn());
        }
    }

    match score_files(options, &FfprobeProbe::default(), cancel, metrics) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                mean = summary.mean().unwrap_or(0.0),
                "Scoring finished"
            );
            println!("{}", summary.total);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_values() {
        let cli = Cli::parse_from(["vqscore", "-s", "a.mkv", "-p", "6", "-t", "2"]);
        let mut options = RunOptions::new("file_ref.mkv", "file_dist.mkv");
        options.intensity_target = 80.0;

        cli.apply(&mut options);
        assert_eq!(options.source, Some(PathBuf::from("a.mkv")));
        assert_eq!(options.distorted, Some(PathBuf::from("file_dist.mkv")));
        assert_eq!(options.pnorm, 6.0);
        assert_eq!(options.intensity_target, 80.0);
        assert_eq!(options.threads, Some(2));
    }

    #[test]
    fn test_width_requires_height() {
        assert!(Cli::try_parse_from(["vqscore", "--width", "640"]).is_err());
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::parse_from(["vqscore", "-v"]);
        assert_eq!(cli.log_level("info"), "debug");
        let cli = Cli::parse_from(["vqscore", "-q"]);
        assert_eq!(cli.log_level("info"), "warn");
        let cli = Cli::parse_from(["vqscore"]);
        assert_eq!(cli.log_level("trace"), "trace");
    }
}
