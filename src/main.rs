// src/main.rs
//! Keytrail daemon
//!
//! Reads hook-helper events as JSON lines on stdin, buffers and flushes
//! them to the records directory, and uploads on an interval. `SIGUSR1`
//! (or an `{"type":"upload"}` line) forces an upload; Ctrl+C stops
//! gracefully.

use anyhow::{Context, Result};
use clap::Parser;
use keytrail::observability::init_tracing;
use keytrail::runtime::LineProducer;
use keytrail::shipping::from_destination;
use keytrail::{Pipeline, PipelineConfig};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "keytrail", version, about = "Buffer, persist and ship input events")]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, env = "KEYTRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Upload destination (http://host/bucket or a directory)
    #[arg(long)]
    destination: Option<String>,

    /// Echo every captured record
    #[arg(short, long)]
    verbose: bool,

    /// Capture only; never write to disk or network
    #[arg(long)]
    dry_run: bool,

    /// Keep capture order when flushing
    #[arg(long)]
    no_shuffle: bool,

    /// Flush threshold
    #[arg(long)]
    max_rows: Option<usize>,

    /// Upload interval in seconds
    #[arg(long)]
    push_interval: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(destination) = &self.destination {
            config.destination = destination.clone();
        }
        if let Some(max_rows) = self.max_rows {
            config.max_rows = max_rows;
        }
        if let Some(push_interval) = self.push_interval {
            config.push_interval = push_interval;
        }
        config.verbose |= self.verbose;
        config.dry_run |= self.dry_run;
        if self.no_shuffle {
            config.shuffle = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(config.log_format, config.verbose)?;

    info!("Starting keytrail v{}", keytrail::VERSION);
    info!("Records directory: {}", config.records_dir().display());

    let store = Arc::from(from_destination(&config.destination, &config.user())?);
    let producer = LineProducer::new(BufReader::new(std::io::stdin()));

    let pipeline = Pipeline::new(&config, store, Box::new(producer))?;
    let handle = pipeline.spawn()?;
    let trigger = handle.trigger();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hotkey = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = hotkey.recv() => {
                        if received.is_none() || !trigger.fire() {
                            break;
                        }
                        info!("Upload requested");
                    }
                }
            }
        });
    }
    #[cfg(not(unix))]
    drop(trigger);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Received shutdown signal, cleaning up...");

    let stats = handle.shutdown().await;
    info!(
        "Captured {} records, wrote {}, dropped {} ({:.2}%), {} uploads",
        stats.records_captured,
        stats.rows_written,
        stats.rows_dropped,
        stats.drop_rate(),
        stats.uploads_succeeded
    );

    Ok(())
}
