//! airlift-rx — receive framed files from the radio link, reassemble them
//! into the output directory and verify them against the manifest.

mod config;
mod serial;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use airlift_core::manifest::{self, ManifestError};
use airlift_core::receiver::Reassembler;

#[derive(Parser)]
#[command(name = "airlift-rx", version, about = "Receive images from the radio link")]
struct Cli {
    /// Serial device of the radio dongle (auto-detected when omitted).
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Directory for reassembled files.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop listening after this many seconds.
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Skip manifest verification after the run.
    #[arg(long)]
    no_verify: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load();

    let device = match cli.device.or_else(|| cfg.device.clone()) {
        Some(device) => device,
        None => serial::detect()?,
    };
    let output_dir = cli.output.unwrap_or_else(|| cfg.output_dir.clone());

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))
        .context("installing SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))
        .context("installing SIGTERM handler")?;

    let link = serial::SerialLink::open(&device, cfg.baud)?;
    tracing::info!(
        device = %device.display(),
        baud = cfg.baud,
        output = %output_dir.display(),
        "receiver active"
    );

    let mut rx = Reassembler::new(link, output_dir.clone(), cfg.recv_config());
    rx.listen(cli.timeout.map(Duration::from_secs), &stop);

    if !cli.no_verify {
        verify(&output_dir);
    }
    Ok(())
}

/// Check reassembled files against the received manifest, when one arrived.
fn verify(output_dir: &Path) {
    match manifest::verify_manifest(output_dir) {
        Ok(report) if report.failures == 0 => {
            tracing::info!(checked = report.checked, "all checksums verified");
        }
        Ok(report) => {
            tracing::warn!(
                checked = report.checked,
                failures = report.failures,
                "checksum verification failed"
            );
        }
        Err(ManifestError::NotFound(_)) => {
            tracing::info!("no manifest received; skipping verification");
        }
        Err(err) => tracing::warn!(error = %err, "manifest verification error"),
    }
}
