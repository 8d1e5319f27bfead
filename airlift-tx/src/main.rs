//! airlift-tx — transmit a directory of images and their checksum manifest
//! over the one-way radio link.

mod config;
mod serial;

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use airlift_core::manifest::{self, MANIFEST_NAME};
use airlift_core::sender::{FailureDecision, SendError, Transmitter};

#[derive(Parser)]
#[command(name = "airlift-tx", version, about = "Transmit images over the radio link")]
struct Cli {
    /// Directory of images to transmit.
    image_dir: PathBuf,

    /// Manifest to send after the images (default: <image_dir>/manifest.md5,
    /// built first when missing).
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Serial device of the radio dongle (overrides the config file).
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Serial baud rate (overrides the config file).
    #[arg(short, long)]
    baud: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load();
    let device = cli.device.unwrap_or_else(|| cfg.device.clone());
    let baud = cli.baud.unwrap_or(cfg.baud);

    // Build the manifest up front unless the operator supplied one.
    if cli.manifest.is_none() && !cli.image_dir.join(MANIFEST_NAME).exists() {
        let count = manifest::write_manifest(&cli.image_dir)
            .context("building the checksum manifest")?;
        tracing::info!(count, "wrote checksum manifest");
    }

    let link = serial::SerialLink::open(&device, baud)?;
    tracing::info!(device = %device.display(), baud, "radio link ready");

    let mut tx = Transmitter::new(link, cfg.send_config());
    let report = tx.transmit_images(&cli.image_dir, cli.manifest.as_deref(), prompt_on_failure)?;

    tracing::info!(
        files_sent = report.files_sent,
        files_failed = report.files_failed,
        manifest_sent = report.manifest_sent,
        frames_sent = tx.frames_sent(),
        write_retries = tx.write_retries(),
        "transmission run finished"
    );
    if report.files_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Ask the operator whether to keep going after a failed file.
fn prompt_on_failure(path: &Path, err: &SendError) -> FailureDecision {
    eprintln!("transmission failed for {}: {err}", path.display());
    eprint!("Continue with next file? (y/n): ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return FailureDecision::Abort;
    }
    if answer.trim().eq_ignore_ascii_case("y") {
        FailureDecision::Continue
    } else {
        FailureDecision::Abort
    }
}
