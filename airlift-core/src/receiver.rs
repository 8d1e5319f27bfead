//! Receiver: polling loop, packet dispatch, persistence, statistics.
//!
//! All receiver state lives in one owned structure mutated by the single
//! polling loop; there are no statics and no locks.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::manifest::MANIFEST_NAME;
use crate::protocol::{Packet, PacketKind};
use crate::transfer::{FileTransfer, ManifestBuffer};
use crate::transport::{Transport, TransportError};
use crate::wire;

/// Receiver-side tuning. Defaults match the deployed radio link.
#[derive(Debug, Clone)]
pub struct RecvConfig {
    /// Sleep between polls that yielded nothing usable.
    pub poll_interval: Duration,
    /// Idle span after which a waiting notice is logged.
    pub idle_report: Duration,
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            idle_report: Duration::from_secs(10),
        }
    }
}

/// Process-lifetime reception counters, logged at teardown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub packets_received: u64,
    pub packets_failed: u64,
    pub files_completed: u64,
}

impl Stats {
    /// Share of seen frames that decoded cleanly, as a percentage. `None`
    /// before any frame arrived.
    pub fn success_rate(&self) -> Option<f64> {
        let seen = self.packets_received + self.packets_failed;
        if seen == 0 {
            None
        } else {
            Some(self.packets_received as f64 * 100.0 / seen as f64)
        }
    }

    fn log_summary(&self) {
        tracing::info!(
            packets_received = self.packets_received,
            packets_failed = self.packets_failed,
            files_completed = self.files_completed,
            "reception statistics"
        );
        if let Some(rate) = self.success_rate() {
            tracing::info!("packet success rate: {rate:.1}%");
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing waiting on the link.
    Idle,
    /// A frame arrived, decoded and was dispatched.
    Accepted,
    /// Bytes arrived but did not decode; dropped.
    Dropped,
}

/// Owns the receive side: the transfer table, the manifest buffer, the
/// counters and the output directory.
pub struct Reassembler<T: Transport> {
    transport: T,
    transfers: HashMap<u8, FileTransfer>,
    manifest: ManifestBuffer,
    stats: Stats,
    output_dir: PathBuf,
    config: RecvConfig,
}

impl<T: Transport> Reassembler<T> {
    pub fn new(transport: T, output_dir: impl Into<PathBuf>, config: RecvConfig) -> Self {
        Self {
            transport,
            transfers: HashMap::new(),
            manifest: ManifestBuffer::new(),
            stats: Stats::default(),
            output_dir: output_dir.into(),
            config,
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Transfers opened by START and not yet closed by a successful END.
    pub fn open_transfers(&self) -> usize {
        self.transfers.len()
    }

    /// One non-blocking check-then-read. The entire available byte run is
    /// taken as a single frame; the radio link delivers frame-aligned reads.
    pub fn poll(&mut self) -> Result<PollOutcome, TransportError> {
        if !self.transport.bytes_available()? {
            return Ok(PollOutcome::Idle);
        }
        let frame = self.transport.read_available()?;
        if frame.is_empty() {
            return Ok(PollOutcome::Idle);
        }
        match wire::decode_frame(&frame) {
            Ok(packet) => {
                self.stats.packets_received += 1;
                self.dispatch(packet);
                Ok(PollOutcome::Accepted)
            }
            Err(err) => {
                self.stats.packets_failed += 1;
                tracing::warn!(error = %err, len = frame.len(), "dropping undecodable frame");
                Ok(PollOutcome::Dropped)
            }
        }
    }

    fn dispatch(&mut self, packet: Packet) {
        match packet.kind {
            PacketKind::Start => self.on_start(packet),
            PacketKind::Data => self.on_data(packet),
            PacketKind::End => self.on_end(packet),
            PacketKind::Manifest => self.on_manifest(packet),
            // Reserved kind: recognized, never acted on.
            PacketKind::AckRequest => {
                tracing::debug!(file_id = packet.file_id, "ignoring reserved ack-request");
            }
        }
    }

    fn on_start(&mut self, packet: Packet) {
        let filename = String::from_utf8_lossy(&packet.payload).into_owned();
        tracing::info!(
            file_id = packet.file_id,
            filename = %filename,
            total = packet.total,
            "starting file"
        );
        // A repeated START replaces any earlier state for this id outright.
        self.transfers
            .insert(packet.file_id, FileTransfer::new(filename, packet.total));
    }

    fn on_data(&mut self, packet: Packet) {
        let Some(transfer) = self.transfers.get_mut(&packet.file_id) else {
            tracing::warn!(
                file_id = packet.file_id,
                sequence = packet.sequence,
                "data for unknown file id, dropping"
            );
            return;
        };
        transfer.store(packet.sequence, packet.payload);
        tracing::debug!(
            file_id = packet.file_id,
            sequence = packet.sequence,
            received = transfer.received_count(),
            total = transfer.total(),
            "stored chunk"
        );
    }

    fn on_end(&mut self, packet: Packet) {
        let Some(transfer) = self.transfers.get(&packet.file_id) else {
            tracing::warn!(file_id = packet.file_id, "end for unknown file id, dropping");
            return;
        };
        if !transfer.is_complete() {
            tracing::warn!(
                file_id = packet.file_id,
                received = transfer.received_count(),
                total = transfer.total(),
                "incomplete transfer at end, leaving in place"
            );
            return;
        }
        let bytes = transfer.assemble();
        match self.persist(transfer.filename(), &bytes) {
            Ok(path) => {
                tracing::info!(path = %path.display(), size = bytes.len(), "file saved");
                self.transfers.remove(&packet.file_id);
                self.stats.files_completed += 1;
            }
            Err(err) => {
                // The entry stays; a later END may retry the save.
                tracing::error!(file_id = packet.file_id, error = %err, "failed to persist file");
            }
        }
    }

    fn on_manifest(&mut self, packet: Packet) {
        let complete = self
            .manifest
            .store(packet.sequence, packet.total, packet.payload);
        tracing::debug!(
            sequence = packet.sequence,
            total = packet.total,
            stored = self.manifest.stored(),
            "stored manifest chunk"
        );
        if complete {
            let bytes = self.manifest.assemble();
            match self.persist(MANIFEST_NAME, &bytes) {
                Ok(path) => {
                    tracing::info!(path = %path.display(), size = bytes.len(), "manifest saved");
                }
                Err(err) => tracing::error!(error = %err, "failed to persist manifest"),
            }
        }
    }

    /// Write reassembled bytes into the output directory under the
    /// transmitted name, reduced to its final path component.
    fn persist(&self, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unusable file name {name:?}"),
            )
        })?;
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Poll until `timeout` elapses (measured from entry) or `stop` is set.
    /// Transport errors are logged and polling continues. Every exit path
    /// flushes the final statistics.
    pub fn listen(&mut self, timeout: Option<Duration>, stop: &AtomicBool) {
        let started = Instant::now();
        let mut last_activity = Instant::now();
        let mut last_notice = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            if let Some(limit) = timeout {
                if started.elapsed() > limit {
                    tracing::info!(seconds = limit.as_secs(), "listen timeout reached");
                    break;
                }
            }
            match self.poll() {
                Ok(PollOutcome::Accepted) => {
                    last_activity = Instant::now();
                    last_notice = last_activity;
                }
                Ok(PollOutcome::Idle | PollOutcome::Dropped) => {
                    thread::sleep(self.config.poll_interval);
                }
                Err(err) => {
                    tracing::error!(error = %err, "transport error while polling");
                    thread::sleep(self.config.poll_interval);
                }
            }
            if last_activity.elapsed() >= self.config.idle_report
                && last_notice.elapsed() >= self.config.idle_report
            {
                tracing::info!(
                    idle_secs = last_activity.elapsed().as_secs(),
                    "waiting for transmission"
                );
                last_notice = Instant::now();
            }
        }
        if stop.load(Ordering::Relaxed) {
            tracing::info!("stop requested, shutting down");
        }
        self.stats.log_summary();
    }
}
