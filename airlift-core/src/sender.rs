//! Transmitter: chunk, frame and pace files onto the link.
//!
//! The link is one-way from the protocol's viewpoint: nothing the receiver
//! does can trigger a resend, so the only reliability tools on this side are
//! write retries and pacing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::manifest::{self, MANIFEST_NAME};
use crate::protocol::{Packet, MANIFEST_FILE_ID, MAX_PAYLOAD};
use crate::transport::Transport;
use crate::wire::{self, EncodeError};

/// Sender-side tuning. Defaults match the deployed radio link.
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Write attempts per frame before the file transfer is abandoned.
    pub write_attempts: u32,
    /// Pause after each failed write attempt.
    pub retry_backoff: Duration,
    /// Pause after every successful write, so the receiver's input buffer
    /// does not saturate.
    pub write_pacing: Duration,
    /// Extra pause after each DATA frame.
    pub data_pacing: Duration,
    /// Pause after START so the receiver can set up transfer state.
    pub settle_delay: Duration,
    /// Pause between consecutive files.
    pub inter_file_delay: Duration,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            write_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            write_pacing: Duration::from_millis(100),
            data_pacing: Duration::from_millis(200),
            settle_delay: Duration::from_millis(500),
            inter_file_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{} needs {packets} data packets, more than the header can declare", .path.display())]
    FileTooLarge { path: PathBuf, packets: usize },
    #[error("frame write failed after {attempts} attempts")]
    WriteExhausted { attempts: u32 },
    #[error("found {0} images, more than the 255 file ids available per run")]
    TooManyFiles(usize),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Operator verdict after a file fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    Continue,
    Abort,
}

/// Outcome of a directory transmission run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransmitReport {
    pub files_sent: usize,
    pub files_failed: usize,
    pub manifest_sent: bool,
}

/// Owns the outbound side: chunking, framing, pacing, retries.
pub struct Transmitter<T: Transport> {
    transport: T,
    config: SendConfig,
    frames_sent: u64,
    write_retries: u64,
}

impl<T: Transport> Transmitter<T> {
    pub fn new(transport: T, config: SendConfig) -> Self {
        Self {
            transport,
            config,
            frames_sent: 0,
            write_retries: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn write_retries(&self) -> u64 {
        self.write_retries
    }

    /// Write one frame, retrying with backoff after each failed attempt.
    /// Exhausting the attempts fails the frame, never the process.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<(), SendError> {
        for attempt in 1..=self.config.write_attempts {
            match self.transport.write(frame) {
                Ok(()) => {
                    self.frames_sent += 1;
                    thread::sleep(self.config.write_pacing);
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        attempts = self.config.write_attempts,
                        error = %err,
                        "frame write failed"
                    );
                    self.write_retries += 1;
                    thread::sleep(self.config.retry_backoff);
                }
            }
        }
        Err(SendError::WriteExhausted {
            attempts: self.config.write_attempts,
        })
    }

    /// Send one file: START, settle, DATA frames in ascending sequence, END.
    /// The file is read whole up front, which bounds the usable file size to
    /// available memory. Any failed frame aborts the rest of this transfer;
    /// no resumable state is kept.
    pub fn send_file(&mut self, path: &Path, file_id: u8) -> Result<(), SendError> {
        let bytes = fs::read(path).map_err(|source| SendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let total = bytes.len().div_ceil(MAX_PAYLOAD);
        if total > usize::from(u16::MAX) {
            return Err(SendError::FileTooLarge {
                path: path.to_path_buf(),
                packets: total,
            });
        }
        let total = total as u16;
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
            .into_bytes();
        name.truncate(MAX_PAYLOAD);
        tracing::info!(
            file = %path.display(),
            file_id,
            size = bytes.len(),
            packets = total,
            "transmitting file"
        );

        let start = wire::encode_frame(&Packet::start(file_id, total, name))?;
        self.send_frame(&start)?;
        thread::sleep(self.config.settle_delay);

        for (sequence, chunk) in bytes.chunks(MAX_PAYLOAD).enumerate() {
            let frame =
                wire::encode_frame(&Packet::data(file_id, sequence as u16, total, chunk.to_vec()))?;
            self.send_frame(&frame)?;
            thread::sleep(self.config.data_pacing);
        }

        let end = wire::encode_frame(&Packet::end(file_id, total))?;
        self.send_frame(&end)?;
        tracing::info!(file = %path.display(), file_id, "file transmitted");
        Ok(())
    }

    /// Send the manifest stream: MANIFEST frames only, sequenced from zero,
    /// with no START/END and no extra data pacing.
    pub fn send_manifest(&mut self, path: &Path) -> Result<(), SendError> {
        let bytes = fs::read(path).map_err(|source| SendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let total = bytes.len().div_ceil(MAX_PAYLOAD);
        if total > usize::from(u16::MAX) {
            return Err(SendError::FileTooLarge {
                path: path.to_path_buf(),
                packets: total,
            });
        }
        let total = total as u16;
        tracing::info!(
            file = %path.display(),
            size = bytes.len(),
            packets = total,
            "transmitting manifest"
        );
        for (sequence, chunk) in bytes.chunks(MAX_PAYLOAD).enumerate() {
            let frame =
                wire::encode_frame(&Packet::manifest(sequence as u16, total, chunk.to_vec()))?;
            self.send_frame(&frame)?;
        }
        tracing::info!("manifest transmitted");
        Ok(())
    }

    /// Transmit every image in `dir` in ascending lexical name order, file
    /// ids assigned from zero, then the manifest: the explicit path when
    /// given, otherwise `dir/manifest.md5` when present. `on_failure` is
    /// consulted after each failed file; an abort skips the remaining
    /// images but the manifest stage still runs.
    pub fn transmit_images<F>(
        &mut self,
        dir: &Path,
        manifest_path: Option<&Path>,
        mut on_failure: F,
    ) -> Result<TransmitReport, SendError>
    where
        F: FnMut(&Path, &SendError) -> FailureDecision,
    {
        let images = manifest::find_images(dir).map_err(|source| SendError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if images.is_empty() {
            tracing::warn!(dir = %dir.display(), "no images to transmit");
            return Ok(TransmitReport::default());
        }
        if images.len() > usize::from(MANIFEST_FILE_ID) {
            return Err(SendError::TooManyFiles(images.len()));
        }
        tracing::info!(dir = %dir.display(), count = images.len(), "starting transmission run");

        let mut report = TransmitReport::default();
        for (file_id, image) in images.iter().enumerate() {
            match self.send_file(image, file_id as u8) {
                Ok(()) => report.files_sent += 1,
                Err(err) => {
                    report.files_failed += 1;
                    tracing::error!(file = %image.display(), error = %err, "file transmission failed");
                    if on_failure(image, &err) == FailureDecision::Abort {
                        tracing::info!("operator aborted the remaining files");
                        break;
                    }
                }
            }
            thread::sleep(self.config.inter_file_delay);
        }

        let discovered = dir.join(MANIFEST_NAME);
        let manifest = manifest_path
            .map(Path::to_path_buf)
            .or_else(|| discovered.exists().then_some(discovered));
        if let Some(manifest) = manifest {
            match self.send_manifest(&manifest) {
                Ok(()) => report.manifest_sent = true,
                Err(err) => {
                    tracing::error!(error = %err, "manifest transmission failed");
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketKind;
    use crate::transport::TransportError;
    use crate::wire::decode_frame;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every written frame; fails the first `fail_writes` attempts.
    struct ScriptedLink {
        frames: Rc<RefCell<Vec<Vec<u8>>>>,
        fail_writes: u32,
    }

    impl ScriptedLink {
        fn new(fail_writes: u32) -> (Self, Rc<RefCell<Vec<Vec<u8>>>>) {
            let frames = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    frames: Rc::clone(&frames),
                    fail_writes,
                },
                frames,
            )
        }
    }

    impl Transport for ScriptedLink {
        fn bytes_available(&mut self) -> Result<bool, TransportError> {
            Ok(false)
        }

        fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
            Ok(Vec::new())
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            if self.fail_writes > 0 {
                self.fail_writes -= 1;
                return Err(TransportError::Closed);
            }
            self.frames.borrow_mut().push(bytes.to_vec());
            Ok(())
        }
    }

    fn instant_config() -> SendConfig {
        SendConfig {
            write_attempts: 3,
            retry_backoff: Duration::ZERO,
            write_pacing: Duration::ZERO,
            data_pacing: Duration::ZERO,
            settle_delay: Duration::ZERO,
            inter_file_delay: Duration::ZERO,
        }
    }

    #[test]
    fn send_file_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        let body: Vec<u8> = (0..500u16).map(|i| i as u8).collect();
        fs::write(&path, &body).unwrap();

        let (link, frames) = ScriptedLink::new(0);
        let mut tx = Transmitter::new(link, instant_config());
        tx.send_file(&path, 7).unwrap();

        let frames = frames.borrow();
        // START + 3 DATA (240/240/20) + END.
        assert_eq!(frames.len(), 5);
        let start = decode_frame(&frames[0]).unwrap();
        assert_eq!(start.kind, PacketKind::Start);
        assert_eq!(start.file_id, 7);
        assert_eq!(start.total, 3);
        assert_eq!(start.payload, b"photo.png");

        let mut rebuilt = Vec::new();
        for (i, frame) in frames[1..4].iter().enumerate() {
            let data = decode_frame(frame).unwrap();
            assert_eq!(data.kind, PacketKind::Data);
            assert_eq!(data.sequence, i as u16);
            assert_eq!(data.total, 3);
            rebuilt.extend_from_slice(&data.payload);
        }
        assert_eq!(rebuilt, body);

        let end = decode_frame(&frames[4]).unwrap();
        assert_eq!(end.kind, PacketKind::End);
        assert_eq!(end.sequence, 3);
        assert!(end.payload.is_empty());
        assert_eq!(tx.frames_sent(), 5);
    }

    #[test]
    fn send_empty_file_is_start_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        fs::write(&path, b"").unwrap();

        let (link, frames) = ScriptedLink::new(0);
        let mut tx = Transmitter::new(link, instant_config());
        tx.send_file(&path, 0).unwrap();

        let frames = frames.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(decode_frame(&frames[0]).unwrap().total, 0);
        assert_eq!(decode_frame(&frames[1]).unwrap().kind, PacketKind::End);
    }

    #[test]
    fn send_manifest_has_no_start_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_NAME);
        fs::write(&path, vec![b'x'; 500]).unwrap();

        let (link, frames) = ScriptedLink::new(0);
        let mut tx = Transmitter::new(link, instant_config());
        tx.send_manifest(&path).unwrap();

        let frames = frames.borrow();
        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            let pkt = decode_frame(frame).unwrap();
            assert_eq!(pkt.kind, PacketKind::Manifest);
            assert_eq!(pkt.file_id, MANIFEST_FILE_ID);
            assert_eq!(pkt.sequence, i as u16);
            assert_eq!(pkt.total, 3);
        }
    }

    #[test]
    fn transient_write_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        fs::write(&path, b"abc").unwrap();

        // First two writes fail; the third attempt of the START frame lands.
        let (link, frames) = ScriptedLink::new(2);
        let mut tx = Transmitter::new(link, instant_config());
        tx.send_file(&path, 1).unwrap();
        assert_eq!(frames.borrow().len(), 3);
        assert_eq!(tx.write_retries(), 2);
    }

    #[test]
    fn exhausted_retries_abort_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        fs::write(&path, b"abc").unwrap();

        let (link, frames) = ScriptedLink::new(u32::MAX);
        let mut tx = Transmitter::new(link, instant_config());
        let err = tx.send_file(&path, 1).unwrap_err();
        assert!(matches!(err, SendError::WriteExhausted { attempts: 3 }));
        // Nothing after the failed START.
        assert!(frames.borrow().is_empty());
    }

    #[test]
    fn transmit_images_assigns_ids_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"second").unwrap();
        fs::write(dir.path().join("a.png"), b"first").unwrap();

        let (link, frames) = ScriptedLink::new(0);
        let mut tx = Transmitter::new(link, instant_config());
        let report = tx
            .transmit_images(dir.path(), None, |_, _| FailureDecision::Abort)
            .unwrap();
        assert_eq!(report.files_sent, 2);
        assert!(!report.manifest_sent);

        let frames = frames.borrow();
        let starts: Vec<_> = frames
            .iter()
            .map(|f| decode_frame(f).unwrap())
            .filter(|p| p.kind == PacketKind::Start)
            .collect();
        assert_eq!(starts[0].file_id, 0);
        assert_eq!(starts[0].payload, b"a.png");
        assert_eq!(starts[1].file_id, 1);
        assert_eq!(starts[1].payload, b"b.png");
    }

    #[test]
    fn transmit_images_sends_discovered_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"first").unwrap();
        manifest::write_manifest(dir.path()).unwrap();

        let (link, frames) = ScriptedLink::new(0);
        let mut tx = Transmitter::new(link, instant_config());
        let report = tx
            .transmit_images(dir.path(), None, |_, _| FailureDecision::Abort)
            .unwrap();
        assert!(report.manifest_sent);
        let last = decode_frame(frames.borrow().last().unwrap()).unwrap();
        assert_eq!(last.kind, PacketKind::Manifest);
    }

    #[test]
    fn manifest_still_sent_after_abort() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"first").unwrap();
        fs::write(dir.path().join("b.png"), b"second").unwrap();
        manifest::write_manifest(dir.path()).unwrap();

        // Exactly the three attempts of a.png's START frame fail.
        let (link, frames) = ScriptedLink::new(3);
        let mut tx = Transmitter::new(link, instant_config());
        let report = tx
            .transmit_images(dir.path(), None, |_, _| FailureDecision::Abort)
            .unwrap();
        assert_eq!(report.files_sent, 0);
        assert_eq!(report.files_failed, 1);
        assert!(report.manifest_sent);
        let frames = frames.borrow();
        assert!(!frames.is_empty());
        assert!(frames
            .iter()
            .all(|f| decode_frame(f).unwrap().kind == PacketKind::Manifest));
    }

    #[test]
    fn abort_decision_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"first").unwrap();
        fs::write(dir.path().join("b.png"), b"second").unwrap();

        let (link, _frames) = ScriptedLink::new(u32::MAX);
        let mut tx = Transmitter::new(link, instant_config());
        let mut asked = 0;
        let report = tx
            .transmit_images(dir.path(), None, |_, _| {
                asked += 1;
                FailureDecision::Abort
            })
            .unwrap();
        assert_eq!(asked, 1);
        assert_eq!(report.files_sent, 0);
        assert_eq!(report.files_failed, 1);
    }
}
