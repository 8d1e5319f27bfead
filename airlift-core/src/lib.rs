//! Airlift radio file-transfer protocol reference implementation.
//! One-way lossy byte link: the sender paces framed chunks, the receiver
//! reassembles and persists them; nothing is ever retransmitted on request.

pub mod manifest;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod transfer;
pub mod transport;
pub mod wire;

pub use protocol::{Packet, PacketKind, HEADER_LEN, MANIFEST_FILE_ID, MAX_PAYLOAD};
pub use receiver::{PollOutcome, Reassembler, RecvConfig, Stats};
pub use sender::{FailureDecision, SendConfig, SendError, TransmitReport, Transmitter};
pub use transfer::{FileTransfer, ManifestBuffer};
pub use transport::{Transport, TransportError};
pub use wire::{checksum, decode_frame, encode_frame, DecodeError, EncodeError};
