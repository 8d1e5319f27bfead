//! Airlift wire protocol: packet kinds, header constants, packet type.

/// Wire header length in bytes.
pub const HEADER_LEN: usize = 10;

/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD: usize = 240;

/// `file_id` reserved for the manifest stream. Ordinary files use 0-254.
pub const MANIFEST_FILE_ID: u8 = 255;

/// The five packet kinds. One byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// Opens a file transfer; payload carries the file name.
    Start = 1,
    /// One chunk of file content.
    Data = 2,
    /// Closes a file transfer; `sequence` carries `total` as a sentinel.
    End = 3,
    /// One chunk of the checksum manifest. No start/end framing.
    Manifest = 4,
    /// Reserved. Never emitted; ignored on receipt.
    AckRequest = 5,
}

impl PacketKind {
    /// Map a wire byte to a kind. Bytes outside 1-5 have no meaning.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(PacketKind::Start),
            2 => Some(PacketKind::Data),
            3 => Some(PacketKind::End),
            4 => Some(PacketKind::Manifest),
            5 => Some(PacketKind::AckRequest),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// One wire unit: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub file_id: u8,
    /// Zero-based chunk index for DATA/MANIFEST; equals `total` on END.
    pub sequence: u16,
    /// Declared DATA-packet count for the whole file or manifest.
    pub total: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// START frame opening a transfer; the payload is the file name bytes.
    pub fn start(file_id: u8, total: u16, name: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Start,
            file_id,
            sequence: 0,
            total,
            payload: name,
        }
    }

    pub fn data(file_id: u8, sequence: u16, total: u16, payload: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Data,
            file_id,
            sequence,
            total,
            payload,
        }
    }

    /// END frame: `sequence` repeats `total` as a completion sentinel.
    pub fn end(file_id: u8, total: u16) -> Self {
        Self {
            kind: PacketKind::End,
            file_id,
            sequence: total,
            total,
            payload: Vec::new(),
        }
    }

    pub fn manifest(sequence: u16, total: u16, payload: Vec<u8>) -> Self {
        Self {
            kind: PacketKind::Manifest,
            file_id: MANIFEST_FILE_ID,
            sequence,
            total,
            payload,
        }
    }
}
