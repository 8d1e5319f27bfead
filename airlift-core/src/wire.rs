//! Framing: fixed 10-byte big-endian header + raw payload, CRC-16 over the
//! payload alone.

use crate::protocol::{Packet, PacketKind, HEADER_LEN, MAX_PAYLOAD};

/// CRC-16 (ARC variant): register seeded with `0xFFFF`, reflected, polynomial
/// `0xA001`. Pure function of the payload bytes; header bytes are never fed in.
pub fn checksum(payload: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in payload {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Encode a packet into a single frame: header then payload.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
    if packet.payload.len() > MAX_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            len: packet.payload.len(),
        });
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + packet.payload.len());
    frame.push(packet.kind.to_wire());
    frame.push(packet.file_id);
    frame.extend_from_slice(&packet.sequence.to_be_bytes());
    frame.extend_from_slice(&packet.total.to_be_bytes());
    frame.extend_from_slice(&(packet.payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&checksum(&packet.payload).to_be_bytes());
    frame.extend_from_slice(&packet.payload);
    Ok(frame)
}

/// Error encoding a packet into a frame (payload over the frame limit).
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds the 240-byte frame limit")]
    PayloadTooLarge { len: usize },
}

/// Decode one frame. Bytes past the declared payload length are ignored.
pub fn decode_frame(frame: &[u8]) -> Result<Packet, DecodeError> {
    if frame.len() < HEADER_LEN {
        return Err(DecodeError::Truncated { len: frame.len() });
    }
    let kind = PacketKind::from_wire(frame[0]).ok_or(DecodeError::Kind(frame[0]))?;
    let file_id = frame[1];
    let sequence = u16::from_be_bytes([frame[2], frame[3]]);
    let total = u16::from_be_bytes([frame[4], frame[5]]);
    let payload_len = usize::from(u16::from_be_bytes([frame[6], frame[7]]));
    let expected = u16::from_be_bytes([frame[8], frame[9]]);
    if HEADER_LEN + payload_len > frame.len() {
        return Err(DecodeError::Length {
            declared: payload_len,
            available: frame.len() - HEADER_LEN,
        });
    }
    let payload = frame[HEADER_LEN..HEADER_LEN + payload_len].to_vec();
    let actual = checksum(&payload);
    if actual != expected {
        return Err(DecodeError::Checksum { expected, actual });
    }
    Ok(Packet {
        kind,
        file_id,
        sequence,
        total,
        payload,
    })
}

/// Error decoding a frame (short, malformed or corrupted).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame of {len} bytes is shorter than the 10-byte header")]
    Truncated { len: usize },
    #[error("unknown packet kind byte {0:#04x}")]
    Kind(u8),
    #[error("header declares {declared} payload bytes, frame holds {available}")]
    Length { declared: usize, available: usize },
    #[error("checksum mismatch: header {expected:#06x}, computed {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },
}
