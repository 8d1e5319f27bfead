//! Transport contract: the link reduced to check/read/write primitives.

/// Byte link as the protocol sees it. Radio and modulation parameters are
/// fixed when the concrete transport is constructed and are opaque here.
///
/// The link delivers frame-aligned reads: one `read_available` call returns
/// the bytes of at most one frame. Reassembly relies on that boundary.
pub trait Transport {
    /// Whether at least one byte is waiting to be read.
    fn bytes_available(&mut self) -> Result<bool, TransportError>;

    /// Take the entire currently-available byte run. May be empty.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Write one frame to the link.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Failure at the channel itself, below the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("link I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("link closed")]
    Closed,
}
