//! Reassembly state: per-file transfers and the manifest buffer.

use std::collections::BTreeMap;

/// Reconstruction state for one file, from START to a successful END.
///
/// Sequence keys need not be contiguous while packets are in flight; the
/// ordered map gives ascending iteration at assembly time.
#[derive(Debug)]
pub struct FileTransfer {
    filename: String,
    total: u16,
    packets: BTreeMap<u16, Vec<u8>>,
    received_count: u32,
}

impl FileTransfer {
    pub fn new(filename: String, total: u16) -> Self {
        Self {
            filename,
            total,
            packets: BTreeMap::new(),
            received_count: 0,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn total(&self) -> u16 {
        self.total
    }

    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    /// Store a payload at `sequence` (last write wins) and count it.
    /// Every accepted DATA packet counts, duplicates included.
    pub fn store(&mut self, sequence: u16, payload: Vec<u8>) {
        self.packets.insert(sequence, payload);
        self.received_count += 1;
    }

    /// END-time check: the packet counter must equal the declared total.
    /// Counter equality does not prove the sequence set is `{0..total-1}`;
    /// a duplicated sequence can stand in for a missing one.
    pub fn is_complete(&self) -> bool {
        self.received_count == u32::from(self.total)
    }

    /// Concatenate the stored payloads in ascending sequence order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for payload in self.packets.values() {
            out.extend_from_slice(payload);
        }
        out
    }
}

/// Manifest reconstruction. There is no start/end framing for this stream:
/// it is complete once the stored packet count reaches the most recently
/// declared total.
#[derive(Debug, Default)]
pub struct ManifestBuffer {
    packets: BTreeMap<u16, Vec<u8>>,
    total: u16,
}

impl ManifestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one MANIFEST payload and record its declared total. Returns
    /// whether the buffer is complete immediately after this insertion.
    pub fn store(&mut self, sequence: u16, total: u16, payload: Vec<u8>) -> bool {
        self.packets.insert(sequence, payload);
        self.total = total;
        self.packets.len() == usize::from(self.total)
    }

    pub fn total(&self) -> u16 {
        self.total
    }

    pub fn stored(&self) -> usize {
        self.packets.len()
    }

    /// Concatenate the stored payloads in ascending sequence order.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for payload in self.packets.values() {
            out.extend_from_slice(payload);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_completion() {
        let mut transfer = FileTransfer::new("a.png".into(), 3);
        transfer.store(0, vec![1, 2]);
        transfer.store(1, vec![3, 4]);
        assert!(!transfer.is_complete());
        transfer.store(2, vec![5]);
        assert!(transfer.is_complete());
        assert_eq!(transfer.assemble(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn reverse_order_assembles_identically() {
        let mut transfer = FileTransfer::new("a.png".into(), 3);
        transfer.store(2, vec![5]);
        transfer.store(1, vec![3, 4]);
        transfer.store(0, vec![1, 2]);
        assert!(transfer.is_complete());
        assert_eq!(transfer.assemble(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn missing_sequence_stays_incomplete() {
        let mut transfer = FileTransfer::new("a.png".into(), 3);
        transfer.store(0, vec![1]);
        transfer.store(2, vec![3]);
        assert_eq!(transfer.received_count(), 2);
        assert!(!transfer.is_complete());
    }

    #[test]
    fn duplicates_inflate_the_counter() {
        // Duplicate delivery of sequence 0 pushes the counter to 4 even
        // though the distinct set {0, 1, 2} is complete.
        let mut transfer = FileTransfer::new("a.png".into(), 3);
        transfer.store(0, vec![1]);
        transfer.store(0, vec![1]);
        transfer.store(1, vec![2]);
        transfer.store(2, vec![3]);
        assert_eq!(transfer.received_count(), 4);
        assert!(!transfer.is_complete());
    }

    #[test]
    fn duplicate_sequence_last_write_wins() {
        let mut transfer = FileTransfer::new("a.png".into(), 2);
        transfer.store(0, vec![1]);
        transfer.store(0, vec![9]);
        transfer.store(1, vec![2]);
        assert_eq!(transfer.assemble(), vec![9, 2]);
    }

    #[test]
    fn duplicate_can_mask_a_missing_sequence() {
        // The counter reaches the total while sequence 1 was never stored;
        // the assembled bytes are short. Known gap, asserted as-is.
        let mut transfer = FileTransfer::new("a.png".into(), 3);
        transfer.store(0, vec![1]);
        transfer.store(0, vec![1]);
        transfer.store(2, vec![3]);
        assert!(transfer.is_complete());
        assert_eq!(transfer.assemble(), vec![1, 3]);
    }

    #[test]
    fn manifest_single_packet() {
        let mut buf = ManifestBuffer::new();
        assert!(buf.store(0, 1, vec![7; 100]));
        assert_eq!(buf.assemble().len(), 100);
    }

    #[test]
    fn manifest_multi_packet_ascending() {
        let mut buf = ManifestBuffer::new();
        assert!(!buf.store(2, 3, vec![3; 20]));
        assert!(!buf.store(0, 3, vec![1; 240]));
        assert!(buf.store(1, 3, vec![2; 240]));
        let bytes = buf.assemble();
        assert_eq!(bytes.len(), 500);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[240], 2);
        assert_eq!(bytes[480], 3);
    }

    #[test]
    fn manifest_not_cleared_after_completion() {
        let mut buf = ManifestBuffer::new();
        assert!(buf.store(0, 1, vec![1]));
        assert_eq!(buf.stored(), 1);
        // A duplicate after completion reports complete again.
        assert!(buf.store(0, 1, vec![1]));
    }
}
