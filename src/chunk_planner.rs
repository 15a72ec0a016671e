//! Splits a payload into self-contained SysEx frames.

/// Start of System Exclusive.
pub const SYSEX_START: u8 = 0xF0;

/// End of System Exclusive.
pub const SYSEX_END: u8 = 0xF7;

/// Framing overhead per message: start byte, manufacturer ID, end byte.
pub const FRAME_OVERHEAD: usize = 3;

/// Smallest chunk the fallback path will cut.
pub const CHUNK_FLOOR: usize = 256;

/// Bytes the receiver buffers between `F0` and `F7`, manufacturer ID
/// included. Longer messages are dropped whole.
pub const MAX_SYSEX_DATA: usize = 0x2000;

/// Largest chunk any strategy will cut: the receive buffer minus the ID byte.
pub const CHUNK_CEILING: usize = MAX_SYSEX_DATA - 1;

/// One complete `F0 <id> <payload> F7` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexFrame {
    bytes: Vec<u8>,
}

impl SysexFrame {
    /// Frames `payload` behind `manufacturer_id`. The ID is masked to 7 bits.
    ///
    /// The payload must already be 7-bit clean; this is checked in debug
    /// builds only, since [`crate::encoder`] guarantees it by construction.
    pub fn new(manufacturer_id: u8, payload: &[u8]) -> Self {
        debug_assert!(payload.iter().all(|b| b & 0x80 == 0));
        let mut bytes = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
        bytes.push(SYSEX_START);
        bytes.push(manufacturer_id & 0x7F);
        bytes.extend_from_slice(payload);
        bytes.push(SYSEX_END);
        Self { bytes }
    }

    /// The full message including framing.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload slice between the manufacturer ID and `F7`.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..self.bytes.len() - 1]
    }

    /// Manufacturer ID byte.
    pub fn manufacturer_id(&self) -> u8 {
        self.bytes[1]
    }

    /// Length of the full message in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: even an empty payload carries three framing bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Number of frames [`plan`] produces for `payload_len` bytes.
pub fn frame_count(payload_len: usize, chunk_size: usize) -> usize {
    payload_len.div_ceil(chunk_size.max(1))
}

/// Cuts `payload` into consecutive slices of at most `chunk_size` bytes and
/// frames each one. The slices cover the payload exactly once, in order; only
/// the last one may be short. A zero `chunk_size` is treated as one.
///
/// An empty payload yields no frames; callers reject empty payloads before
/// they get here.
pub fn plan(payload: &[u8], manufacturer_id: u8, chunk_size: usize) -> Vec<SysexFrame> {
    payload
        .chunks(chunk_size.max(1))
        .map(|chunk| SysexFrame::new(manufacturer_id, chunk))
        .collect()
}

/// Chunk size for the chunked fallback after a monolithic send failed:
/// aim for at most ten frames unless the configured size is already larger,
/// then keep the result between [`CHUNK_FLOOR`] and [`CHUNK_CEILING`].
pub fn fallback_chunk_size(configured: usize, payload_len: usize) -> usize {
    configured
        .max(payload_len / 10)
        .clamp(CHUNK_FLOOR, CHUNK_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn frame_layout() {
        let frame = SysexFrame::new(0x7D, &[0x01, 0x02]);
        assert_eq!(frame.as_bytes(), &[0xF0, 0x7D, 0x01, 0x02, 0xF7]);
        assert_eq!(frame.payload(), &[0x01, 0x02]);
        assert_eq!(frame.manufacturer_id(), 0x7D);
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn manufacturer_id_is_masked() {
        let frame = SysexFrame::new(0xFF, &[]);
        assert_eq!(frame.as_bytes(), &[0xF0, 0x7F, 0xF7]);
    }

    #[test]
    fn thousand_bytes_in_chunks_of_three_hundred() {
        let payload = vec![0x11; 1000];
        let frames = plan(&payload, 0x7D, 300);
        let sizes: Vec<usize> = frames.iter().map(|f| f.payload().len()).collect();
        assert_eq!(sizes, vec![300, 300, 300, 100]);
        assert_eq!(frame_count(1000, 300), 4);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let frames = plan(&[0; 512], 0x7D, 256);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.payload().len() == 256));
    }

    #[test]
    fn empty_payload_plans_nothing() {
        assert!(plan(&[], 0x7D, 256).is_empty());
        assert_eq!(frame_count(0, 256), 0);
    }

    #[test]
    fn random_plans_cover_payload_exactly() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let len = rng.gen_range(1..5000);
            let chunk = rng.gen_range(1..700);
            let payload: Vec<u8> = (0..len).map(|_| rng.gen_range(0..0x80)).collect();

            let frames = plan(&payload, 0x42, chunk);
            assert_eq!(frames.len(), frame_count(len, chunk));
            assert!(frames.iter().all(|f| f.payload().len() <= chunk));
            assert!(frames
                .iter()
                .all(|f| f.as_bytes()[0] == SYSEX_START && *f.as_bytes().last().unwrap() == SYSEX_END));

            let rebuilt: Vec<u8> = frames.iter().flat_map(|f| f.payload().to_vec()).collect();
            assert_eq!(rebuilt, payload);
        }
    }

    #[test]
    fn fallback_chunk_size_bounds() {
        // Small payloads fall back to the floor.
        assert_eq!(fallback_chunk_size(100, 1000), 256);
        // Configured size wins while it is the larger one.
        assert_eq!(fallback_chunk_size(1024, 5000), 1024);
        // A tenth of a large payload wins over the configured size.
        assert_eq!(fallback_chunk_size(1024, 50_000), 5000);
        // Never beyond the ceiling.
        assert_eq!(fallback_chunk_size(1024, 1_000_000), CHUNK_CEILING);
        assert_eq!(fallback_chunk_size(8192, 0), CHUNK_CEILING);
    }

    #[test]
    fn largest_fallback_frame_fits_receive_buffer() {
        let payload = vec![0x55; 100_000];
        let chunk = fallback_chunk_size(1024, payload.len());
        let frames = plan(&payload, 0x7D, chunk);

        let largest = frames.iter().map(SysexFrame::len).max().unwrap();
        // Everything between F0 and F7: ID byte plus payload.
        assert_eq!(largest - 2, MAX_SYSEX_DATA);
        assert!(frames.iter().all(|f| f.len() - 2 <= MAX_SYSEX_DATA));
    }
}
