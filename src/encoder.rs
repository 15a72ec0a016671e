//! Packs 32-bit values into 7-bit clean quintets.
//!
//! A SysEx data byte must keep its top bit clear, so every value is spread
//! over five bytes, least significant group first:
//!
//! ```text
//! byte 0: bits  0..7
//! byte 1: bits  7..14
//! byte 2: bits 14..21
//! byte 3: bits 21..28
//! byte 4: bits 28..32   (upper three bits always zero)
//! ```

/// A 32-bit source value. Signed PCM samples are carried by bit pattern.
pub type RawValue = u32;

/// The encoded payload of a whole job, quintets concatenated in source order.
pub type PayloadBuffer = Vec<u8>;

/// Number of payload bytes per encoded value.
pub const QUINTET_LEN: usize = 5;

const SEVEN_BITS: u32 = 0x7F;
const FOUR_BITS: u32 = 0x0F;

/// The five 7-bit clean bytes for one [`RawValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quintet([u8; QUINTET_LEN]);

impl Quintet {
    /// Borrows the encoded bytes.
    pub fn as_bytes(&self) -> &[u8; QUINTET_LEN] {
        &self.0
    }

    /// Wraps five bytes received off the wire. [`decode`] ignores any stray
    /// high bits, as the receiving firmware does.
    pub fn from_bytes(bytes: [u8; QUINTET_LEN]) -> Self {
        Self(bytes)
    }
}

/// Encodes one value. Total and infallible: the masks guarantee bit 7 is
/// clear in every byte.
pub fn encode(value: RawValue) -> Quintet {
    Quintet([
        (value & SEVEN_BITS) as u8,
        ((value >> 7) & SEVEN_BITS) as u8,
        ((value >> 14) & SEVEN_BITS) as u8,
        ((value >> 21) & SEVEN_BITS) as u8,
        ((value >> 28) & FOUR_BITS) as u8,
    ])
}

/// Encodes a signed PCM sample through its two's complement bit pattern.
pub fn encode_sample(sample: i32) -> Quintet {
    encode(sample as u32)
}

/// Inverse of [`encode`].
pub fn decode(quintet: &Quintet) -> RawValue {
    let [b0, b1, b2, b3, b4] = quintet.0.map(u32::from);
    (b0 & SEVEN_BITS)
        | (b1 & SEVEN_BITS) << 7
        | (b2 & SEVEN_BITS) << 14
        | (b3 & SEVEN_BITS) << 21
        | (b4 & FOUR_BITS) << 28
}

/// Encodes every value in order into one payload buffer.
pub fn encode_all(values: &[RawValue]) -> PayloadBuffer {
    let mut payload = Vec::with_capacity(values.len() * QUINTET_LEN);
    for &value in values {
        payload.extend_from_slice(encode(value).as_bytes());
    }
    payload
}

/// Decodes a payload back into values. A trailing partial quintet is ignored,
/// just like the device does.
pub fn decode_payload(payload: &[u8]) -> Vec<RawValue> {
    payload
        .chunks_exact(QUINTET_LEN)
        .map(|c| decode(&Quintet([c[0], c[1], c[2], c[3], c[4]])))
        .collect()
}
