//! Bit-level packing for repair traces.
//!
//! A repair trace is `bw` bits per source byte, concatenated MSB-first
//! across the whole buffer and packed into bytes (the last byte is
//! zero-padded on the low end if `bw * len` isn't a multiple of 8).

/// Pack a flat sequence of bits, MSB-first, into bytes.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (idx, &bit) in bits.iter().enumerate() {
        if bit {
            let byte = idx / 8;
            let shift = 7 - (idx % 8);
            out[byte] |= 1 << shift;
        }
    }
    out
}

/// Unpack the first `n_bits` bits, MSB-first, out of a packed buffer.
pub fn unpack_bits(buf: &[u8], n_bits: usize) -> Vec<bool> {
    (0..n_bits)
        .map(|idx| {
            let byte = idx / 8;
            let shift = 7 - (idx % 8);
            (buf[byte] >> shift) & 1 == 1
        })
        .collect()
}

/// Number of bytes needed to pack `n_bits` bits.
pub fn packed_len(n_bits: usize) -> usize {
    n_bits.div_ceil(8)
}
