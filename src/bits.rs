//! Bit-mask <-> integer conversion for repair-trace bandwidth packing.
//!
//! Repair traces and recovery coefficients are carried around as small
//! non-negative integers (`u32`) whose binary expansion is a `bw`-bit mask,
//! MSB-first: bit `a` (for `a` in `[0, bw)`) of the mask equals bit
//! `bw - 1 - a` of the integer. `expand_mask` and `compress_mask` are exact
//! inverses of each other for any `bw` in `1..=32`.

/// Expand an integer into its `bw`-bit mask, MSB-first.
pub fn expand_mask(m: u32, bw: u8) -> Vec<bool> {
    (0..bw)
        .map(|a| {
            let shift = bw - 1 - a;
            (m >> shift) & 1 == 1
        })
        .collect()
}

/// Pack a `bw`-bit mask, MSB-first, into an integer.
pub fn compress_mask(mask: &[bool]) -> u32 {
    let bw = mask.len() as u32;
    let mut m = 0u32;
    for (a, &bit) in mask.iter().enumerate() {
        if bit {
            m |= 1 << (bw - 1 - a as u32);
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_every_bandwidth() {
        for bw in 1u8..=8 {
            let max = 1u32 << bw;
            for m in 0..max {
                let mask = expand_mask(m, bw);
                assert_eq!(mask.len(), bw as usize);
                assert_eq!(compress_mask(&mask), m, "bw={bw} m={m}");
            }
        }
    }

    #[test]
    fn bit_zero_of_mask_is_msb_of_integer() {
        let mask = expand_mask(0b1010, 4);
        assert_eq!(mask, vec![true, false, true, false]);
    }
}
