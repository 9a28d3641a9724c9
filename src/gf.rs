//! GF(2^8) Arithmetic & Reed-Solomon Encoding Kernel
//!
//! Implements the field arithmetic and Cauchy-matrix Reed-Solomon encode
//! kernel that the TR encoder builds its parity and repair traces on top of.
//! The multiply tables here are hand-rolled and table-driven, built against
//! the standard Reed-Solomon primitive polynomial
//! `x^8 + x^4 + x^3 + x^2 + 1` (0x11D).

use crate::error::{Error, Result};
use once_cell::sync::Lazy;

/// Size of the Galois field, `2^8`.
pub const FIELD_SIZE: usize = 256;

/// Primitive polynomial for GF(2^8): `x^8 + x^4 + x^3 + x^2 + 1`.
const PRIMITIVE_POLY: u16 = 0x11D;

/// A generator of the multiplicative group of GF(2^8) under `PRIMITIVE_POLY`.
const GENERATOR: u8 = 0x03;

struct ExpLogTables {
    /// `exp[i] = GENERATOR^i`, doubled in length to avoid a modulo on lookup.
    exp: [u8; 512],
    /// `log[x] = i` such that `GENERATOR^i == x`, for `x != 0`. `log[0]` is unused.
    log: [u8; 256],
}

fn build_exp_log_tables() -> ExpLogTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..255usize {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
    }
    for i in 255..512 {
        exp[i] = exp[i - 255];
    }

    debug_assert_eq!(exp[0], 1, "GENERATOR^0 must be 1");
    ExpLogTables { exp, log }
}

static TABLES: Lazy<ExpLogTables> = Lazy::new(build_exp_log_tables);

/// Multiply two GF(2^8) elements.
#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let la = TABLES.log[a as usize] as usize;
    let lb = TABLES.log[b as usize] as usize;
    TABLES.exp[la + lb]
}

/// Raise a GF(2^8) element to a non-negative power.
pub fn gf_pow(a: u8, e: u32) -> u8 {
    if e == 0 {
        return 1;
    }
    if a == 0 {
        return 0;
    }
    let la = TABLES.log[a as usize] as u32;
    let exponent = (la * e) % 255;
    TABLES.exp[exponent as usize]
}

/// Multiplicative inverse of a non-zero GF(2^8) element.
///
/// Used only by static-table precomputation (`crate::tables`); neither the
/// encoder nor the decoder invert matrices at run time (see DESIGN.md).
pub fn gf_inv(a: u8) -> u8 {
    assert!(a != 0, "0 has no multiplicative inverse in GF(2^8)");
    gf_pow(a, 254)
}

/// `parity8(x)` is the XOR of the 8 bits of `x`, i.e. `popcount(x) mod 2`.
///
/// Backed by a 256-entry lookup table computed once, so the repair-trace
/// encoder and decoder never recompute popcount per byte.
static PARITY_TABLE: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for (x, slot) in table.iter_mut().enumerate() {
        *slot = (x as u8).count_ones() % 2 == 1;
    }
    table
});

#[inline]
pub fn parity8(x: u8) -> bool {
    PARITY_TABLE[x as usize]
}

/// A row-major `rows x cols` matrix over GF(2^8).
pub type Matrix = Vec<Vec<u8>>;

/// Generate an `n x k` Cauchy-style Reed-Solomon generator matrix whose top
/// `k x k` block is the identity (systematic code) and whose bottom
/// `(n - k) x k` block is an MDS Cauchy matrix.
///
/// Construction: `matrix[r][c] = 1 / (r XOR c)` for parity row `r` (`r >= k`)
/// and data column `c` (`c < k`); since `r != c` always, `r XOR c != 0` and
/// the inverse exists. This is the same simplified Cauchy construction used
/// by mainstream Rust Reed-Solomon implementations.
pub fn gen_cauchy_matrix(n: usize, k: usize) -> Result<Matrix> {
    if k == 0 || n <= k {
        return Err(Error::InvalidArgument(format!(
            "invalid cauchy matrix shape: n={n}, k={k}"
        )));
    }
    if n >= FIELD_SIZE {
        return Err(Error::InvalidArgument(format!(
            "n={n} must be < field size {FIELD_SIZE}"
        )));
    }

    let mut matrix = vec![vec![0u8; k]; n];
    for (r, row) in matrix.iter_mut().enumerate().take(k) {
        row[r] = 1;
    }
    for r in k..n {
        for c in 0..k {
            let denom = (r ^ c) as u8;
            matrix[r][c] = gf_inv(denom);
        }
    }
    Ok(matrix)
}

/// Precomputed multiply tables for the parity rows of a generator matrix.
///
/// Two 16-entry nibble tables per `(parity, data)` coefficient, so a
/// multiply-add can be done as two table lookups and an XOR instead of a
/// log/antilog round trip. Total size is `n * k * 32` bytes, even though
/// only the bottom `m` rows are ever read by [`encode_data`] (the top `k`
/// rows are the identity and never re-encoded).
pub struct GfTables {
    k: usize,
    n: usize,
    /// `low[row * k + col][x]` = `mul(matrix[row][col], x)` for `x in 0..16`.
    low: Vec<[u8; 16]>,
    /// `high[row * k + col][x]` = `mul(matrix[row][col], x << 4)` for `x in 0..16`.
    high: Vec<[u8; 16]>,
}

impl GfTables {
    fn coef_tables(coef: u8) -> ([u8; 16], [u8; 16]) {
        let mut low = [0u8; 16];
        let mut high = [0u8; 16];
        for x in 0..16u8 {
            low[x as usize] = gf_mul(coef, x);
            high[x as usize] = gf_mul(coef, x << 4);
        }
        (low, high)
    }

    #[inline]
    fn mul_by(&self, row: usize, col: usize, x: u8) -> u8 {
        let idx = row * self.k + col;
        self.low[idx][(x & 0x0F) as usize] ^ self.high[idx][(x >> 4) as usize]
    }
}

/// Precompute [`GfTables`] for an `n x k` generator matrix.
pub fn init_tables(k: usize, m: usize, matrix: &Matrix) -> Result<GfTables> {
    let n = k + m;
    if matrix.len() != n || matrix.iter().any(|row| row.len() != k) {
        return Err(Error::InvalidArgument(format!(
            "matrix shape mismatch: expected {n}x{k}"
        )));
    }

    let mut low = Vec::with_capacity(n * k);
    let mut high = Vec::with_capacity(n * k);
    for row in matrix {
        for &coef in row {
            let (l, h) = GfTables::coef_tables(coef);
            low.push(l);
            high.push(h);
        }
    }

    Ok(GfTables { k, n, low, high })
}

/// RS-encode `k` data shards into `m` parity shards using precomputed
/// [`GfTables`].
///
/// `out[p][b] = XOR over d in 0..k of mul(coef(k + p, d), data_in[d][b])`.
/// Parity buffers are zeroed before accumulation. Inputs and outputs may be
/// arbitrary-length slices as long as every data input and every output
/// buffer is at least `l` bytes; callers that need a per-buffer offset slice
/// their buffer before calling (see `encoder.rs`).
pub fn encode_data(tables: &GfTables, l: usize, data_in: &[&[u8]], out: &mut [&mut [u8]]) -> Result<()> {
    let k = tables.k;
    let m = tables.n - tables.k;

    if data_in.len() != k {
        return Err(Error::InvalidArgument(format!(
            "expected {k} data inputs, got {}",
            data_in.len()
        )));
    }
    if out.len() != m {
        return Err(Error::InvalidArgument(format!(
            "expected {m} parity outputs, got {}",
            out.len()
        )));
    }
    for (i, buf) in data_in.iter().enumerate() {
        if buf.len() < l {
            return Err(Error::InvalidArgument(format!(
                "data input {i} shorter than encode length {l}"
            )));
        }
    }
    for (i, buf) in out.iter().enumerate() {
        if buf.len() < l {
            return Err(Error::InvalidArgument(format!(
                "parity output {i} shorter than encode length {l}"
            )));
        }
    }

    for (p, out_buf) in out.iter_mut().enumerate() {
        let row = k + p;
        for b in out_buf.iter_mut().take(l) {
            *b = 0;
        }
        for (d, data_buf) in data_in.iter().enumerate() {
            for b in 0..l {
                out_buf[b] ^= tables.mul_by(row, d, data_buf[b]);
            }
        }
    }

    Ok(())
}
