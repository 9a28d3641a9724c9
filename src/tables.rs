//! Static lookup tables for trace-based single-shard repair.
//!
//! The helper/recovery/dual-basis tables are normally provided constants:
//! values whose semantics are fixed but whose population is precomputed
//! elsewhere. This module is that precomputation. It builds a concrete,
//! internally self-consistent instance of those tables for the fixed
//! profile `n=9, k=6, m=3, t=8` from the same Cauchy generator matrix
//! `gf::gen_cauchy_matrix` builds for plain RS encode, using ordinary
//! systematic-MDS single-erasure recovery (any `k` of the `n` stripe
//! positions determine the rest) expressed at the bit level.
//!
//! For each erased index `j`, exactly `k` of the other `n - 1` positions are
//! picked as "essential" helpers (the smallest `k` indices other than `j`);
//! for those, `bw(i, j) = t` and the helper/recovery rows carry the full byte
//! as a trace (via the identity bit-extraction `Hij[a] = 1 << a`) combined
//! through the GF(2)-linear companion matrix of the systematic recovery
//! coefficient. The remaining `n - 1 - k` "standby" helpers get `bw(i, j) =
//! 1` with an all-zero coefficient, contributing nothing — they exist
//! because the protocol always presents `n - 1` helper buffers to the
//! decoder, but this construction only needs `k` of them to actually carry
//! information. A bandwidth-optimal instantiation (e.g. a Hadamard-design
//! interference-alignment scheme) would shrink `bw` below `t` for most
//! pairs; see DESIGN.md for why this crate uses the simpler, provably
//! correct one instead.

use crate::error::{Error, Result};
use crate::gf::{self, Matrix};
use once_cell::sync::Lazy;
use serde::Serialize;

/// Total shards in a stripe.
pub const N: usize = 9;
/// Data shards.
pub const K: usize = 6;
/// Parity shards.
pub const M: usize = 3;
/// Trace bit-width: number of bits per repaired symbol.
pub const T: usize = 8;

/// Per-`(helper, erased)` coefficients used by the encoder/repair source to
/// project a shard byte into its repair-trace bits.
#[derive(Debug, Clone, Serialize)]
pub struct HelperRow {
    /// Number of trace bits this helper contributes for this erased index.
    pub bw: u8,
    /// `coeffs[a]` ANDed with the shard byte, then `parity8`'d, gives trace bit `a`.
    pub coeffs: Vec<u8>,
}

/// Per-`(helper, erased)` recovery coefficients used by the decoder to fold
/// helper trace bits into the `t` target trace bits for the erased shard.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryRow {
    /// Must equal the corresponding `HelperRow::bw` (validated in [`TableBundle::validate`]).
    pub bw: u8,
    /// `r[s]` is the `bw`-bit mask (see `crate::bits`) selecting which of
    /// this helper's trace bits feed into target trace bit `s`, for `s` in `0..T`.
    pub r: Vec<u32>,
}

/// The full set of static tables for the fixed `(n, k, m, t)` profile.
#[derive(Debug, Serialize)]
pub struct TableBundle {
    pub n: usize,
    pub k: usize,
    pub m: usize,
    pub t: usize,
    /// `helper[j][i]` for `i != j`; `helper[j][j]` is absent.
    helper: Vec<Vec<Option<HelperRow>>>,
    /// `recovery[j][i]` for `i != j`; `recovery[j][j]` is absent.
    recovery: Vec<Vec<Option<RecoveryRow>>>,
    /// `dual_basis[j]` is the 8-entry dual basis used to recombine recovered
    /// trace bits into a byte for erased index `j`.
    dual_basis: Vec<[u8; T]>,
    /// The underlying `n x k` Cauchy generator matrix encode/decode also use.
    pub generator: Matrix,
}

impl TableBundle {
    /// `bw(i, j)`: bits `helper_row(i, j)` contributes to repairing `j`.
    pub fn bandwidth(&self, i: usize, j: usize) -> Option<u8> {
        self.helper_row(i, j).map(|row| row.bw)
    }

    pub fn helper_row(&self, i: usize, j: usize) -> Option<&HelperRow> {
        if i == j {
            return None;
        }
        self.helper[j][i].as_ref()
    }

    pub fn recovery_row(&self, i: usize, j: usize) -> Option<&RecoveryRow> {
        if i == j {
            return None;
        }
        self.recovery[j][i].as_ref()
    }

    pub fn dual_basis(&self, j: usize) -> &[u8; T] {
        &self.dual_basis[j]
    }

    /// Essential helpers for erased index `j`: the positions whose
    /// `HelperRow` actually carries information (`bw > 0` with a non-zero
    /// coefficient set). Used by the coordinator to prioritize which
    /// helpers must answer for a repair to succeed.
    pub fn essential_helpers(&self, j: usize) -> Vec<usize> {
        (0..self.n)
            .filter(|&i| i != j)
            .filter(|&i| {
                self.helper_row(i, j)
                    .map(|row| row.coeffs.iter().any(|&c| c != 0))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Cross-check that every `(i, j)` pair agrees between the helper and
    /// recovery tables, and that every data-model invariant holds:
    /// `bw(i, j) >= 1`, `helper_row`/`recovery_row` undefined only on the
    /// diagonal, and the recovery ints fit within their declared bandwidth.
    pub fn validate(&self) -> Result<()> {
        for j in 0..self.n {
            for i in 0..self.n {
                if i == j {
                    if self.helper_row(i, j).is_some() || self.recovery_row(i, j).is_some() {
                        return Err(Error::Internal(format!(
                            "diagonal entry ({i},{j}) must be undefined"
                        )));
                    }
                    continue;
                }
                let helper = self.helper_row(i, j).ok_or_else(|| {
                    Error::Internal(format!("missing helper row for ({i},{j})"))
                })?;
                let recovery = self.recovery_row(i, j).ok_or_else(|| {
                    Error::Internal(format!("missing recovery row for ({i},{j})"))
                })?;
                if helper.bw == 0 {
                    return Err(Error::Internal(format!("bw({i},{j}) must be >= 1")));
                }
                if helper.bw != recovery.bw {
                    return Err(Error::Internal(format!(
                        "bw mismatch at ({i},{j}): helper={} recovery={}",
                        helper.bw, recovery.bw
                    )));
                }
                if helper.coeffs.len() != helper.bw as usize {
                    return Err(Error::Internal(format!(
                        "helper_row({i},{j}) coeffs length != bw"
                    )));
                }
                if recovery.r.len() != self.t {
                    return Err(Error::Internal(format!(
                        "recovery_row({i},{j}) must carry t={} entries",
                        self.t
                    )));
                }
                let max = 1u32 << helper.bw;
                if recovery.r.iter().any(|&v| v >= max) {
                    return Err(Error::Internal(format!(
                        "recovery_row({i},{j}) has an int outside its declared bandwidth"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Dump the full table set as JSON, gated by the codec's verbose-dump
    /// flag (these tables are large and mostly useful for offline
    /// debugging, not production logs).
    pub fn dump(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("table dump failed: {e}")))
    }
}

/// The companion matrix (over GF(2)) of multiplication by `c` in GF(2^8):
/// `matrix[row][col] = bit_row(c * (1 << col))`.
fn companion_matrix(c: u8) -> [[bool; 8]; 8] {
    let mut out = [[false; 8]; 8];
    for col in 0..8u8 {
        let product = gf::gf_mul(c, 1 << col);
        for row in 0..8u8 {
            out[row as usize][col as usize] = (product >> row) & 1 == 1;
        }
    }
    out
}

/// Invert a `k x k` matrix over GF(2^8) via Gauss-Jordan elimination.
/// Used only here, at static-table build time; neither `encoder.rs` nor
/// `decoder.rs` invert matrices at run time (see DESIGN.md).
fn invert_square_matrix(matrix: &Matrix) -> Result<Matrix> {
    let n = matrix.len();
    let mut aug: Vec<Vec<u8>> = matrix
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut extended = row.clone();
            extended.extend((0..n).map(|c| if c == r { 1 } else { 0 }));
            extended
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).find(|&r| aug[r][col] != 0).ok_or_else(|| {
            Error::Internal("matrix is singular; cannot build recovery table".into())
        })?;
        aug.swap(col, pivot);

        let inv = gf::gf_inv(aug[col][col]);
        for v in aug[col].iter_mut() {
            *v = gf::gf_mul(*v, inv);
        }

        for r in 0..n {
            if r == col || aug[r][col] == 0 {
                continue;
            }
            let factor = aug[r][col];
            for c in 0..(2 * n) {
                aug[r][c] ^= gf::gf_mul(factor, aug[col][c]);
            }
        }
    }

    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// The smallest `k` indices in `0..n` other than `j`, ascending.
fn essential_set(n: usize, k: usize, j: usize) -> Vec<usize> {
    (0..n).filter(|&i| i != j).take(k).collect()
}

/// Systematic recovery coefficients for erased index `j`: for each helper in
/// `essential_set(n, k, j)`, the scalar to multiply that helper's shard byte
/// by (summed over GF(2^8) XOR) to recover shard `j`.
///
/// `recov = generator_row(j) * inverse(generator_rows(essential))`, which
/// specializes to a direct generator-row lookup when `j` is itself a parity
/// index (its essential set is exactly the `k` data positions, so the
/// matrix being inverted is the identity).
fn recovery_coefficients(generator: &Matrix, k: usize, j: usize, essential: &[usize]) -> Result<Vec<u8>> {
    let decode_matrix: Matrix = essential.iter().map(|&i| generator[i].clone()).collect();
    let inverse = invert_square_matrix(&decode_matrix)?;

    let mut out = vec![0u8; essential.len()];
    for (m, coef) in out.iter_mut().enumerate() {
        let mut acc = 0u8;
        for d in 0..k {
            acc ^= gf::gf_mul(generator[j][d], inverse[d][m]);
        }
        *coef = acc;
    }
    Ok(out)
}

fn build() -> Result<TableBundle> {
    let generator = gf::gen_cauchy_matrix(N, K)?;

    let mut helper: Vec<Vec<Option<HelperRow>>> = vec![vec![None; N]; N];
    let mut recovery: Vec<Vec<Option<RecoveryRow>>> = vec![vec![None; N]; N];

    for j in 0..N {
        let essential = essential_set(N, K, j);
        let coefs = recovery_coefficients(&generator, K, j, &essential)?;

        for i in 0..N {
            if i == j {
                continue;
            }
            if let Some(pos) = essential.iter().position(|&e| e == i) {
                let coef = coefs[pos];
                let companion = companion_matrix(coef);

                let helper_coeffs: Vec<u8> = (0..T as u8).map(|a| 1u8 << a).collect();
                helper[j][i] = Some(HelperRow {
                    bw: T as u8,
                    coeffs: helper_coeffs,
                });

                let r: Vec<u32> = (0..T)
                    .map(|s| {
                        let row: Vec<bool> = (0..8).map(|a| companion[s][a]).collect();
                        crate::bits::compress_mask(&row)
                    })
                    .collect();
                recovery[j][i] = Some(RecoveryRow { bw: T as u8, r });
            } else {
                helper[j][i] = Some(HelperRow {
                    bw: 1,
                    coeffs: vec![0],
                });
                recovery[j][i] = Some(RecoveryRow {
                    bw: 1,
                    r: vec![0; T],
                });
            }
        }
    }

    let dual_basis: Vec<[u8; T]> = (0..N)
        .map(|_| {
            let mut basis = [0u8; T];
            for (a, slot) in basis.iter_mut().enumerate() {
                *slot = 1u8 << a;
            }
            basis
        })
        .collect();

    Ok(TableBundle {
        n: N,
        k: K,
        m: M,
        t: T,
        helper,
        recovery,
        dual_basis,
        generator,
    })
}

/// The process-wide table instance for the `(9, 6, 3, 8)` profile, built
/// once on first access.
pub static TABLES: Lazy<TableBundle> = Lazy::new(|| build().expect("static table generation must succeed"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_validate() {
        TABLES.validate().unwrap();
    }

    #[test]
    fn bandwidth_is_never_zero() {
        for j in 0..N {
            for i in 0..N {
                if i == j {
                    continue;
                }
                assert!(TABLES.bandwidth(i, j).unwrap() >= 1);
            }
        }
    }

    #[test]
    fn every_erased_index_has_k_essential_helpers() {
        for j in 0..N {
            assert_eq!(TABLES.essential_helpers(j).len(), K);
        }
    }

    #[test]
    fn diagonal_entries_are_absent() {
        for j in 0..N {
            assert!(TABLES.helper_row(j, j).is_none());
            assert!(TABLES.recovery_row(j, j).is_none());
        }
    }
}
