//! ALE FEC pipeline: conv-with-flush -> 12x16 matrix interleave -> dibit to
//! tribit repacking for 8-PSK (§4.11).
//!
//! Unlike 110D's cyclic `loc = (n*increment) mod size` block interleaver,
//! ALE's 12x16 interleaver is a literal row-write/column-read matrix, so it
//! gets its own small transpose here rather than reusing [`crate::fec::interleave`].

use crate::errors::FecError;
use crate::fec::{self, interleave};
use crate::tables::ConstraintLength;

const FLUSH_BITS: usize = 6; // K-1 for K=7
const ROWS: usize = 12;
const COLS: usize = 16;
const MATRIX_CELLS: usize = ROWS * COLS; // 192 dibits = 384 bits
const TRIBIT_BITS: usize = MATRIX_CELLS * 2; // 384
const CONSTRAINT: ConstraintLength = ConstraintLength::K7;

fn pack_dibits(bits: &[u8]) -> Vec<u8> {
    bits.chunks(2)
        .map(|pair| (pair[0] << 1) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn unpack_dibits(dibits: &[u8]) -> Vec<u8> {
    dibits.iter().flat_map(|&d| [(d >> 1) & 1, d & 1]).collect()
}

/// Row-write, column-read transpose of a `rows x cols` matrix.
fn interleave_matrix<T: Copy + Default>(input: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = input[r * cols + c];
        }
    }
    out
}

/// Inverse of [`interleave_matrix`]: column-write, row-read.
fn deinterleave_matrix<T: Copy + Default>(input: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = vec![T::default(); rows * cols];
    for c in 0..cols {
        for r in 0..rows {
            out[r * cols + c] = input[c * rows + r];
        }
    }
    out
}

fn bits_to_tribits(bits: &[u8]) -> Vec<u8> {
    let padded = interleave::pad_to_multiple(bits, 3);
    padded
        .chunks(3)
        .map(|chunk| (chunk[0] << 2) | (chunk[1] << 1) | chunk[2])
        .collect()
}

/// Number of interleaved bits a PDU's FEC pipeline produces (§4.11: `12x16x2`).
pub const CODED_BIT_LEN: usize = TRIBIT_BITS;

/// Encode 96 payload bits through conv-with-flush and the 12x16 matrix
/// interleaver, returning the flat 384-bit stream before any symbol
/// grouping. WALE's Walsh-16/BPSK data layers consume this directly
/// (§4.12); [`encode`] groups it into 8-PSK tribits for the narrowband
/// ALE channel (§4.11).
pub fn encode_bits(bits: &[u8]) -> Vec<u8> {
    let coded = fec::encode_zero_tail(bits, CONSTRAINT);
    let dibits = pack_dibits(&coded);
    let padded = interleave::pad_to_multiple(&dibits, MATRIX_CELLS);
    let interleaved = interleave_matrix(&padded, ROWS, COLS);
    let flat_bits = unpack_dibits(&interleaved);
    debug_assert_eq!(flat_bits.len(), TRIBIT_BITS);
    flat_bits
}

/// Encode 96 payload bits (one ALE PDU) into 8-PSK tribit symbols.
pub fn encode(bits: &[u8]) -> Vec<u8> {
    bits_to_tribits(&encode_bits(bits))
}

/// Decode the flat 384 per-bit soft stream (already deinterleaved source
/// order restored by the matrix deinterleave) back to the original 96
/// payload bits, running Viterbi once over the un-padded coded-bit prefix.
pub fn decode_bits(bits_soft: &[f64]) -> Result<Vec<u8>, FecError> {
    if bits_soft.len() != TRIBIT_BITS {
        return Err(FecError::BlockSizeMisalignment {
            len: bits_soft.len(),
            size: TRIBIT_BITS,
        });
    }
    let deinterleaved_bits_soft = {
        // Work in dibit-sized pairs for the matrix transpose (the matrix
        // only reorders positions, so soft values carry straight through
        // by deinterleaving their positions instead of hard bits).
        let dibit_positions: Vec<[f64; 2]> = bits_soft.chunks(2).map(|p| [p[0], p[1]]).collect();
        deinterleave_matrix(&dibit_positions, ROWS, COLS)
            .into_iter()
            .flatten()
            .collect::<Vec<f64>>()
    };
    let payload_coded_bits = 2 * (96 + FLUSH_BITS);
    let soft = &deinterleaved_bits_soft[..payload_coded_bits];
    let decoded = fec::viterbi_decode(soft, CONSTRAINT)?;
    Ok(decoded[..decoded.len() - FLUSH_BITS].to_vec())
}

/// Decode 8-PSK tribit soft symbols (one soft triple per tribit) back to
/// the original 96 payload bits.
pub fn decode(tribit_soft: &[f64]) -> Result<Vec<u8>, FecError> {
    decode_bits(tribit_soft)
}

/// Unpack 8-PSK tribit soft symbols into per-bit soft values (`+1.0` hard
/// `0`, `-1.0` hard `1`), the same convention as [`crate::codec110d`].
pub fn tribit_symbols_to_soft_bits(symbols: &[u8]) -> Vec<f64> {
    symbols
        .iter()
        .flat_map(|&sym| {
            (0..3).rev().map(move |shift| {
                if (sym >> shift) & 1 == 0 {
                    1.0
                } else {
                    -1.0
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_128_tribit_symbols() {
        let bits: Vec<u8> = (0..96).map(|i| (i * 3 % 7 == 0) as u8).collect();
        let symbols = encode(&bits);
        assert_eq!(symbols.len(), 128);
        assert!(symbols.iter().all(|&s| s <= 7));
    }

    #[test]
    fn round_trip_noise_free() {
        let bits: Vec<u8> = (0..96).map(|i| ((i * 11 + 5) % 4 == 0) as u8).collect();
        let symbols = encode(&bits);
        let soft = tribit_symbols_to_soft_bits(&symbols);
        let decoded = decode(&soft).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn rejects_wrong_length_soft_buffer() {
        assert!(decode(&[1.0; 10]).is_err());
    }
}
