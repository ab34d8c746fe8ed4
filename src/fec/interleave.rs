//! Block interleaver: `loc = (n * increment) mod size` (§4.4).
//!
//! Generic over the element type so the same block-shuffle logic serves
//! both the hard-bit TX path and the soft-float RX path (Codec110D
//! deinterleaves accumulated `f64` soft bits one block at a time).

use crate::errors::FecError;

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Pad `items` with trailing `T::default()` to the next multiple of `size`.
pub fn pad_to_multiple<T: Copy + Default>(items: &[T], size: usize) -> Vec<T> {
    let mut out = items.to_vec();
    let rem = out.len() % size;
    if rem != 0 {
        out.extend(std::iter::repeat(T::default()).take(size - rem));
    }
    out
}

fn check_params(len: usize, size: usize, increment: usize) -> Result<(), FecError> {
    if size == 0 || len % size != 0 {
        return Err(FecError::BlockSizeMisalignment { len, size });
    }
    if gcd(increment, size) != 1 {
        return Err(FecError::NonCoprimeIncrement { increment, size });
    }
    Ok(())
}

/// Interleave `items` (already padded to a multiple of `size`) one block at
/// a time: element `n` of a block is written to position
/// `(n*increment) mod size`.
pub fn interleave<T: Copy + Default>(
    items: &[T],
    size: usize,
    increment: usize,
) -> Result<Vec<T>, FecError> {
    check_params(items.len(), size, increment)?;
    let mut out = vec![T::default(); items.len()];
    for block_start in (0..items.len()).step_by(size) {
        let block = &items[block_start..block_start + size];
        for (n, &item) in block.iter().enumerate() {
            let loc = (n * increment) % size;
            out[block_start + loc] = item;
        }
    }
    Ok(out)
}

/// Inverse of [`interleave`]: output position `n` reads from
/// `(n*increment) mod size` within each block.
pub fn deinterleave<T: Copy + Default>(
    items: &[T],
    size: usize,
    increment: usize,
) -> Result<Vec<T>, FecError> {
    check_params(items.len(), size, increment)?;
    let mut out = vec![T::default(); items.len()];
    for block_start in (0..items.len()).step_by(size) {
        let block = &items[block_start..block_start + size];
        for n in 0..size {
            let loc = (n * increment) % size;
            out[block_start + n] = block[loc];
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_identity_modulo_padding() {
        let bits: Vec<u8> = (0..37).map(|i| (i % 3 == 0) as u8).collect();
        let size = 16;
        let increment = 5; // gcd(5,16) == 1
        let padded = pad_to_multiple(&bits, size);
        let interleaved = interleave(&padded, size, increment).unwrap();
        let deinterleaved = deinterleave(&interleaved, size, increment).unwrap();
        assert_eq!(deinterleaved, padded);
        assert_eq!(&deinterleaved[..bits.len()], &bits[..]);
    }

    #[test]
    fn round_trip_over_soft_floats() {
        let soft: Vec<f64> = (0..32).map(|i| i as f64 * 0.5).collect();
        let interleaved = interleave(&soft, 16, 5).unwrap();
        let deinterleaved = deinterleave(&interleaved, 16, 5).unwrap();
        assert_eq!(deinterleaved, soft);
    }

    #[test]
    fn rejects_non_coprime_increment() {
        let bits = vec![0u8; 16];
        assert!(interleave(&bits, 16, 4).is_err());
    }

    #[test]
    fn rejects_misaligned_length() {
        let bits = vec![0u8; 15];
        assert!(interleave(&bits, 16, 5).is_err());
    }
}
