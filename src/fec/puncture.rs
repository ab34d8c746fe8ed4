//! Puncture/repetition stage (§4.3, TABLE D-L).
//!
//! A single even-distribution formula covers both directions: for rate
//! `num/den`, lay a period of `2*num` coded-bit lanes (one conv cycle is
//! `num` input bits / `2*num` coded bits at the underlying rate-1/2 code)
//! and distribute `den` "keep" units across those lanes as evenly as
//! possible (`counts[i] = (i+1)*den/period - i*den/period`, a Bresenham-
//! style spread). When `den <= period` this selects a 0/1 puncture pattern;
//! when `den > period` it yields a per-lane repeat count. For
//! `{1/8, 1/6, 1/4}` the formula reduces to exactly repeating each G1/G2
//! pair N times; `1/3` is the same formula applied to the one non-integer
//! case (documented in DESIGN.md).

use crate::errors::FecError;
use crate::tables::CodeRate;

/// The fourteen supported code rates (1/2 passthrough plus TABLE D-L).
const SUPPORTED_RATES: &[(u32, u32)] = &[
    (1, 2),
    (1, 8),
    (1, 6),
    (1, 4),
    (1, 3),
    (3, 4),
    (2, 3),
    (9, 16),
    (9, 10),
    (8, 9),
    (5, 6),
    (4, 5),
    (4, 7),
    (15, 16),
];

pub struct Puncturer {
    rate: CodeRate,
    period: usize,
    counts: Vec<usize>,
}

impl Puncturer {
    pub fn new(rate: CodeRate) -> Result<Self, FecError> {
        if !SUPPORTED_RATES.contains(&(rate.numerator, rate.denominator)) {
            return Err(FecError::UnsupportedRate {
                numerator: rate.numerator,
                denominator: rate.denominator,
            });
        }
        // 15/16 has no literal puncture table in the source; approximate
        // with the 9/10 pattern (§9 open question).
        let effective = if (rate.numerator, rate.denominator) == (15, 16) {
            CodeRate::new(9, 10)
        } else {
            rate
        };

        let period = 2 * effective.numerator as usize;
        let kept = effective.denominator as usize;
        let counts = (0..period)
            .map(|i| ((i + 1) * kept) / period - (i * kept) / period)
            .collect();

        Ok(Self {
            rate,
            period,
            counts,
        })
    }

    pub fn rate(&self) -> CodeRate {
        self.rate
    }

    /// Length the puncturer produces from `coded_len` rate-1/2 coded bits.
    pub fn punctured_length(&self, coded_len: usize) -> usize {
        (0..coded_len).map(|idx| self.counts[idx % self.period]).sum()
    }

    /// Apply the pattern: drop lanes with count 0, repeat lanes with count
    /// `> 1`.
    pub fn puncture(&self, coded: &[u8]) -> Vec<u8> {
        coded
            .iter()
            .enumerate()
            .flat_map(|(idx, &bit)| {
                let count = self.counts[idx % self.period];
                std::iter::repeat(bit).take(count)
            })
            .collect()
    }

    /// Undo the pattern against soft values: erasures (`0.0`) at punctured
    /// lanes, element-wise average at repeated lanes.
    pub fn depuncture(&self, received: &[f64], coded_len: usize) -> Vec<f64> {
        let mut out = vec![0.0_f64; coded_len];
        let mut ri = 0usize;
        for idx in 0..coded_len {
            let count = self.counts[idx % self.period];
            if count == 0 {
                continue;
            }
            let sum: f64 = received[ri..ri + count].iter().sum();
            out[idx] = sum / count as f64;
            ri += count;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_half_is_passthrough() {
        let p = Puncturer::new(CodeRate::new(1, 2)).unwrap();
        let coded = vec![1u8, 0, 1, 1, 0, 0];
        assert_eq!(p.puncture(&coded), coded);
        assert_eq!(p.punctured_length(coded.len()), coded.len());
    }

    #[test]
    fn repetition_rates_match_spec_wording() {
        let p18 = Puncturer::new(CodeRate::new(1, 8)).unwrap();
        assert_eq!(p18.puncture(&[1, 0]), vec![1, 1, 1, 1, 0, 0, 0, 0]);
        let p16 = Puncturer::new(CodeRate::new(1, 6)).unwrap();
        assert_eq!(p16.puncture(&[1, 0]), vec![1, 1, 1, 0, 0, 0]);
        let p14 = Puncturer::new(CodeRate::new(1, 4)).unwrap();
        assert_eq!(p14.puncture(&[1, 0]), vec![1, 1, 0, 0]);
    }

    #[test]
    fn puncture_depuncture_round_trip_preserves_length_parity() {
        for &(num, den) in &[(1u32, 2u32), (3, 4), (2, 3), (5, 6)] {
            let p = Puncturer::new(CodeRate::new(num, den)).unwrap();
            let coded: Vec<u8> = (0..p.period * 4).map(|i| (i % 2) as u8).collect();
            let punctured = p.puncture(&coded);
            assert_eq!(punctured.len(), p.punctured_length(coded.len()));

            let soft: Vec<f64> = punctured
                .iter()
                .map(|&b| if b == 0 { 1.0 } else { -1.0 })
                .collect();
            let depunctured = p.depuncture(&soft, coded.len());
            assert_eq!(depunctured.len(), coded.len());
        }
    }

    #[test]
    fn unsupported_rate_is_rejected() {
        assert!(Puncturer::new(CodeRate::new(1, 5)).is_err());
    }
}
