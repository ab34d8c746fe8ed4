//! 110D Codec: TX single-pass encode, RX accumulate-then-flush decode
//! (§4.6).
//!
//! TX: optional EOM append -> tail-biting conv encode -> puncture ->
//! block interleave -> symbol map. RX holds per-block soft bits
//! (deinterleave then depuncture) across the whole reception and runs
//! Viterbi exactly once at [`Decoder::flush`] — tail-biting's rotation
//! closure requires the complete code block (§9 "per-block vs whole-block
//! Viterbi").
//!
//! `pad_to_multiple` in [`Encoder::encode`] block-aligns the punctured
//! bitstream to the interleaver's `coded_bits`, so the accumulated RX
//! buffer is almost always longer than the true pre-pad code block.
//! Running Viterbi over the padded length closes the tail-biting trellis
//! on the wrong cycle length and rotates the wrong bits into the front of
//! the message, so `flush` must truncate to the true length before
//! decoding — exactly the truncation [`crate::ale::encoding::decode_bits`]
//! already does against its fixed PDU size.

use num_complex::Complex64;

use crate::eom;
use crate::errors::{FrameError, ModemError};
use crate::fec::{interleave, puncture::Puncturer, viterbi};
use crate::tables::{Bandwidth, Constellation, ConstraintLength, InterleaverParams, InterleaverType, Waveform};

/// Pack MSB-first bits into symbol values of `bits_per_symbol` bits each,
/// zero-padding the final partial symbol.
fn bits_to_symbols(bits: &[u8], bits_per_symbol: usize) -> Vec<u8> {
    bits.chunks(bits_per_symbol)
        .map(|chunk| {
            let mut value = 0u8;
            for i in 0..bits_per_symbol {
                let bit = chunk.get(i).copied().unwrap_or(0);
                value = (value << 1) | bit;
            }
            value
        })
        .collect()
}

/// Unpack symbol values back to MSB-first soft bit values (`+1.0` for a
/// hard `0`, `-1.0` for a hard `1`); the actual analog demodulation is the
/// external `UnifiedDemod`'s job (§6), this only unpacks its hard symbols.
pub fn symbols_to_soft_bits(symbols: &[u8], bits_per_symbol: usize) -> Vec<f64> {
    symbols
        .iter()
        .flat_map(|&sym| {
            (0..bits_per_symbol).rev().map(move |shift| {
                let bit = (sym >> shift) & 1;
                if bit == 0 {
                    1.0
                } else {
                    -1.0
                }
            })
        })
        .collect()
}

/// Symbol-demap stage of the RX path (§4.6): nearest-point hard decision
/// against `constellation`, then unpack to soft bit values. Consumed by
/// [`crate::rx110d`] after mini-probe channel correction has produced
/// corrected complex IQ for a frame's data symbols.
pub fn points_to_soft_bits(points: &[Complex64], constellation: Constellation) -> Vec<f64> {
    let symbols: Vec<u8> = points.iter().map(|&p| constellation.point_to_symbol(p)).collect();
    symbols_to_soft_bits(&symbols, constellation.bits_per_symbol() as usize)
}

/// Map hard symbol values to the constellation's IQ points (§4.6 TX symbol
/// map, complex-domain form used when [`crate::tx110d`] needs to hand data
/// symbols to a channel model rather than an external `UnifiedMod`).
pub fn symbols_to_points(symbols: &[u8], constellation: Constellation) -> Vec<Complex64> {
    symbols.iter().map(|&s| constellation.symbol_to_point(s)).collect()
}

/// Bit count of the tail-biting input block `Encoder::encode` actually ran
/// (the `bits_len`-bit payload plus the 32-bit EOM sentinel when present).
/// Callers that know the true message length pass this to
/// [`Decoder::flush`] so it can truncate the padded RX buffer before
/// decoding.
pub fn framed_len(bits_len: usize, use_eom: bool) -> usize {
    if use_eom {
        bits_len + eom::EOM_BITS
    } else {
        bits_len
    }
}

struct Params {
    waveform: Waveform,
    constraint: ConstraintLength,
    interleaver: InterleaverParams,
    puncturer: Puncturer,
}

impl Params {
    fn new(
        waveform: Waveform,
        bandwidth: Bandwidth,
        interleaver: InterleaverType,
        constraint: ConstraintLength,
    ) -> Result<Self, ModemError> {
        let interleaver = crate::tables::interleaver_params(waveform, interleaver, bandwidth)?;
        let puncturer = Puncturer::new(waveform.code_rate())?;
        Ok(Self {
            waveform,
            constraint,
            interleaver,
            puncturer,
        })
    }

    /// Rate-1/2 coded bits per interleaver block, before puncturing.
    fn raw_block_len(&self) -> usize {
        2 * self.interleaver.input_bits
    }
}

/// Single-pass TX encoder.
pub struct Encoder {
    params: Params,
}

impl Encoder {
    pub fn new(
        waveform: Waveform,
        bandwidth: Bandwidth,
        interleaver: InterleaverType,
        constraint: ConstraintLength,
    ) -> Result<Self, ModemError> {
        Ok(Self {
            params: Params::new(waveform, bandwidth, interleaver, constraint)?,
        })
    }

    /// Encode `bits` (optionally EOM-terminated) into channel symbols.
    pub fn encode(&self, bits: &[u8], use_eom: bool) -> Result<Vec<u8>, ModemError> {
        let framed = if use_eom {
            eom::append_eom(bits)
        } else {
            bits.to_vec()
        };
        let coded = crate::fec::encode_tail_biting(&framed, self.params.constraint)?;
        let punctured = self.params.puncturer.puncture(&coded);
        let size = self.params.interleaver.coded_bits;
        let padded = interleave::pad_to_multiple(&punctured, size);
        let interleaved = interleave::interleave(&padded, size, self.params.interleaver.increment)?;
        Ok(bits_to_symbols(
            &interleaved,
            self.params.waveform.bits_per_symbol() as usize,
        ))
    }
}

/// Result of [`Decoder::flush`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedOutput {
    pub data: Vec<u8>,
    pub eom_detected_at: Option<usize>,
}

/// RX accumulate-then-flush decoder.
pub struct Decoder {
    params: Params,
    soft_buffer: Vec<f64>,
}

impl Decoder {
    pub fn new(
        waveform: Waveform,
        bandwidth: Bandwidth,
        interleaver: InterleaverType,
        constraint: ConstraintLength,
    ) -> Result<Self, ModemError> {
        Ok(Self {
            params: Params::new(waveform, bandwidth, interleaver, constraint)?,
            soft_buffer: Vec::new(),
        })
    }

    /// Feed one interleaver block's worth of soft bits (already symbol
    /// demapped). Deinterleaves and depunctures it, appending the result to
    /// the running soft-bit buffer.
    pub fn decode_block(&mut self, interleaved_soft: &[f64]) -> Result<(), ModemError> {
        let size = self.params.interleaver.coded_bits;
        if interleaved_soft.len() != size {
            return Err(FrameError::InsufficientSymbols {
                required: size,
                available: interleaved_soft.len(),
            }
            .into());
        }
        let deinterleaved =
            interleave::deinterleave(interleaved_soft, size, self.params.interleaver.increment)?;
        let depunctured = self
            .params
            .puncturer
            .depuncture(&deinterleaved, self.params.raw_block_len());
        self.soft_buffer.extend(depunctured);
        Ok(())
    }

    /// Run Viterbi over the true pre-pad code block, rotate the
    /// tail-biting preload back into place, and scan for EOM. Clears the
    /// buffer so the decoder is ready for the next reception.
    ///
    /// `framed_bits`, when the caller knows it (the value
    /// [`framed_len`] returns for the original message), is the exact
    /// fix: the accumulated buffer is truncated to `2 * framed_bits` raw
    /// bits before Viterbi runs, so block-alignment padding never reaches
    /// the trellis. When it's `None` — the live RX path, which has no
    /// side channel for the original length — an initial decode over the
    /// whole (over-long) buffer is used only to locate the EOM sentinel,
    /// then the buffer is re-decoded truncated to that length for the
    /// authoritative result. A transmission with no EOM and an unknown
    /// caller-side length can't be disambiguated this way; callers of
    /// non-EOM messages must supply `framed_bits`.
    pub fn flush(&mut self, framed_bits: Option<usize>) -> Result<DecodedOutput, ModemError> {
        let target = framed_bits.map(|n| 2 * n);
        let result = self.decode_truncated(target)?;
        let result = match (framed_bits, result.eom_detected_at) {
            (None, Some(eom_pos)) => self.decode_truncated(Some(2 * (eom_pos + eom::EOM_BITS)))?,
            _ => result,
        };
        self.soft_buffer.clear();
        Ok(result)
    }

    /// Decode the soft buffer's first `raw_bits` bits (the whole buffer if
    /// `None` or longer than what's accumulated), then rotate and scan.
    fn decode_truncated(&self, raw_bits: Option<usize>) -> Result<DecodedOutput, ModemError> {
        let len = raw_bits.unwrap_or(self.soft_buffer.len()).min(self.soft_buffer.len());
        let decoded = viterbi::decode(&self.soft_buffer[..len], self.params.constraint)?;
        let rotated = viterbi::rotate_tail_biting(&decoded, self.params.constraint);
        let scanned = eom::scan(&rotated);
        Ok(DecodedOutput {
            data: scanned.data,
            eom_detected_at: scanned.eom_detected_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Bandwidth;

    fn hard_bits_to_soft(symbols: &[u8], bps: usize) -> Vec<f64> {
        symbols_to_soft_bits(symbols, bps)
    }

    #[test]
    fn complex_symbol_map_round_trips_noise_free() {
        for c in [Constellation::Qpsk, Constellation::Psk8, Constellation::Qam64] {
            let m = 1u32 << c.bits_per_symbol();
            let symbols: Vec<u8> = (0..m as u8).collect();
            let points = symbols_to_points(&symbols, c);
            let soft = points_to_soft_bits(&points, c);
            let hard: Vec<u8> = soft.iter().map(|&v| (v < 0.0) as u8).collect();
            let expected: Vec<u8> = symbols_to_soft_bits(&symbols, c.bits_per_symbol() as usize)
                .iter()
                .map(|&v| (v < 0.0) as u8)
                .collect();
            assert_eq!(hard, expected);
        }
    }

    #[test]
    fn codec_round_trip_without_eom() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let interleaver_type = InterleaverType::Short;
        let constraint = ConstraintLength::K7;

        let enc = Encoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        let bits: Vec<u8> = (0..1000).map(|i| ((i * 13 + 1) % 5 == 0) as u8).collect();
        let symbols = enc.encode(&bits, false).unwrap();

        let bps = waveform.bits_per_symbol() as usize;
        let block_symbols = enc.params.interleaver.coded_bits / bps;
        let mut dec = Decoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        for chunk in symbols.chunks(block_symbols) {
            let soft = hard_bits_to_soft(chunk, bps);
            dec.decode_block(&soft).unwrap();
        }
        let out = dec.flush(Some(framed_len(bits.len(), false))).unwrap();
        assert_eq!(&out.data[..bits.len()], &bits[..]);
    }

    #[test]
    fn codec_round_trip_with_eom() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let interleaver_type = InterleaverType::Short;
        let constraint = ConstraintLength::K7;

        let enc = Encoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        let bits: Vec<u8> = (0..2000).map(|i| ((i * 7 + 2) % 3 == 0) as u8).collect();
        let symbols = enc.encode(&bits, true).unwrap();

        let bps = waveform.bits_per_symbol() as usize;
        let block_symbols = enc.params.interleaver.coded_bits / bps;
        let mut dec = Decoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        for chunk in symbols.chunks(block_symbols) {
            let soft = hard_bits_to_soft(chunk, bps);
            dec.decode_block(&soft).unwrap();
        }
        let out = dec.flush(Some(framed_len(bits.len(), true))).unwrap();
        assert!(out.eom_detected_at.is_some());
        assert_eq!(out.data, bits);
    }

    #[test]
    fn codec_round_trip_with_eom_unknown_length_uses_sentinel() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let interleaver_type = InterleaverType::Short;
        let constraint = ConstraintLength::K7;

        let enc = Encoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        let bits: Vec<u8> = (0..600).map(|i| ((i * 11 + 3) % 4 == 0) as u8).collect();
        let symbols = enc.encode(&bits, true).unwrap();

        let bps = waveform.bits_per_symbol() as usize;
        let block_symbols = enc.params.interleaver.coded_bits / bps;
        let mut dec = Decoder::new(waveform, bandwidth, interleaver_type, constraint).unwrap();
        for chunk in symbols.chunks(block_symbols) {
            let soft = hard_bits_to_soft(chunk, bps);
            dec.decode_block(&soft).unwrap();
        }
        let out = dec.flush(None).unwrap();
        assert!(out.eom_detected_at.is_some());
        assert_eq!(out.data, bits);
    }
}
