//! Deep/Fast WALE frame assembly and decode (§4.12).
//!
//! `[TLC][capture probe 96 sym][preamble][data]`, all in the 8-PSK complex
//! domain like [`crate::miniprobe`]'s reference construction. Capture-probe
//! correlation against all 8 phase rotations resolves the frame's global
//! phase ambiguity before the Walsh-16 (Deep) or BPSK (Fast) data layer is
//! demodulated and handed to [`super::encoding`].

use std::f64::consts::FRAC_PI_4;

use num_complex::Complex64;

use crate::errors::{AleError, FecError};
use crate::tables::PnSequence;

use super::encoding::{self, CODED_BIT_LEN};
use super::walsh;

const TLC_LEN: usize = 32;
const CAPTURE_LEN: usize = 96;
const FAST_PROBE_LEN: usize = 32;
const FAST_DATA_GROUP: usize = 96;

/// Distinguishes the two WALE data layers (§4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaleMode {
    Deep,
    Fast,
}

impl WaleMode {
    fn preamble_len(self) -> usize {
        match self {
            WaleMode::Deep => 576,
            WaleMode::Fast => 288,
        }
    }
}

/// Infinite deterministic 8-PSK reference sequence (shared by TLC, capture
/// probe, preamble, and Fast's interleaved probes — each drawn from a
/// distinct absolute offset so the segments don't alias each other).
fn known_sequence(offset: usize, len: usize) -> Vec<Complex64> {
    let octants = PnSequence::Wid.octants();
    (offset..offset + len)
        .map(|i| Complex64::from_polar(1.0, octants[i % octants.len()] as f64 * FRAC_PI_4))
        .collect()
}

fn capture_probe_reference() -> Vec<Complex64> {
    known_sequence(TLC_LEN, CAPTURE_LEN)
}

fn preamble_reference(mode: WaleMode) -> Vec<Complex64> {
    known_sequence(TLC_LEN + CAPTURE_LEN, mode.preamble_len())
}

fn fast_probe_reference() -> Vec<Complex64> {
    known_sequence(10_000, FAST_PROBE_LEN)
}

fn chips_to_symbols(chips: &[i8]) -> Vec<Complex64> {
    chips.iter().map(|&c| Complex64::new(c as f64, 0.0)).collect()
}

fn symbols_to_chips(symbols: &[Complex64]) -> Vec<i8> {
    symbols.iter().map(|s| if s.re >= 0.0 { 1 } else { -1 }).collect()
}

fn bits_to_soft(bits: &[u8]) -> Vec<f64> {
    bits.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect()
}

/// Assemble a complete WALE frame carrying `pdu_bits` (96 bits, one ALE
/// PDU) through the shared FEC path (§4.11) and the mode-specific data
/// layer.
pub fn assemble_frame(pdu_bits: &[u8], mode: WaleMode) -> Vec<Complex64> {
    let coded_bits = encoding::encode_bits(pdu_bits);
    debug_assert_eq!(coded_bits.len(), CODED_BIT_LEN);

    let mut out = Vec::new();
    out.extend(known_sequence(0, TLC_LEN).iter().map(|s| s.conj()));
    out.extend(capture_probe_reference());
    out.extend(preamble_reference(mode));

    match mode {
        WaleMode::Deep => {
            let chips = walsh::scramble(&walsh::walsh16_modulate(&coded_bits), true);
            out.extend(chips_to_symbols(&chips));
        }
        WaleMode::Fast => {
            let chips = walsh::scramble(&walsh::bpsk_modulate(&coded_bits), false);
            out.extend(chips_to_symbols(&fast_probe_reference())); // initial probe
            for group in chips.chunks(FAST_DATA_GROUP) {
                out.extend(chips_to_symbols(group));
                out.extend(chips_to_symbols(&fast_probe_reference()));
            }
        }
    }
    out
}

/// Total symbol count for `mode`; used by RX to pick the length heuristic
/// that distinguishes Deep from Fast (§9 "a more robust detector would
/// correlate the first preamble block against both hypotheses").
pub fn frame_len(mode: WaleMode) -> usize {
    let fixed = TLC_LEN + CAPTURE_LEN + mode.preamble_len();
    match mode {
        WaleMode::Deep => fixed + 16 * CODED_BIT_LEN / 4,
        WaleMode::Fast => {
            let groups = CODED_BIT_LEN.div_ceil(FAST_DATA_GROUP);
            fixed + FAST_PROBE_LEN + groups * (FAST_DATA_GROUP + FAST_PROBE_LEN)
        }
    }
}

/// Correlate `received` against `expected` at each of the 8 possible 8-PSK
/// phase rotations; returns the winning rotation index (0..7).
fn resolve_phase(received: &[Complex64], expected: &[Complex64]) -> u8 {
    let mut best_k = 0u8;
    let mut best_mag = f64::MIN;
    for k in 0..8u8 {
        let rot = Complex64::from_polar(1.0, -(k as f64) * FRAC_PI_4);
        let corr: Complex64 = received
            .iter()
            .zip(expected.iter())
            .map(|(&r, &e)| (r * rot) * e.conj())
            .sum();
        if corr.re > best_mag {
            best_mag = corr.re;
            best_k = k;
        }
    }
    best_k
}

/// Decode a complete WALE frame back to its 96-bit ALE PDU payload.
/// Distinguishes Deep vs Fast by the total-length heuristic (§9), resolves
/// the 8-way phase ambiguity from the capture probe, then demodulates the
/// mode-specific data layer and runs it through the shared ALE FEC decode.
pub fn decode_frame(samples: &[Complex64]) -> Result<Vec<u8>, AleError> {
    let mode = if samples.len() > 2000 { WaleMode::Deep } else { WaleMode::Fast };
    let expected_capture = capture_probe_reference();
    if samples.len() < TLC_LEN + CAPTURE_LEN {
        return Err(AleError::PhaseUnresolved);
    }
    let received_capture = &samples[TLC_LEN..TLC_LEN + CAPTURE_LEN];
    let k = resolve_phase(received_capture, &expected_capture);
    let rot = Complex64::from_polar(1.0, -(k as f64) * FRAC_PI_4);

    let data_start = TLC_LEN + CAPTURE_LEN + mode.preamble_len();
    if samples.len() < data_start {
        return Err(AleError::PhaseUnresolved);
    }
    let derotated: Vec<Complex64> = samples[data_start..].iter().map(|&s| s * rot).collect();

    let coded_bits = match mode {
        WaleMode::Deep => {
            let chips = symbols_to_chips(&derotated);
            let descrambled = walsh::scramble(&chips, true);
            walsh::walsh16_demodulate(&descrambled)
        }
        WaleMode::Fast => {
            let mut chips = Vec::with_capacity(CODED_BIT_LEN);
            let mut pos = FAST_PROBE_LEN; // skip initial probe
            while chips.len() < CODED_BIT_LEN && pos + FAST_DATA_GROUP <= derotated.len() {
                let group = &derotated[pos..pos + FAST_DATA_GROUP];
                chips.extend(symbols_to_chips(group));
                pos += FAST_DATA_GROUP + FAST_PROBE_LEN;
            }
            let descrambled = walsh::scramble(&chips, false);
            walsh::bpsk_demodulate(&descrambled)
        }
    };

    if coded_bits.len() != CODED_BIT_LEN {
        return Err(AleError::PhaseUnresolved);
    }
    let decoded = encoding::decode_bits(&bits_to_soft(&coded_bits)).map_err(fec_to_ale)?;
    Ok(decoded)
}

fn fec_to_ale(_e: FecError) -> AleError {
    AleError::PhaseUnresolved
}
