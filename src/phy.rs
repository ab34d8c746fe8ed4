//! PHY boundary interfaces (§6 "Downstream (PHY)").
//!
//! `UnifiedMod`/`UnifiedDemod` are external collaborators per §1: the
//! analog modulator and 8th-power-PLL demodulator that turn channel
//! symbols into audio and back. This crate never implements them — only
//! the interface the DTE-facing FSMs drive them through. Implementations
//! live in the host adapter (soundcard I/O, rig control, the simnet
//! channel simulator).

use num_complex::Complex64;

use crate::tables::Constellation;

/// One channel symbol paired with the constellation it should be modulated
/// against, for waveforms whose preamble and data sections use different
/// constellations within a single call (§6 `modulate_mixed`).
pub type MixedSymbol = (u8, Constellation);

/// The external analog modulator (§6). Implementations own the carrier
/// oscillator, pulse shaping, and sample-rate conversion; this crate only
/// ever hands it hard symbols or mixed-constellation symbol/constellation
/// pairs and reads back PCM samples.
pub trait UnifiedMod {
    /// Modulate a run of symbols, all against the same constellation.
    fn modulate(&mut self, symbols: &[u8], constellation: Constellation) -> Vec<i16>;

    /// Modulate a run of symbols each carrying its own constellation
    /// (preamble Walsh/BPSK chips interleaved with data-layer symbols).
    fn modulate_mixed(&mut self, symbols: &[MixedSymbol]) -> Vec<i16>;

    /// Flush any pulse-shaping filter state, returning trailing samples.
    fn flush(&mut self) -> Vec<i16>;
}

/// The external 8th-power-PLL demodulator (§6). Produces both the
/// per-symbol IQ points this crate's mini-probe correction and sync
/// correlation need, and a hard-symbol stream for constellations where
/// soft IQ isn't required.
pub trait UnifiedDemod {
    fn demodulate_iq(&mut self, samples: &[i16]) -> Vec<Complex64>;
    fn demodulate_symbols(&mut self, samples: &[i16]) -> Vec<u8>;

    /// Reset PLL/AGC/timing-recovery state for a fresh acquisition (§4.15:
    /// large audio batches trigger this for clean reacquisition).
    fn reset(&mut self);
}

/// The external audio sink a completed TX assembly is handed to (§4.14
/// "Triggers codec encode ... and hands audio to the sink"). Modeled
/// separately from `UnifiedMod` because the sink, not the modulator, is
/// what reports transmission completion back to the `TxFsm` (§4.14
/// "Audio-sink completion event").
pub trait AudioSink {
    fn push(&mut self, samples: &[i16]);
    /// `true` once all pushed audio has finished playing out.
    fn is_complete(&self) -> bool;
}
