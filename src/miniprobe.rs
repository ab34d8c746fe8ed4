//! Mini-probe channel estimation and boundary/EOT detection (§4.8).

use num_complex::Complex64;

use crate::tables::{Bandwidth, Waveform};

/// `{amplitude >= 0, phase in [-pi, pi), snr_db}` for one mini-probe (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelEstimate {
    pub amplitude: f64,
    pub phase: f64,
    pub snr_db: f64,
}

/// Build the expected 8-PSK mini-probe IQ reference for `(waveform, bw)`:
/// `K` equally spaced octant symbols (deterministic, process-wide known
/// sequence derived from the WID PN table so TX and RX agree).
pub fn reference_probe(waveform: Waveform, bandwidth: Bandwidth) -> Vec<Complex64> {
    let k = waveform.frame_probe_symbols(bandwidth);
    let octants = crate::tables::PnSequence::Wid.octants();
    (0..k)
        .map(|i| {
            let octant = octants[i % octants.len()] as f64;
            let angle = octant * std::f64::consts::FRAC_PI_4;
            Complex64::from_polar(1.0, angle)
        })
        .collect()
}

/// EOT marker: a 13.333 ms cyclic extension of the final mini-probe (§6,
/// §GLOSSARY). At the base 3 kHz rate `K = 32` symbols at 2400 sym/s is
/// exactly 13.33 ms, so one reference-probe length already has the right
/// duration at any bandwidth; [`Tx110D`](crate::tx110d) appends this
/// verbatim after the last data frame.
pub fn eot_extension(waveform: Waveform, bandwidth: Bandwidth) -> Vec<Complex64> {
    reference_probe(waveform, bandwidth)
}

/// Cyclically shift `reference` by one symbol; the shifted variant doubles
/// as the boundary marker (§4.8).
fn cyclic_shift(reference: &[Complex64], shift: usize) -> Vec<Complex64> {
    if reference.is_empty() {
        return Vec::new();
    }
    let n = reference.len();
    let shift = shift % n;
    reference
        .iter()
        .cycle()
        .skip(n - shift)
        .take(n)
        .copied()
        .collect()
}

fn correlate(received: &[Complex64], reference: &[Complex64]) -> Complex64 {
    received
        .iter()
        .zip(reference.iter())
        .map(|(r, s)| r * s.conj())
        .sum()
}

/// Outcome of processing one mini-probe (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub estimate: ChannelEstimate,
    pub boundary_detected: bool,
    /// `data` rotated by `-phase` and scaled by `1/amplitude`.
    pub corrected_data: Vec<Complex64>,
}

/// Stateful RX-side mini-probe processor: precomputes the expected probe
/// and boundary-marker references and keeps a rolling channel-estimate
/// history for smoothed phase.
pub struct MiniProbeRx {
    reference: Vec<Complex64>,
    boundary_marker: Vec<Complex64>,
    history: Vec<ChannelEstimate>,
}

const HISTORY_LEN: usize = 4;

impl MiniProbeRx {
    pub fn new(waveform: Waveform, bandwidth: Bandwidth) -> Self {
        let reference = reference_probe(waveform, bandwidth);
        let boundary_marker = cyclic_shift(&reference, 1);
        Self {
            reference,
            boundary_marker,
            history: Vec::with_capacity(HISTORY_LEN),
        }
    }

    /// Process one `(U data + K probe)` frame's probe symbols and the
    /// matching data symbols to correct (§4.8).
    pub fn process_frame(&mut self, data: &[Complex64], probe: &[Complex64]) -> ProbeResult {
        let corr_sync = correlate(probe, &self.reference);
        let corr_boundary = correlate(probe, &self.boundary_marker);

        let boundary_detected = corr_boundary.norm() > corr_sync.norm() * 1.10;
        let corr = if boundary_detected {
            corr_boundary
        } else {
            corr_sync
        };

        let k = self.reference.len().max(1) as f64;
        let amplitude = corr.norm() / k;
        let phase = corr.arg();

        let known_power: f64 = self.reference.iter().map(|s| s.norm_sqr()).sum();
        let reconstructed: f64 = probe
            .iter()
            .zip(self.reference.iter())
            .map(|(r, s)| {
                let predicted = Complex64::from_polar(amplitude, phase) * s;
                (r - predicted).norm_sqr()
            })
            .sum();
        let snr_db = if reconstructed > 0.0 && known_power > 0.0 {
            10.0 * (known_power * amplitude * amplitude / reconstructed).log10()
        } else {
            f64::INFINITY
        };

        let estimate = ChannelEstimate {
            amplitude,
            phase,
            snr_db,
        };
        self.push_history(estimate);

        let corrected_data = self.correct(data, amplitude, phase);

        ProbeResult {
            estimate,
            boundary_detected,
            corrected_data,
        }
    }

    fn push_history(&mut self, estimate: ChannelEstimate) {
        if self.history.len() == HISTORY_LEN {
            self.history.remove(0);
        }
        self.history.push(estimate);
    }

    /// Rolling 4-estimate smoothed phase via complex averaging (§4.8).
    pub fn smoothed_phase(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let sum: Complex64 = self
            .history
            .iter()
            .map(|e| Complex64::from_polar(1.0, e.phase))
            .sum();
        sum.arg()
    }

    fn correct(&self, data: &[Complex64], amplitude: f64, phase: f64) -> Vec<Complex64> {
        if amplitude == 0.0 {
            return data.to_vec();
        }
        let rotation = Complex64::from_polar(1.0 / amplitude, -phase);
        data.iter().map(|&s| s * rotation).collect()
    }

    /// Attempt EOT detection: only valid once fewer than one full frame of
    /// buffer remains (§4.8, §9 "EOT gating" — avoids false positives every
    /// `U+K` symbols). Compares `remaining` against small cyclic offsets of
    /// the reference probe; `correlation > 0.85` declares EOT.
    pub fn detect_eot(&self, remaining: &[Complex64], frame_len: usize) -> bool {
        if remaining.len() >= frame_len {
            return false;
        }
        let n = remaining.len().min(self.reference.len());
        if n == 0 {
            return false;
        }
        let ref_power: f64 = self.reference[..n].iter().map(|s| s.norm_sqr()).sum();
        if ref_power == 0.0 {
            return false;
        }
        for offset in 0..16usize.min(self.reference.len()) {
            let shifted = cyclic_shift(&self.reference, offset);
            let corr = correlate(&remaining[..n], &shifted[..n]).norm();
            let normalized = corr / ref_power.sqrt() / (remaining[..n].iter().map(|s| s.norm_sqr()).sum::<f64>()).sqrt().max(1e-12);
            if normalized > 0.85 {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn channel_estimate_recovers_synthetic_gain_and_phase() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let reference = reference_probe(waveform, bandwidth);

        let true_amp = 0.7;
        let true_phase = 0.4;
        let gain = Complex64::from_polar(true_amp, true_phase);
        let probe: Vec<Complex64> = reference.iter().map(|&s| s * gain).collect();
        let data: Vec<Complex64> = reference.iter().map(|&s| s * gain).collect();

        let mut rx = MiniProbeRx::new(waveform, bandwidth);
        let result = rx.process_frame(&data, &probe);

        assert_abs_diff_eq!(result.estimate.amplitude, true_amp, epsilon = 0.1);
        assert_abs_diff_eq!(result.estimate.phase, true_phase, epsilon = 0.15);

        for (corrected, original) in result.corrected_data.iter().zip(reference.iter()) {
            assert_abs_diff_eq!(corrected.re, original.re, epsilon = 0.01);
            assert_abs_diff_eq!(corrected.im, original.im, epsilon = 0.01);
        }
    }

    #[test]
    fn boundary_marker_distinguishes_shifted_probe() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let reference = reference_probe(waveform, bandwidth);
        let shifted = cyclic_shift(&reference, 1);

        let mut rx = MiniProbeRx::new(waveform, bandwidth);
        let known = rx.process_frame(&reference, &reference);
        assert!(!known.boundary_detected);

        let mut rx2 = MiniProbeRx::new(waveform, bandwidth);
        let shifted_result = rx2.process_frame(&shifted, &shifted);
        assert!(shifted_result.boundary_detected);
    }

    #[test]
    fn eot_gated_on_short_remaining_buffer() {
        let waveform = Waveform::WF0;
        let bandwidth = Bandwidth::Khz3;
        let reference = reference_probe(waveform, bandwidth);
        let rx = MiniProbeRx::new(waveform, bandwidth);

        let frame_len = waveform.frame_data_symbols(bandwidth) + waveform.frame_probe_symbols(bandwidth);

        // A buffer still holding a full frame's worth of symbols must never
        // report EOT, even though its content would otherwise correlate.
        let plenty: Vec<Complex64> = reference.iter().cycle().take(frame_len + 10).copied().collect();
        assert!(!rx.detect_eot(&plenty, frame_len));

        // Once less than one frame remains, the reference itself correlates.
        assert!(rx.detect_eot(&reference, frame_len));
    }
}
