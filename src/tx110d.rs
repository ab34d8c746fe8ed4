//! 110D TX assembler: preamble + initial probe + framed data (interleaved
//! with mini-probes) + EOT (§4.1 "Tx110D", §6 "110D preamble" / "110D data
//! frame").

use num_complex::Complex64;

use crate::codec110d::{self, Encoder};
use crate::errors::ModemError;
use crate::miniprobe;
use crate::preamble::{self, Wid};
use crate::tables::{Bandwidth, ConstraintLength, InterleaverType, Waveform};

/// Construction-time parameters for one 110D transmission.
pub struct Tx110D {
    waveform: Waveform,
    bandwidth: Bandwidth,
    interleaver: InterleaverType,
    constraint_length: ConstraintLength,
    encoder: Encoder,
}

/// Preamble shape knobs not carried by the WID itself (§4.9, §6).
#[derive(Debug, Clone, Copy)]
pub struct PreambleShape {
    /// Number of super-frames `m` (`m=1` uses a 1-Walsh-symbol Fixed
    /// section, `m>1` uses 9).
    pub super_frames: usize,
    /// Leading TLC (AGC-settling) blocks before the first super-frame.
    pub tlc_blocks: usize,
}

impl Default for PreambleShape {
    fn default() -> Self {
        Self {
            super_frames: 1,
            tlc_blocks: 0,
        }
    }
}

impl Tx110D {
    pub fn new(
        waveform: Waveform,
        bandwidth: Bandwidth,
        interleaver: InterleaverType,
        constraint_length: ConstraintLength,
    ) -> Result<Self, ModemError> {
        let encoder = Encoder::new(waveform, bandwidth, interleaver, constraint_length)?;
        Ok(Self {
            waveform,
            bandwidth,
            interleaver,
            constraint_length,
            encoder,
        })
    }

    /// Assemble the complete IQ sequence for one transmission: preamble,
    /// initial mini-probe, `U`-symbol data frames each followed by a
    /// `K`-symbol mini-probe, and a final EOT cyclic extension (§6).
    pub fn assemble(&self, bits: &[u8], use_eom: bool, shape: PreambleShape) -> Result<Vec<Complex64>, ModemError> {
        let wid = Wid {
            waveform: self.waveform,
            interleaver: self.interleaver,
            constraint_length: self.constraint_length,
        };
        let chip_len = self.bandwidth.walsh_chip_len();
        let preamble_chips =
            preamble::build_preamble(&wid, shape.super_frames.max(1), shape.tlc_blocks, chip_len)?;
        let preamble_iq: Vec<Complex64> = preamble_chips
            .iter()
            .map(|&c| Complex64::new(c as f64, 0.0))
            .collect();

        let data_symbols = self.encoder.encode(bits, use_eom)?;
        let data_points = codec110d::symbols_to_points(&data_symbols, self.waveform.constellation());

        let u = self.waveform.frame_data_symbols(self.bandwidth);
        let probe = miniprobe::reference_probe(self.waveform, self.bandwidth);

        let mut out = Vec::with_capacity(
            preamble_iq.len() + probe.len() + data_points.len() + (data_points.len() / u.max(1) + 2) * probe.len(),
        );
        out.extend(preamble_iq);
        out.extend(probe.iter().copied()); // initial probe (§4.1)

        for frame in data_points.chunks(u.max(1)) {
            out.extend_from_slice(frame);
            out.extend(probe.iter().copied());
        }

        out.extend(miniprobe::eot_extension(self.waveform, self.bandwidth));
        Ok(out)
    }
}
