//! 110D RX state machine: sync -> preamble decode -> per-frame data loop
//! with mini-probe channel correction and EOT detection (§3 "110D Rx
//! state", §4.10).
//!
//! Operates on a single incoming `Complex64` stream throughout. During
//! `Searching`/`TlcFound`/`Preamble` each sample is treated as one Walsh
//! chip (hard sign of the real part feeds [`preamble`]'s chip-domain
//! correlators, matching the simplification already documented there);
//! during `Receiving` each sample is one channel symbol at the waveform's
//! constellation, consumed by mini-probe correction and symbol demap.

use num_complex::Complex64;

use crate::codec110d::{self, DecodedOutput, Decoder};
use crate::errors::{FrameError, ModemError};
use crate::miniprobe::MiniProbeRx;
use crate::preamble::{self, SyncHit, Wid};
use crate::tables::{Bandwidth, ConstraintLength, InterleaverType, Waveform};

/// `{Idle, Searching, TlcFound, Preamble, Receiving, Complete}` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rx110DState {
    Idle,
    Searching,
    TlcFound,
    Preamble,
    Receiving,
    Complete,
}

/// Events the RX state machine reports as it processes a batch (§6, §8
/// scenario 3).
#[derive(Debug, Clone, PartialEq)]
pub enum Rx110DEvent {
    TlcDetected,
    SyncAcquired,
    WidDecoded {
        waveform: Waveform,
        interleaver: InterleaverType,
        constraint_length: ConstraintLength,
    },
    Countdown(u8),
    DataStart,
    /// Per-frame mini-probe-corrected data symbols (§4.10 "emit `data`").
    Data(Vec<Complex64>),
    EotDetected,
    Complete(DecodedOutput),
}

const SYNC_THRESHOLD: f64 = 0.6;

fn to_chip_sign(sample: Complex64) -> i8 {
    if sample.re >= 0.0 {
        1
    } else {
        -1
    }
}

/// Single-writer 110D receiver actor (§5: owned by its driving task).
pub struct Rx110D {
    state: Rx110DState,
    bandwidth: Bandwidth,
    sync_threshold: f64,
    buffer: Vec<Complex64>,
    phase_invert: bool,
    wid: Option<Wid>,
    frame_len: usize,
    u_symbols: usize,
    k_symbols: usize,
    initial_probe_done: bool,
    miniprobe: Option<MiniProbeRx>,
    decoder: Option<Decoder>,
    pending_symbols: Vec<Complex64>,
}

impl Rx110D {
    pub fn new(bandwidth: Bandwidth) -> Self {
        Self {
            state: Rx110DState::Idle,
            bandwidth,
            sync_threshold: SYNC_THRESHOLD,
            buffer: Vec::new(),
            phase_invert: false,
            wid: None,
            frame_len: 0,
            u_symbols: 0,
            k_symbols: 0,
            initial_probe_done: false,
            miniprobe: None,
            decoder: None,
            pending_symbols: Vec::new(),
        }
    }

    pub fn state(&self) -> Rx110DState {
        self.state
    }

    /// `start()` (§4.10 "Complete: samples ignored; `start()` resets
    /// buffers and returns to `Searching`" — also the entry point from
    /// `Idle`).
    pub fn start(&mut self) {
        self.buffer.clear();
        self.pending_symbols.clear();
        self.wid = None;
        self.initial_probe_done = false;
        self.miniprobe = None;
        self.decoder = None;
        self.state = Rx110DState::Searching;
    }

    /// Feed one batch of incoming samples and drain as many state
    /// transitions and events as the accumulated buffer allows.
    pub fn process(&mut self, samples: &[Complex64]) -> Result<Vec<Rx110DEvent>, ModemError> {
        if self.state == Rx110DState::Idle || self.state == Rx110DState::Complete {
            return Ok(Vec::new());
        }
        self.buffer.extend_from_slice(samples);
        self.drain_events()
    }

    fn chip_len(&self) -> usize {
        self.bandwidth.walsh_chip_len()
    }

    fn drain_events(&mut self) -> Result<Vec<Rx110DEvent>, ModemError> {
        let mut events = Vec::new();
        loop {
            match self.state {
                Rx110DState::Searching => {
                    let chip_len = self.chip_len();
                    let chips: Vec<i8> = self.buffer.iter().map(|&s| to_chip_sign(s)).collect();
                    match preamble::find_sync(&chips, chip_len, self.sync_threshold) {
                        Some(SyncHit::Tlc(start)) => {
                            self.buffer.drain(..start + chip_len);
                            self.state = Rx110DState::TlcFound;
                            events.push(Rx110DEvent::TlcDetected);
                        }
                        Some(SyncHit::Sync(start)) => {
                            self.buffer.drain(..start);
                            self.state = Rx110DState::Preamble;
                            events.push(Rx110DEvent::SyncAcquired);
                        }
                        None => break,
                    }
                }
                Rx110DState::TlcFound => {
                    let chip_len = self.chip_len();
                    let chips: Vec<i8> = self.buffer.iter().map(|&s| to_chip_sign(s)).collect();
                    match preamble::find_sync(&chips, chip_len, self.sync_threshold) {
                        Some(SyncHit::Tlc(start)) => {
                            self.buffer.drain(..start + chip_len);
                        }
                        Some(SyncHit::Sync(start)) => {
                            self.buffer.drain(..start);
                            self.state = Rx110DState::Preamble;
                            events.push(Rx110DEvent::SyncAcquired);
                        }
                        None => break,
                    }
                }
                Rx110DState::Preamble => {
                    let chip_len = self.chip_len();
                    let chips: Vec<i8> = self.buffer.iter().map(|&s| to_chip_sign(s)).collect();
                    let decoded = if self.wid.is_none() {
                        preamble::decode_super_frame(&chips, chip_len)
                    } else {
                        preamble::decode_next_super_frame(&chips, chip_len, self.phase_invert)
                    };
                    let sf = match decoded {
                        Ok(sf) => sf,
                        Err(FrameError::InsufficientSymbols { .. })
                        | Err(FrameError::SuperFrameAmbiguityUnresolved) => break,
                        Err(e) => return Err(e.into()),
                    };
                    self.phase_invert = sf.phase_invert;
                    if self.wid.is_none() {
                        self.wid = Some(sf.wid);
                        events.push(Rx110DEvent::WidDecoded {
                            waveform: sf.wid.waveform,
                            interleaver: sf.wid.interleaver,
                            constraint_length: sf.wid.constraint_length,
                        });
                    }
                    self.buffer.drain(..sf.consumed_chips);
                    events.push(Rx110DEvent::Countdown(sf.downcount.count));
                    if sf.downcount.count == 0 {
                        self.enter_receiving(sf.wid)?;
                        events.push(Rx110DEvent::DataStart);
                    }
                }
                Rx110DState::Receiving => {
                    if !self.initial_probe_done {
                        let k = self.k_symbols;
                        if self.buffer.len() < k {
                            break;
                        }
                        let probe: Vec<Complex64> = self.buffer.drain(..k).collect();
                        self.miniprobe
                            .as_mut()
                            .expect("set in enter_receiving")
                            .process_frame(&[], &probe);
                        self.initial_probe_done = true;
                        continue;
                    }
                    let frame_len = self.frame_len;
                    if self.buffer.len() < frame_len {
                        let miniprobe = self.miniprobe.as_ref().expect("set in enter_receiving");
                        if miniprobe.detect_eot(&self.buffer, frame_len) {
                            let output = self.decoder.as_mut().expect("set in enter_receiving").flush(None)?;
                            self.buffer.clear();
                            self.state = Rx110DState::Complete;
                            events.push(Rx110DEvent::EotDetected);
                            events.push(Rx110DEvent::Complete(output));
                        }
                        break;
                    }
                    let frame: Vec<Complex64> = self.buffer.drain(..frame_len).collect();
                    let (data, probe) = frame.split_at(self.u_symbols);
                    let result = self
                        .miniprobe
                        .as_mut()
                        .expect("set in enter_receiving")
                        .process_frame(data, probe);
                    events.push(Rx110DEvent::Data(result.corrected_data.clone()));
                    self.pending_symbols.extend(result.corrected_data);
                    self.try_decode_block()?;
                }
                Rx110DState::Idle | Rx110DState::Complete => break,
            }
        }
        Ok(events)
    }

    fn enter_receiving(&mut self, wid: Wid) -> Result<(), ModemError> {
        let waveform = wid.waveform;
        let bandwidth = self.bandwidth;
        self.u_symbols = waveform.frame_data_symbols(bandwidth);
        self.k_symbols = waveform.frame_probe_symbols(bandwidth);
        self.frame_len = self.u_symbols + self.k_symbols;
        self.initial_probe_done = false;
        self.miniprobe = Some(MiniProbeRx::new(waveform, bandwidth));
        self.decoder = Some(Decoder::new(
            waveform,
            bandwidth,
            wid.interleaver,
            wid.constraint_length,
        )?);
        self.pending_symbols.clear();
        self.state = Rx110DState::Receiving;
        Ok(())
    }

    /// Once enough corrected data symbols have accumulated to fill one
    /// interleaver coded block, demap and hand it to the codec decoder
    /// (§4.6, §4.10).
    fn try_decode_block(&mut self) -> Result<(), ModemError> {
        let wid = self.wid.expect("set before Receiving");
        let bps = wid.waveform.bits_per_symbol() as usize;
        let block_symbols = crate::tables::interleaver_params(wid.waveform, wid.interleaver, self.bandwidth)?
            .coded_bits
            / bps;
        while self.pending_symbols.len() >= block_symbols {
            let block: Vec<Complex64> = self.pending_symbols.drain(..block_symbols).collect();
            let soft = codec110d::points_to_soft_bits(&block, wid.waveform.constellation());
            self.decoder.as_mut().expect("set in enter_receiving").decode_block(&soft)?;
        }
        Ok(())
    }

    /// Final flush (§4.10): emit a partial frame if `Receiving`, then enter
    /// `Complete`.
    pub fn flush(&mut self) -> Result<Vec<Rx110DEvent>, ModemError> {
        let mut events = Vec::new();
        if self.state == Rx110DState::Receiving {
            if let Some(decoder) = self.decoder.as_mut() {
                let output = decoder.flush(None)?;
                events.push(Rx110DEvent::Complete(output));
            }
        }
        self.state = Rx110DState::Complete;
        self.buffer.clear();
        self.pending_symbols.clear();
        Ok(events)
    }
}
