//! DTE-facing RX state machine: carrier detection through the `Rx110D`
//! preamble/data pipeline, AGC, and idle-timeout flush (§4.15).

use std::time::{Duration, Instant};

use crate::config::TimeoutConfig;
use crate::events::{CarrierParams, RxStats};
use crate::phy::UnifiedDemod;
use crate::rx110d::{Rx110D, Rx110DEvent};
use crate::tables::Bandwidth;
use crate::txfsm::PacketOrder;

/// `{NoCarrier, CarrierDetected, Receiving}` (§4.15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxFsmState {
    NoCarrier,
    CarrierDetected,
    Receiving,
}

/// Events the RX actor reports upward, analogous to `LinkEvent`/`Rx110DEvent`.
#[derive(Debug, Clone, PartialEq)]
pub enum RxFsmEvent {
    CarrierDetected(CarrierParams),
    /// One frame's worth of liveness progress (`Continuation`, empty
    /// payload — the decoded bytes only exist once the tail-biting code
    /// block closes, §4.6/§9) or the final decoded payload (`Last`).
    Data(Vec<u8>, PacketOrder),
    CarrierLost,
    Complete(RxStats),
}

const AGC_TARGET_PEAK: f64 = 0.8 * (i16::MAX as f64);
const DEMOD_RESET_THRESHOLD: usize = 1000;

fn agc_normalize(samples: &[i16]) -> Vec<i16> {
    let peak = samples.iter().map(|&s| (s as f64).abs()).fold(0.0, f64::max);
    if peak < 1.0 {
        return samples.to_vec();
    }
    let gain = AGC_TARGET_PEAK / peak;
    samples
        .iter()
        .map(|&s| ((s as f64) * gain).clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .collect()
}

/// Single-writer RX actor (§5) driving one rig's 110D reception.
pub struct RxFsm {
    state: RxFsmState,
    rx: Rx110D,
    bandwidth: Bandwidth,
    rx_idle: Duration,
    last_activity: Option<Instant>,
}

impl RxFsm {
    pub fn new(bandwidth: Bandwidth, timeouts: &TimeoutConfig) -> Self {
        let mut rx = Rx110D::new(bandwidth);
        rx.start();
        Self {
            state: RxFsmState::NoCarrier,
            rx,
            bandwidth,
            rx_idle: timeouts.rx_idle,
            last_activity: None,
        }
    }

    pub fn state(&self) -> RxFsmState {
        self.state
    }

    /// Feed one batch of raw PCM audio. AGC-normalizes to `AGC_TARGET_PEAK`
    /// before demodulation; batches over `DEMOD_RESET_THRESHOLD` samples
    /// trigger a PLL reset for clean reacquisition (§4.15).
    pub fn process(
        &mut self,
        samples: &[i16],
        demod: &mut dyn UnifiedDemod,
        now: Instant,
    ) -> Vec<RxFsmEvent> {
        if samples.len() > DEMOD_RESET_THRESHOLD {
            demod.reset();
        }
        let normalized = agc_normalize(samples);
        let iq = demod.demodulate_iq(&normalized);
        if iq.is_empty() {
            return Vec::new();
        }
        self.last_activity = Some(now);

        let rx_events = match self.rx.process(&iq) {
            Ok(events) => events,
            Err(_) => return Vec::new(),
        };
        self.translate(rx_events)
    }

    fn translate(&mut self, rx_events: Vec<Rx110DEvent>) -> Vec<RxFsmEvent> {
        let mut out = Vec::new();
        for event in rx_events {
            match event {
                Rx110DEvent::TlcDetected | Rx110DEvent::SyncAcquired | Rx110DEvent::Countdown(_) => {}
                Rx110DEvent::WidDecoded {
                    waveform,
                    interleaver,
                    constraint_length,
                } => {
                    self.state = RxFsmState::CarrierDetected;
                    out.push(RxFsmEvent::CarrierDetected(CarrierParams {
                        waveform,
                        interleaver,
                        constraint_length,
                        bandwidth: self.bandwidth,
                        data_rate_bps: waveform.data_rate_bps(self.bandwidth),
                    }));
                }
                Rx110DEvent::DataStart => {
                    self.state = RxFsmState::Receiving;
                }
                Rx110DEvent::Data(_symbols) => {
                    out.push(RxFsmEvent::Data(Vec::new(), PacketOrder::Continuation));
                }
                Rx110DEvent::EotDetected => {}
                Rx110DEvent::Complete(decoded) => {
                    out.push(RxFsmEvent::Data(decoded.data, PacketOrder::Last));
                    out.push(RxFsmEvent::Complete(RxStats {
                        symbols_processed: 0,
                        frames_received: 0,
                        eot_detected: decoded.eom_detected_at.is_some(),
                        final_estimate: None,
                    }));
                    self.state = RxFsmState::NoCarrier;
                    self.rx.start();
                    self.last_activity = None;
                }
            }
        }
        out
    }

    /// Called periodically by the owning task (§5 "explicit timer awaits
    /// ... 500 ms RX idle"): flush and return to `NoCarrier` if `Receiving`
    /// has gone quiet for `rx_idle`.
    pub fn poll_idle(&mut self, now: Instant) -> Vec<RxFsmEvent> {
        if self.state != RxFsmState::Receiving {
            return Vec::new();
        }
        let Some(last) = self.last_activity else {
            return Vec::new();
        };
        if now.duration_since(last) < self.rx_idle {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Ok(events) = self.rx.flush() {
            for event in events {
                if let Rx110DEvent::Complete(decoded) = event {
                    out.push(RxFsmEvent::Data(decoded.data, PacketOrder::Last));
                }
            }
        }
        self.state = RxFsmState::NoCarrier;
        self.rx.start();
        self.last_activity = None;
        out
    }

    /// `abort_rx` (§6, §5): forces `NoCarrier` after emitting a terminal
    /// empty `Last` packet and any decodable partial frame.
    pub fn abort(&mut self) -> Vec<RxFsmEvent> {
        let mut out = Vec::new();
        if let Ok(events) = self.rx.flush() {
            for event in events {
                if let Rx110DEvent::Complete(decoded) = event {
                    out.push(RxFsmEvent::Data(decoded.data, PacketOrder::Last));
                }
            }
        }
        if out.is_empty() {
            out.push(RxFsmEvent::Data(Vec::new(), PacketOrder::Last));
        }
        self.state = RxFsmState::NoCarrier;
        self.rx.start();
        self.last_activity = None;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    struct PassthroughDemod {
        reset_count: usize,
    }

    impl UnifiedDemod for PassthroughDemod {
        fn demodulate_iq(&mut self, samples: &[i16]) -> Vec<Complex64> {
            samples.iter().map(|&s| Complex64::new(s as f64 / i16::MAX as f64, 0.0)).collect()
        }
        fn demodulate_symbols(&mut self, _samples: &[i16]) -> Vec<u8> {
            Vec::new()
        }
        fn reset(&mut self) {
            self.reset_count += 1;
        }
    }

    #[test]
    fn large_batch_triggers_demod_reset() {
        let mut fsm = RxFsm::new(Bandwidth::Khz3, &TimeoutConfig::default());
        let mut demod = PassthroughDemod { reset_count: 0 };
        let samples = vec![100i16; 1001];
        fsm.process(&samples, &mut demod, Instant::now());
        assert_eq!(demod.reset_count, 1);
    }

    #[test]
    fn idle_timeout_only_fires_while_receiving() {
        let mut fsm = RxFsm::new(Bandwidth::Khz3, &TimeoutConfig::default());
        assert!(fsm.poll_idle(Instant::now()).is_empty());
    }

    #[test]
    fn agc_normalizes_peak_toward_target() {
        let samples = vec![100i16, -50, 30];
        let normalized = agc_normalize(&samples);
        let peak = normalized.iter().map(|&s| (s as f64).abs()).fold(0.0, f64::max);
        assert!((peak - AGC_TARGET_PEAK).abs() < 1.0);
    }
}
