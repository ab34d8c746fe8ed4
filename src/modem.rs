//! Top-level `Modem` handle: the host-adapter-facing surface from §6,
//! wiring `TxFsm`, `RxFsm`, `Arbiter`, and `EventBus` around one rig.
//!
//! Owns no threads of its own (§5: the runtime is the host's
//! responsibility) — every method here runs to completion without
//! yielding, exactly the "actor processes one message at a time" model.

use std::time::Instant;

use crate::arbiter::Arbiter;
use crate::config::{DuplexMode, ModemConfig, WaveformSelection};
use crate::errors::{FsmError, ModemError};
use crate::events::{EventBus, EventFilter, ModemEvent, Subscription};
use crate::logging::{LogConfig, SignalLogger};
use crate::phy::{AudioSink, UnifiedDemod};
use crate::rxfsm::{RxFsm, RxFsmEvent, RxFsmState};
use crate::txfsm::{PacketOrder, TxFsm, TxFsmState};

/// One rig's modem core: the object a host adapter (KISS, 110D-A wire
/// protocol, or a test harness) drives directly (§6).
pub struct Modem {
    config: ModemConfig,
    tx: TxFsm,
    rx: RxFsm,
    arbiter: Arbiter,
    events: EventBus,
    logger: SignalLogger,
}

impl Modem {
    pub fn new(config: ModemConfig) -> Result<Self, ModemError> {
        config.validate()?;
        let tx = TxFsm::new(config.waveform, config.queue)?;
        let rx = RxFsm::new(config.waveform.bandwidth, &config.timeouts);
        let arbiter = Arbiter::new(config.duplex);
        Ok(Self {
            config,
            tx,
            rx,
            arbiter,
            events: EventBus::new(),
            logger: SignalLogger::new(LogConfig::default()),
        })
    }

    /// Replace the logger, e.g. with [`LogConfig::verbose`] or
    /// [`LogConfig::quiet`].
    pub fn set_log_config(&mut self, config: LogConfig) {
        self.logger = SignalLogger::new(config);
    }

    pub fn log_entries(&self) -> &[crate::logging::LogEntry] {
        self.logger.entries()
    }

    pub fn subscribe(&mut self, filter: EventFilter) -> Subscription {
        self.events.subscribe(filter)
    }

    // ---- TX surface (§6) ----

    pub fn arm_tx(&mut self) -> Result<TxFsmState, ModemError> {
        let state = self.tx.arm(&mut self.arbiter)?;
        self.logger.debug("TXFSM", format!("armed, state={:?}", state));
        Ok(state)
    }

    pub fn tx_data(&mut self, bytes: Vec<u8>, order: PacketOrder) -> Result<TxFsmState, ModemError> {
        let len = bytes.len();
        let state = self.tx.tx_data(bytes, order)?;
        self.logger.debug("TXFSM", format!("queued {len} bytes, state={:?}", state));
        self.emit_tx_status();
        Ok(state)
    }

    pub fn start_tx<S: AudioSink>(&mut self, sink: &mut S) -> Result<TxFsmState, ModemError> {
        let state = self.tx.start(sink)?;
        self.logger.info("TXFSM", format!("transmission started, state={:?}", state));
        self.emit_tx_status();
        Ok(state)
    }

    pub fn abort_tx(&mut self) -> TxFsmState {
        let state = self.tx.abort();
        self.logger.warn("TXFSM", "transmission aborted");
        self.events.publish(ModemEvent::TxUnderrun);
        state
    }

    pub fn on_tx_sink_complete(&mut self) -> TxFsmState {
        let state = self.tx.on_sink_complete(&mut self.arbiter);
        self.emit_tx_status();
        state
    }

    pub fn tx_status(&self) -> ModemEvent {
        ModemEvent::TxStatus {
            queued_bytes: self.tx.queued_bytes(),
            free_bytes: self.tx.free_bytes(),
            data_rate_bps: self.tx.data_rate_bps(),
            blocking_factor: self.tx.blocking_factor_bytes(),
        }
    }

    fn emit_tx_status(&mut self) {
        let status = self.tx_status();
        self.events.publish(status);
    }

    /// `set_tx_params` (§6): only valid while `Flushed` — rebuilding the
    /// assembler mid-transmission would desynchronize the framing state.
    pub fn set_tx_params(&mut self, waveform: WaveformSelection) -> Result<(), ModemError> {
        if self.tx.state() != TxFsmState::Flushed {
            return Err(FsmError::InvalidState {
                action: "set_tx_params",
                state: "non-Flushed",
            }
            .into());
        }
        self.config.waveform = waveform;
        self.tx = TxFsm::new(waveform, self.config.queue)?;
        Ok(())
    }

    // ---- RX surface (§6) ----

    pub fn process_rx_audio(&mut self, samples: &[i16], demod: &mut dyn UnifiedDemod, now: Instant) {
        let events = self.rx.process(samples, demod, now);
        self.publish_rx_events(events);
    }

    pub fn poll_rx_idle(&mut self, now: Instant) {
        let events = self.rx.poll_idle(now);
        self.publish_rx_events(events);
    }

    pub fn abort_rx(&mut self) {
        let events = self.rx.abort();
        self.logger.warn("RXFSM", "reception aborted");
        self.publish_rx_events(events);
        if self.arbiter.rx_active() {
            self.arbiter.set_rx_active(false);
        }
    }

    pub fn rx_status(&self) -> RxFsmState {
        self.rx.state()
    }

    fn publish_rx_events(&mut self, events: Vec<RxFsmEvent>) {
        for event in events {
            match event {
                RxFsmEvent::CarrierDetected(params) => {
                    self.arbiter.set_rx_active(true);
                    self.logger.info("RXFSM", format!("carrier detected: {:?}", params));
                    self.events.publish(ModemEvent::WidDecoded(params));
                    self.events
                        .publish(ModemEvent::RxCarrier(crate::events::CarrierState::Detected, Some(params)));
                }
                RxFsmEvent::Data(bytes, order) => {
                    self.logger.debug("RXFSM", format!("{} bytes decoded ({:?})", bytes.len(), order));
                    self.events.publish(ModemEvent::RxData(bytes, order));
                }
                RxFsmEvent::CarrierLost => {
                    self.arbiter.set_rx_active(false);
                    self.logger.warn("RXFSM", "carrier lost");
                    self.events.publish(ModemEvent::RxCarrier(crate::events::CarrierState::Lost, None));
                }
                RxFsmEvent::Complete(stats) => {
                    self.arbiter.set_rx_active(false);
                    self.logger.info("RXFSM", format!("reception complete: {:?}", stats));
                    self.events.publish(ModemEvent::RxComplete(stats));
                }
            }
        }
    }

    // ---- Shared surface (§6) ----

    pub fn set_duplex_mode(&mut self, mode: DuplexMode) {
        self.config.duplex = mode;
        self.arbiter.set_mode(mode);
        self.logger.info("ARBITER", format!("duplex mode -> {:?}", mode));
        self.events.publish(ModemEvent::DuplexModeChanged(mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    struct NullSink;
    impl AudioSink for NullSink {
        fn push(&mut self, _samples: &[i16]) {}
        fn is_complete(&self) -> bool {
            true
        }
    }

    struct PassthroughDemod;
    impl UnifiedDemod for PassthroughDemod {
        fn demodulate_iq(&mut self, samples: &[i16]) -> Vec<Complex64> {
            samples.iter().map(|&s| Complex64::new(s as f64, 0.0)).collect()
        }
        fn demodulate_symbols(&mut self, _samples: &[i16]) -> Vec<u8> {
            Vec::new()
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn arm_tx_data_start_round_trip_emits_events() {
        let mut modem = Modem::new(ModemConfig::default()).unwrap();
        let mut sub = modem.subscribe(EventFilter::Tx);
        modem.arm_tx().unwrap();
        modem.tx_data(vec![1, 2, 3], PacketOrder::FirstAndLast).unwrap();
        let mut sink = NullSink;
        modem.start_tx(&mut sink).unwrap();
        modem.on_tx_sink_complete();

        let events = sub.drain();
        assert!(events.iter().any(|e| matches!(e, ModemEvent::TxStatus { .. })));
    }

    #[test]
    fn set_tx_params_rejected_mid_transmission() {
        let mut modem = Modem::new(ModemConfig::default()).unwrap();
        modem.arm_tx().unwrap();
        modem.tx_data(vec![1], PacketOrder::FirstAndLast).unwrap();
        let mut sink = NullSink;
        modem.start_tx(&mut sink).unwrap();
        assert!(modem.set_tx_params(WaveformSelection::default()).is_err());
    }

    #[test]
    fn rx_idle_poll_is_harmless_with_no_carrier() {
        let mut modem = Modem::new(ModemConfig::default()).unwrap();
        modem.poll_rx_idle(Instant::now());
        assert_eq!(modem.rx_status(), RxFsmState::NoCarrier);
        let _demod = PassthroughDemod;
    }
}
