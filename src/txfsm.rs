//! DTE-facing TX state machine: queueing with prefill/backpressure, half-
//! duplex arbitration, and the handoff into `Tx110D` framing (§4.14).

use crate::arbiter::{Arbiter, TxGrant};
use crate::config::{QueueConfig, WaveformSelection};
use crate::errors::FsmError;
use crate::phy::AudioSink;
use crate::tx110d::{PreambleShape, Tx110D};

/// `{Flushed, ArmedPortNotReady, ArmedPortReady, ReadyToStart, Starting,
/// Started, DrainingOk, DrainingForced}` (§4.14).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFsmState {
    Flushed,
    ArmedPortNotReady,
    ArmedPortReady,
    ReadyToStart,
    Starting,
    Started,
    DrainingOk,
    DrainingForced,
}

/// Packet boundary tag carried with every `tx_data` call (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOrder {
    First,
    Continuation,
    Last,
    FirstAndLast,
}

impl PacketOrder {
    fn is_last(self) -> bool {
        matches!(self, PacketOrder::Last | PacketOrder::FirstAndLast)
    }
}

struct QueuedPacket {
    bytes: Vec<u8>,
    order: PacketOrder,
}

/// Single-writer TX actor (§5) driving one rig's 110D transmission.
pub struct TxFsm {
    state: TxFsmState,
    queue: Vec<QueuedPacket>,
    queued_bytes: usize,
    queue_config: QueueConfig,
    waveform: WaveformSelection,
    blocking_factor_bytes: usize,
    last_queued: bool,
    assembler: Tx110D,
    use_eom: bool,
}

impl TxFsm {
    pub fn new(waveform: WaveformSelection, queue_config: QueueConfig) -> Result<Self, FsmError> {
        let assembler = Tx110D::new(
            waveform.waveform,
            waveform.bandwidth,
            waveform.interleaver,
            waveform.constraint_length,
        )
        .map_err(|_| FsmError::InvalidState {
            action: "construct",
            state: "Flushed",
        })?;
        let interleaver = crate::tables::interleaver_params(waveform.waveform, waveform.interleaver, waveform.bandwidth)
            .map_err(|_| FsmError::InvalidState {
                action: "construct",
                state: "Flushed",
            })?;
        Ok(Self {
            state: TxFsmState::Flushed,
            queue: Vec::new(),
            queued_bytes: 0,
            queue_config,
            waveform,
            blocking_factor_bytes: interleaver.input_bits.div_ceil(8).max(1),
            last_queued: false,
            assembler,
            use_eom: true,
        })
    }

    pub fn state(&self) -> TxFsmState {
        self.state
    }

    fn prefill_bytes(&self) -> usize {
        self.queue_config.prefill_blocks * self.blocking_factor_bytes
    }

    /// `arm` (§4.14): valid only from `Flushed`; consults the arbiter.
    pub fn arm(&mut self, arbiter: &mut Arbiter) -> Result<TxFsmState, FsmError> {
        if self.state != TxFsmState::Flushed {
            return Err(FsmError::InvalidState {
                action: "arm",
                state: state_name(self.state),
            });
        }
        self.state = match arbiter.request_tx() {
            Ok(TxGrant::Granted) | Ok(TxGrant::GrantedRxAborted) => TxFsmState::ArmedPortReady,
            Err(FsmError::PortNotReady) => TxFsmState::ArmedPortNotReady,
            Err(e) => return Err(e),
        };
        Ok(self.state)
    }

    /// `tx_data(bytes, order)` (§4.14): queue, tagged, rejecting once the
    /// queue would exceed `max_queue_bytes`. Auto-transitions to
    /// `ReadyToStart` once prefill is met or a `Last`-tagged packet lands.
    pub fn tx_data(&mut self, bytes: Vec<u8>, order: PacketOrder) -> Result<TxFsmState, FsmError> {
        if !matches!(
            self.state,
            TxFsmState::ArmedPortReady | TxFsmState::ArmedPortNotReady | TxFsmState::ReadyToStart
        ) {
            return Err(FsmError::InvalidState {
                action: "tx_data",
                state: state_name(self.state),
            });
        }
        if self.queued_bytes + bytes.len() > self.queue_config.max_queue_bytes {
            return Err(FsmError::QueueFull {
                queued: self.queued_bytes,
                capacity: self.queue_config.max_queue_bytes,
            });
        }
        self.queued_bytes += bytes.len();
        if order.is_last() {
            self.last_queued = true;
        }
        self.queue.push(QueuedPacket { bytes, order });

        if self.state != TxFsmState::ReadyToStart
            && (self.queued_bytes >= self.prefill_bytes() || self.last_queued)
        {
            self.state = TxFsmState::ReadyToStart;
        }
        Ok(self.state)
    }

    /// `start` (§4.14): requires prefill or a queued `Last` packet. Encodes
    /// the full collected payload through the codec and 110D framing and
    /// hands the resulting audio to `sink`.
    pub fn start<S: AudioSink>(&mut self, sink: &mut S) -> Result<TxFsmState, FsmError> {
        if self.state != TxFsmState::ReadyToStart {
            return Err(FsmError::InvalidState {
                action: "start",
                state: state_name(self.state),
            });
        }
        if self.queued_bytes < self.prefill_bytes() && !self.last_queued {
            return Err(FsmError::InvalidState {
                action: "start",
                state: state_name(self.state),
            });
        }
        self.state = TxFsmState::Starting;

        let payload: Vec<u8> = self
            .queue
            .drain(..)
            .flat_map(|p| bytes_to_bits(&p.bytes))
            .collect();
        self.queued_bytes = 0;
        self.last_queued = false;

        let iq = self
            .assembler
            .assemble(&payload, self.use_eom, PreambleShape::default())
            .map_err(|_| FsmError::InvalidState {
                action: "start",
                state: "Starting",
            })?;

        // The external UnifiedMod (§6) owns the actual carrier/pulse
        // shaping; lacking that collaborator here, forward the assembled
        // complex symbols to the sink as interleaved I/Q so tests and
        // in-process sinks can observe the completed assembly.
        let pcm: Vec<i16> = iq
            .iter()
            .flat_map(|c| [c.re as i16, c.im as i16])
            .collect();
        sink.push(&pcm);

        self.state = TxFsmState::Started;
        Ok(self.state)
    }

    /// `abort` (§4.14, §5): forces `DrainingForced` immediately.
    pub fn abort(&mut self) -> TxFsmState {
        self.state = TxFsmState::DrainingForced;
        self.state
    }

    /// Observed underrun (§4.14): same forced-drain path as `abort`.
    pub fn on_underrun(&mut self) -> TxFsmState {
        self.abort()
    }

    /// Audio-sink completion event (§4.14): release TX to the arbiter and
    /// return to `Flushed`.
    pub fn on_sink_complete(&mut self, arbiter: &mut Arbiter) -> TxFsmState {
        if matches!(self.state, TxFsmState::Started) {
            self.state = TxFsmState::DrainingOk;
        }
        arbiter.release_tx();
        self.state = TxFsmState::Flushed;
        self.state
    }

    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    pub fn free_bytes(&self) -> usize {
        self.queue_config.max_queue_bytes - self.queued_bytes
    }

    pub fn blocking_factor_bytes(&self) -> usize {
        self.blocking_factor_bytes
    }

    pub fn data_rate_bps(&self) -> usize {
        self.waveform.waveform.data_rate_bps(self.waveform.bandwidth)
    }
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&b| (0..8).rev().map(move |shift| (b >> shift) & 1))
        .collect()
}

fn state_name(state: TxFsmState) -> &'static str {
    match state {
        TxFsmState::Flushed => "Flushed",
        TxFsmState::ArmedPortNotReady => "ArmedPortNotReady",
        TxFsmState::ArmedPortReady => "ArmedPortReady",
        TxFsmState::ReadyToStart => "ReadyToStart",
        TxFsmState::Starting => "Starting",
        TxFsmState::Started => "Started",
        TxFsmState::DrainingOk => "DrainingOk",
        TxFsmState::DrainingForced => "DrainingForced",
    }
}
