//! Ambient configuration types: timeouts, queueing, duplex mode, and the
//! construction-time parameter set handed to a `Modem`.
//!
//! Every knob has a spec-mandated default and can be overridden
//! independently at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::tables::{Bandwidth, ConstraintLength, InterleaverType, Waveform};

/// Half-duplex arbitration policy (§4.16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DuplexMode {
    FullDuplex,
    #[default]
    HalfDuplexTxMaster,
    HalfDuplexRxMaster,
}

/// The §5 timeout table, with every default at its prescribed value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub t_lbt: Duration,
    pub t_lbr: Duration,
    pub t_tune: Duration,
    pub t_handshake: Duration,
    pub t_response: Duration,
    pub t_activity: Duration,
    pub rx_idle: Duration,
    pub drain: Duration,
    pub drain_forced: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            t_lbt: Duration::from_millis(200),
            t_lbr: Duration::from_millis(200),
            t_tune: Duration::from_millis(40),
            t_handshake: Duration::from_millis(100),
            t_response: Duration::from_millis(2000),
            t_activity: Duration::from_secs(30),
            rx_idle: Duration::from_millis(500),
            drain: Duration::from_secs(30),
            drain_forced: Duration::from_secs(1),
        }
    }
}

impl TimeoutConfig {
    /// Validate that every timeout is strictly positive (§7 "Fatal" row).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, Duration); 9] = [
            ("t_lbt", self.t_lbt),
            ("t_lbr", self.t_lbr),
            ("t_tune", self.t_tune),
            ("t_handshake", self.t_handshake),
            ("t_response", self.t_response),
            ("t_activity", self.t_activity),
            ("rx_idle", self.rx_idle),
            ("drain", self.drain),
            ("drain_forced", self.drain_forced),
        ];
        for (name, value) in checks {
            if value.is_zero() {
                return Err(ConfigError::InvalidTimeout { name });
            }
        }
        Ok(())
    }
}

/// TX queueing parameters (§4.14: prefill, backpressure).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum bytes the TX queue will hold before returning `queue_full`.
    pub max_queue_bytes: usize,
    /// Prefill threshold expressed as a multiple of the blocking factor
    /// (bytes per interleaver block). §GLOSSARY: "3 × blocking factor".
    pub prefill_blocks: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_bytes: 64 * 1024,
            prefill_blocks: 3,
        }
    }
}

/// Sample format accepted on the PHY boundary (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    /// 9600 Hz, mandatory for ALE and 110D RX.
    Hz9600,
    /// 48000 Hz, accepted for 110D TX only.
    Hz48000,
}

impl SampleRate {
    pub fn as_hz(self) -> u32 {
        match self {
            SampleRate::Hz9600 => 9600,
            SampleRate::Hz48000 => 48000,
        }
    }
}

/// The initial waveform selection for 110D transmission (§6: `set_tx_params`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaveformSelection {
    pub waveform: Waveform,
    pub bandwidth: Bandwidth,
    pub interleaver: InterleaverType,
    pub constraint_length: ConstraintLength,
}

impl Default for WaveformSelection {
    fn default() -> Self {
        Self {
            waveform: Waveform::WF0,
            bandwidth: Bandwidth::Khz3,
            interleaver: InterleaverType::Short,
            constraint_length: ConstraintLength::K7,
        }
    }
}

/// Aggregate construction-time configuration for a `Modem` instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModemConfig {
    pub duplex: DuplexMode,
    pub timeouts: TimeoutConfig,
    pub queue: QueueConfig,
    pub waveform: WaveformSelection,
}

impl ModemConfig {
    /// Validate the full configuration, surfacing fatal construction-time
    /// errors rather than letting them manifest mid-stream (§7).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()?;
        crate::tables::interleaver_params(
            self.waveform.waveform,
            self.waveform.interleaver,
            self.waveform.bandwidth,
        )
        .map_err(|_| ConfigError::ImpossibleWaveformBandwidth {
            waveform: self.waveform.waveform.id(),
            bandwidth_khz: self.waveform.bandwidth.khz(),
        })?;
        Ok(())
    }
}
