//! Modem error types with granular per-subsystem categories.

use thiserror::Error;

/// Top-level error type for all modem operations.
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("table lookup error: {0}")]
    Table(#[from] TableError),

    #[error("FEC error: {0}")]
    Fec(#[from] FecError),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("ALE error: {0}")]
    Ale(#[from] AleError),

    #[error("FSM error: {0}")]
    Fsm(#[from] FsmError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Static table lookup failures (§4.1: "unknown keys return a typed failure").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("waveform id {0} is reserved (14-15 are not assigned)")]
    ReservedWaveform(u8),

    #[error("no interleaver table entry for (waveform={waveform}, bandwidth_khz={bandwidth_khz})")]
    NoInterleaverEntry { waveform: u8, bandwidth_khz: u32 },

    #[error("unsupported bandwidth {0} kHz (must be one of 3, 6, 9, 12)")]
    UnsupportedBandwidth(u32),

    #[error("unknown Walsh dibit {0} (must be 0..=3)")]
    UnknownDibit(u8),
}

/// FEC pipeline errors: convolutional codec, puncturer, interleaver, Viterbi.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FecError {
    #[error("constraint length {0} is not supported (must be 7 or 9)")]
    UnsupportedConstraintLength(u8),

    #[error("unsupported code rate {numerator}/{denominator}")]
    UnsupportedRate { numerator: u32, denominator: u32 },

    #[error("puncture pattern length {pattern_len} does not divide soft buffer length {buffer_len}")]
    PunctureMisalignment { pattern_len: usize, buffer_len: usize },

    #[error("interleaver increment {increment} is not coprime with block size {size}")]
    NonCoprimeIncrement { increment: usize, size: usize },

    #[error("insufficient soft bits to flush: need at least {required}, have {available}")]
    InsufficientSoftBits { required: usize, available: usize },

    #[error("tail-biting input too short: need at least {need} bits, have {have}")]
    TailBitingTooShort { have: usize, need: usize },

    #[error("soft buffer length {0} is not a multiple of 2 (one pair per trellis step)")]
    OddSoftBufferLength(usize),

    #[error("block length {len} is not a multiple of interleaver size {size}")]
    BlockSizeMisalignment { len: usize, size: usize },
}

/// 110D preamble / sync / super-frame decode errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("WID checksum mismatch")]
    WidChecksumMismatch,

    #[error("WID encodes reserved waveform value {0}")]
    WidReservedValue(u8),

    #[error("Downcount parity mismatch")]
    DowncountParityMismatch,

    #[error("sync not found after {symbols_searched} symbols")]
    SyncNotFound { symbols_searched: usize },

    #[error("insufficient symbols: need {required}, have {available}")]
    InsufficientSymbols { required: usize, available: usize },

    #[error("no phase/skip hypothesis produced a valid super-frame")]
    SuperFrameAmbiguityUnresolved,
}

/// ALE PDU / link-layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AleError {
    #[error("PDU CRC mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    CrcMismatch { expected: u8, computed: u8 },

    #[error("unknown PDU variant discriminator {0:#04x}")]
    UnknownVariant(u8),

    #[error("PDU byte length {0} is not 12 (96 bits)")]
    InvalidPduLength(usize),

    #[error("capture-probe phase could not be resolved")]
    PhaseUnresolved,

    #[error("link FSM cannot {action} while in state {state}")]
    InvalidLinkTransition { action: &'static str, state: &'static str },
}

/// DTE-facing FSM / arbiter protocol errors (§7 "Protocol violations", "Resource errors").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsmError {
    #[error("operation {action} is not valid in state {state}")]
    InvalidState { action: &'static str, state: &'static str },

    #[error("TX queue full: {queued} bytes queued, capacity {capacity}")]
    QueueFull { queued: usize, capacity: usize },

    #[error("TX port not ready: RX is master and currently active")]
    PortNotReady,

    #[error("channel busy")]
    ChannelBusy,
}

/// Configuration / construction-time errors (§7 "Fatal": surfaced at construction).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("impossible waveform/bandwidth combination: waveform={waveform}, bandwidth_khz={bandwidth_khz}")]
    ImpossibleWaveformBandwidth { waveform: u8, bandwidth_khz: u32 },

    #[error("invalid timeout: {name} must be > 0")]
    InvalidTimeout { name: &'static str },

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),
}

/// Result type alias for modem operations.
pub type Result<T> = std::result::Result<T, ModemError>;
