//! A software HF modem core implementing MIL-STD-188-141D 4G Automatic
//! Link Establishment (ALE), its two Wideband ALE waveforms (Deep and
//! Fast), and MIL-STD-188-110D Appendix D serial-tone data waveforms
//! (waveforms 0-13 at 3/6/9/12 kHz).
//!
//! Layered bottom-up, matching `SPEC_FULL.md`'s component table:
//!
//! - [`tables`] — static Walsh/PN sequences, per-waveform parameters.
//! - [`fec`] — tail-biting convolutional codec, puncturer, interleaver,
//!   soft-decision Viterbi decoder.
//! - [`eom`], [`miniprobe`], [`preamble`] — 110D framing primitives.
//! - [`codec110d`], [`tx110d`], [`rx110d`] — the 110D TX/RX pipeline.
//! - [`ale`] — ALE FEC, PDU, WALE waveform, and link FSM.
//! - [`txfsm`], [`rxfsm`], [`arbiter`], [`events`] — the DTE-facing layer.
//! - [`modem`] — the host-adapter-facing handle tying all of the above
//!   together.
//! - [`phy`] — the external `UnifiedMod`/`UnifiedDemod` interface this
//!   crate drives but never implements (§1 "Out of scope").

pub mod ale;
pub mod arbiter;
pub mod codec110d;
pub mod config;
pub mod eom;
pub mod errors;
pub mod events;
pub mod fec;
pub mod logging;
pub mod miniprobe;
pub mod modem;
pub mod phy;
pub mod preamble;
pub mod rx110d;
pub mod rxfsm;
pub mod tables;
pub mod tx110d;
pub mod txfsm;

pub use config::ModemConfig;
pub use errors::{ModemError, Result};
pub use modem::Modem;
