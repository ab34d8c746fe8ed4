//! MIL-STD-188-141D 4G Automatic Link Establishment: PDU framing, the
//! dedicated conv+interleave+dibit/tribit FEC pipeline, the Walsh/PN
//! wideband preamble, and the link-establishment FSM (§4.9-§4.13).

pub mod encoding;
pub mod link;
pub mod pdu;
pub mod walsh;
pub mod waveform;

pub use link::{Link, LinkEvent, LinkInfo, LinkState, Role, TerminationReason};
pub use pdu::Pdu;
pub use waveform::WaleMode;
