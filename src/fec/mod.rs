//! Forward error correction pipeline: tail-biting convolutional codec,
//! puncturer, block interleaver, and the soft-decision Viterbi decoder
//! (§4.2-§4.4, §4.7).

pub mod conv;
pub mod interleave;
pub mod puncture;
pub mod viterbi;

pub use conv::{encode_tail_biting, encode_zero_tail};
pub use puncture::Puncturer;
pub use viterbi::{decode as viterbi_decode, rotate_tail_biting};
