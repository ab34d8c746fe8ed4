//! End-to-end 110D transmission: `Tx110D::assemble` straight into
//! `Rx110D::process` over a noise-free channel, exercising preamble sync,
//! WID decode, mini-probe correction, and tail-biting Viterbi decode
//! together rather than as isolated units.

use mil188_modem_core::rx110d::{Rx110D, Rx110DEvent};
use mil188_modem_core::tables::{Bandwidth, ConstraintLength, InterleaverType, Waveform};
use mil188_modem_core::tx110d::{PreambleShape, Tx110D};

fn bit_stream(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state & 1) as u8
        })
        .collect()
}

#[test]
fn full_duplex_loopback_decodes_original_payload() {
    let waveform = Waveform::WF0;
    let bandwidth = Bandwidth::Khz3;
    let interleaver = InterleaverType::Short;
    let constraint = ConstraintLength::K7;

    let tx = Tx110D::new(waveform, bandwidth, interleaver, constraint).unwrap();
    let bits = bit_stream(600, 0xC0FFEE);
    let shape = PreambleShape {
        super_frames: 1,
        tlc_blocks: 1,
    };
    let iq = tx.assemble(&bits, true, shape).unwrap();

    let mut rx = Rx110D::new(bandwidth);
    rx.start();
    let events = rx.process(&iq).unwrap();

    let wid_event = events
        .iter()
        .find(|e| matches!(e, Rx110DEvent::WidDecoded { .. }))
        .expect("WID should decode from a clean preamble");
    match wid_event {
        Rx110DEvent::WidDecoded {
            waveform: w,
            interleaver: i,
            constraint_length: c,
        } => {
            assert_eq!(*w, waveform);
            assert_eq!(*i, interleaver);
            assert_eq!(*c, constraint);
        }
        _ => unreachable!(),
    }

    assert!(events.iter().any(|e| matches!(e, Rx110DEvent::DataStart)));
    assert!(events.iter().any(|e| matches!(e, Rx110DEvent::EotDetected)));

    let complete = events
        .iter()
        .find_map(|e| match e {
            Rx110DEvent::Complete(decoded) => Some(decoded),
            _ => None,
        })
        .expect("a clean transmission should reach Complete");
    assert!(complete.eom_detected_at.is_some());
    assert_eq!(complete.data, bits);
}

#[test]
fn restarting_after_completion_allows_a_second_transmission() {
    let waveform = Waveform::WF0;
    let bandwidth = Bandwidth::Khz3;
    let interleaver = InterleaverType::Short;
    let constraint = ConstraintLength::K7;

    let tx = Tx110D::new(waveform, bandwidth, interleaver, constraint).unwrap();
    let shape = PreambleShape {
        super_frames: 1,
        tlc_blocks: 1,
    };

    let mut rx = Rx110D::new(bandwidth);

    for seed in [0xABCDu64, 0x1234] {
        let bits = bit_stream(300, seed);
        let iq = tx.assemble(&bits, true, shape).unwrap();
        rx.start();
        let events = rx.process(&iq).unwrap();
        let decoded = events
            .iter()
            .find_map(|e| match e {
                Rx110DEvent::Complete(decoded) => Some(decoded),
                _ => None,
            })
            .expect("each transmission should independently complete");
        assert_eq!(decoded.data, bits);
    }
}
