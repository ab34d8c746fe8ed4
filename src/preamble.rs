//! Preamble build/decode: WID, Downcount, Walsh/PN-scrambled framing, and
//! sync correlation (§3, §4.9).
//!
//! The chip-level model here works directly on sign values (`+1`/`-1`) per
//! Walsh chip rather than carrying full 8-PSK IQ phase — the analog
//! modulation/demodulation is the external `UnifiedMod`/`UnifiedDemod`'s
//! job (§6); this module picks up at their hard-chip output. Phase
//! ambiguity collapses to a single sign inversion at this layer, which is
//! searched alongside the skip/offset cross-product exactly as §4.9
//! describes (documented in DESIGN.md).

use crate::errors::FrameError;
use crate::tables::{self, ConstraintLength, InterleaverType, PnSequence, Waveform};

/// Waveform ID (§3): 10 bits over 5 dibits / 5 Walsh symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wid {
    pub waveform: Waveform,
    pub interleaver: InterleaverType,
    pub constraint_length: ConstraintLength,
}

impl Wid {
    /// `d9..d0`, MSB (`d9`) first.
    fn encode_bits(&self) -> [u8; 10] {
        let mut d = [0u8; 10];
        let wf = self.waveform.id();
        for i in 0..4 {
            d[i] = (wf >> (3 - i)) & 1; // d9..d6
        }
        let ilv = self.interleaver.code();
        for i in 0..2 {
            d[4 + i] = (ilv >> (1 - i)) & 1; // d5,d4
        }
        d[6] = match self.constraint_length {
            ConstraintLength::K7 => 0,
            ConstraintLength::K9 => 1,
        }; // d3

        let (d9, d8, d7, d6, d5, d4, d3) = (d[0], d[1], d[2], d[3], d[4], d[5], d[6]);
        d[7] = d9 ^ d8 ^ d7; // d2
        d[8] = d7 ^ d6 ^ d5; // d1
        d[9] = d5 ^ d4 ^ d3; // d0
        d
    }

    /// 5 dibits, MSB-first pairs of `encode_bits`.
    pub fn dibits(&self) -> [u8; 5] {
        let d = self.encode_bits();
        let mut out = [0u8; 5];
        for i in 0..5 {
            out[i] = (d[2 * i] << 1) | d[2 * i + 1];
        }
        out
    }

    pub fn decode(dibits: &[u8]) -> Result<Wid, FrameError> {
        if dibits.len() != 5 {
            return Err(FrameError::InsufficientSymbols {
                required: 5,
                available: dibits.len(),
            });
        }
        let mut d = [0u8; 10];
        for i in 0..5 {
            d[2 * i] = (dibits[i] >> 1) & 1;
            d[2 * i + 1] = dibits[i] & 1;
        }
        let (d9, d8, d7, d6, d5, d4, d3, d2, d1, d0) =
            (d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7], d[8], d[9]);

        if (d9 ^ d8 ^ d7) != d2 || (d7 ^ d6 ^ d5) != d1 || (d5 ^ d4 ^ d3) != d0 {
            return Err(FrameError::WidChecksumMismatch);
        }

        let wf_id = (d9 << 3) | (d8 << 2) | (d7 << 1) | d6;
        let waveform =
            Waveform::from_id(wf_id).map_err(|_| FrameError::WidReservedValue(wf_id))?;
        let interleaver = InterleaverType::from_code((d5 << 1) | d4);
        let constraint_length = if d3 == 0 {
            ConstraintLength::K7
        } else {
            ConstraintLength::K9
        };

        Ok(Wid {
            waveform,
            interleaver,
            constraint_length,
        })
    }
}

/// Super-frame countdown (§3): 8 bits over 4 dibits, `count = 0` marks the
/// last super-frame before data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Downcount {
    pub count: u8,
}

impl Downcount {
    /// `b7..b0`, MSB first.
    fn encode_bits(count: u8) -> [u8; 8] {
        let mut b = [0u8; 8];
        for i in 0..5 {
            b[3 + i] = (count >> (4 - i)) & 1; // b4..b0
        }
        let (b4, b3, b2, b1, b0) = (b[3], b[4], b[5], b[6], b[7]);
        b[0] = b1 ^ b2 ^ b3; // b7
        b[1] = b2 ^ b3 ^ b4; // b6
        b[2] = b0 ^ b1 ^ b2; // b5
        b
    }

    pub fn encode(count: u8) -> Downcount {
        Downcount { count: count & 0x1F }
    }

    pub fn dibits(&self) -> [u8; 4] {
        let b = Self::encode_bits(self.count);
        let mut out = [0u8; 4];
        for i in 0..4 {
            out[i] = (b[2 * i] << 1) | b[2 * i + 1];
        }
        out
    }

    pub fn decode(dibits: &[u8]) -> Result<Downcount, FrameError> {
        if dibits.len() != 4 {
            return Err(FrameError::InsufficientSymbols {
                required: 4,
                available: dibits.len(),
            });
        }
        let mut b = [0u8; 8];
        for i in 0..4 {
            b[2 * i] = (dibits[i] >> 1) & 1;
            b[2 * i + 1] = dibits[i] & 1;
        }
        let (b7, b6, b5, b4, b3, b2, b1, b0) =
            (b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]);

        if (b1 ^ b2 ^ b3) != b7 || (b2 ^ b3 ^ b4) != b6 || (b0 ^ b1 ^ b2) != b5 {
            return Err(FrameError::DowncountParityMismatch);
        }

        let count = (b4 << 4) | (b3 << 3) | (b2 << 2) | (b1 << 1) | b0;
        Ok(Downcount { count })
    }
}

fn pn_chip_sign(pn: PnSequence, idx: usize) -> i8 {
    if pn.octants()[idx % 256] % 2 == 1 {
        -1
    } else {
        1
    }
}

fn fixed_block(chip_len: usize) -> Vec<i8> {
    (0..chip_len).map(|i| pn_chip_sign(PnSequence::Fixed, i)).collect()
}

fn tlc_block(chip_len: usize) -> Vec<i8> {
    fixed_block(chip_len).iter().map(|&c| -c).collect()
}

fn dibit_block(dibit: u8, pn: PnSequence, chip_len: usize) -> Result<Vec<i8>, FrameError> {
    let walsh = tables::walsh_sequence(dibit, chip_len).map_err(|_| FrameError::InsufficientSymbols {
        required: chip_len,
        available: 0,
    })?;
    Ok((0..chip_len)
        .map(|i| {
            let base = pn_chip_sign(pn, i);
            if walsh[i] == 0 {
                base
            } else {
                -base
            }
        })
        .collect())
}

fn descramble(chips: &[i8], pn: PnSequence, invert: bool) -> Vec<i8> {
    let sign = if invert { -1 } else { 1 };
    chips
        .iter()
        .enumerate()
        .map(|(i, &c)| c * pn_chip_sign(pn, i) * sign)
        .collect()
}

/// Assemble `tlc_blocks` TLC blocks followed by `m` super-frames of
/// `Fixed ⧺ Count ⧺ WID`, counting down from `m-1` to `0` (§6). `Fixed` is
/// one Walsh symbol when `m == 1`, nine when `m > 1` (§6, §9).
pub fn build_preamble(
    wid: &Wid,
    m: usize,
    tlc_blocks: usize,
    chip_len: usize,
) -> Result<Vec<i8>, FrameError> {
    let mut out = Vec::new();
    for _ in 0..tlc_blocks {
        out.extend(tlc_block(chip_len));
    }
    let fixed_len_blocks = if m <= 1 { 1 } else { 9 };
    for sf in 0..m.max(1) {
        for _ in 0..fixed_len_blocks {
            out.extend(fixed_block(chip_len));
        }
        let downcount = Downcount::encode((m - 1 - sf) as u8);
        for dibit in downcount.dibits() {
            out.extend(dibit_block(dibit, PnSequence::Count, chip_len)?);
        }
        for dibit in wid.dibits() {
            out.extend(dibit_block(dibit, PnSequence::Wid, chip_len)?);
        }
    }
    Ok(out)
}

/// Hit kind returned by [`find_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHit {
    Tlc(usize),
    Sync(usize),
}

/// Correlate `stream` against the Fixed PN over a sliding `chip_len`
/// window; the first window whose normalized correlation exceeds
/// `threshold` in magnitude wins (default `0.6`), discriminated by sign —
/// TLC is the Fixed PN's exact negation, so a strong negative correlation
/// is a TLC block and a strong positive one is a Sync block (§4.9).
pub fn find_sync(stream: &[i8], chip_len: usize, threshold: f64) -> Option<SyncHit> {
    if chip_len == 0 || stream.len() < chip_len {
        return None;
    }
    for start in 0..=(stream.len() - chip_len) {
        let window = &stream[start..start + chip_len];
        let raw: f64 = window
            .iter()
            .enumerate()
            .map(|(i, &c)| c as f64 * pn_chip_sign(PnSequence::Fixed, i) as f64)
            .sum();
        let corr_sync = raw / chip_len as f64;
        if corr_sync <= -threshold {
            return Some(SyncHit::Tlc(start));
        }
        if corr_sync >= threshold {
            return Some(SyncHit::Sync(start));
        }
    }
    None
}

/// A decoded super-frame: WID, Downcount, how many chips it consumed, and
/// which phase hypothesis won (persisted for later super-frames, §4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperFrameDecode {
    pub wid: Wid,
    pub downcount: Downcount,
    pub consumed_chips: usize,
    pub phase_invert: bool,
}

/// Cross-product search over `{invert} x {skip in [0,W,8W,9W]} x {offset in
/// [0,4,8,12,16]}`: the first combination producing both a valid Downcount
/// parity and a valid WID checksum wins (§4.9, §9 "symbol-phase
/// ambiguity").
pub fn decode_super_frame(stream: &[i8], chip_len: usize) -> Result<SuperFrameDecode, FrameError> {
    let w = chip_len;
    let skips = [0, w, 8 * w, 9 * w];
    let offsets = [0usize, 4, 8, 12, 16];
    let needed = 9 * w; // 4 Downcount dibits + 5 WID dibits

    for &invert in &[false, true] {
        for &skip in &skips {
            for &offset in &offsets {
                let start = skip + offset;
                if start + needed > stream.len() {
                    continue;
                }
                let mut dibits = [0u8; 9];
                for (i, dibit) in dibits.iter_mut().enumerate() {
                    let block = &stream[start + i * w..start + (i + 1) * w];
                    let pn = if i < 4 {
                        PnSequence::Count
                    } else {
                        PnSequence::Wid
                    };
                    let descrambled = descramble(block, pn, invert);
                    let (d, _corr) = tables::walsh_demod(&descrambled);
                    *dibit = d;
                }
                let downcount = Downcount::decode(&dibits[0..4]);
                let wid = Wid::decode(&dibits[4..9]);
                if let (Ok(downcount), Ok(wid)) = (downcount, wid) {
                    return Ok(SuperFrameDecode {
                        wid,
                        downcount,
                        consumed_chips: start + needed,
                        phase_invert: invert,
                    });
                }
            }
        }
    }
    Err(FrameError::SuperFrameAmbiguityUnresolved)
}

/// Decode a subsequent super-frame once the phase/skip ambiguity has
/// already been resolved by [`decode_super_frame`]: the fixed 18-Walsh-
/// symbol layout (`9` Fixed `+ 4` Count `+ 5` WID, `m > 1`) applies
/// directly with the persisted `phase_invert` (§4.9, §4.10).
pub fn decode_next_super_frame(
    stream: &[i8],
    chip_len: usize,
    phase_invert: bool,
) -> Result<SuperFrameDecode, FrameError> {
    let w = chip_len;
    let start = 9 * w;
    let needed = 9 * w;
    if start + needed > stream.len() {
        return Err(FrameError::InsufficientSymbols {
            required: start + needed,
            available: stream.len(),
        });
    }
    let mut dibits = [0u8; 9];
    for (i, dibit) in dibits.iter_mut().enumerate() {
        let block = &stream[start + i * w..start + (i + 1) * w];
        let pn = if i < 4 { PnSequence::Count } else { PnSequence::Wid };
        let descrambled = descramble(block, pn, phase_invert);
        let (d, _corr) = tables::walsh_demod(&descrambled);
        *dibit = d;
    }
    let downcount = Downcount::decode(&dibits[0..4])?;
    let wid = Wid::decode(&dibits[4..9])?;
    Ok(SuperFrameDecode {
        wid,
        downcount,
        consumed_chips: start + needed,
        phase_invert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_wid() -> Wid {
        Wid {
            waveform: Waveform::WF9,
            interleaver: InterleaverType::Long,
            constraint_length: ConstraintLength::K9,
        }
    }

    #[test]
    fn wid_round_trips_for_all_valid_waveforms() {
        for wf_id in 0..=13u8 {
            let wid = Wid {
                waveform: Waveform::from_id(wf_id).unwrap(),
                interleaver: InterleaverType::Medium,
                constraint_length: ConstraintLength::K7,
            };
            let decoded = Wid::decode(&wid.dibits()).unwrap();
            assert_eq!(decoded, wid);
        }
    }

    #[test]
    fn wid_single_dibit_corruption_fails_checksum() {
        let wid = sample_wid();
        let mut dibits = wid.dibits();
        dibits[0] ^= 0b01;
        assert_eq!(Wid::decode(&dibits), Err(FrameError::WidChecksumMismatch));
    }

    #[test]
    fn downcount_round_trips_for_all_counts() {
        for count in 0..=31u8 {
            let dc = Downcount::encode(count);
            let decoded = Downcount::decode(&dc.dibits()).unwrap();
            assert_eq!(decoded.count, count);
        }
    }

    #[test]
    fn downcount_single_dibit_corruption_fails_parity() {
        let dc = Downcount::encode(17);
        let mut dibits = dc.dibits();
        dibits[2] ^= 0b10;
        assert_eq!(
            Downcount::decode(&dibits),
            Err(FrameError::DowncountParityMismatch)
        );
    }

    #[test]
    fn find_sync_locates_leading_tlc_run() {
        let wid = sample_wid();
        let chip_len = 32;
        let preamble = build_preamble(&wid, 2, 2, chip_len).unwrap();
        let hit = find_sync(&preamble, chip_len, 0.6).expect("sync hit");
        assert_eq!(hit, SyncHit::Tlc(0));
    }

    #[test]
    fn super_frame_decode_round_trip_noise_free() {
        // Once sync processing has consumed any leading TLC run, the
        // decoder starts exactly at the first super-frame's Fixed section.
        let wid = sample_wid();
        let chip_len = 32;
        let m = 2;
        let preamble = build_preamble(&wid, m, 0, chip_len).unwrap();

        let decoded = decode_super_frame(&preamble, chip_len).expect("super-frame decode");
        assert_eq!(decoded.wid, wid);
        assert_eq!(decoded.downcount.count, (m - 1) as u8);
        assert!(!decoded.phase_invert);
    }

    #[test]
    fn decode_next_super_frame_walks_the_full_countdown() {
        let wid = sample_wid();
        let chip_len = 32;
        let m = 3;
        let preamble = build_preamble(&wid, m, 0, chip_len).unwrap();

        let first = decode_super_frame(&preamble, chip_len).expect("first super-frame");
        assert_eq!(first.downcount.count, (m - 1) as u8);

        let mut consumed = first.consumed_chips;
        let mut counts = vec![first.downcount.count];
        while counts.last() != Some(&0) {
            let next = decode_next_super_frame(&preamble[consumed..], chip_len, first.phase_invert)
                .expect("subsequent super-frame");
            assert_eq!(next.wid, wid);
            counts.push(next.downcount.count);
            consumed += next.consumed_chips;
        }
        assert_eq!(counts, vec![2, 1, 0]);
    }
}
