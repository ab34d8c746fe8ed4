//! Soft-decision Viterbi decoder over the tail-biting trellis (§4.7).
//!
//! The trellis is built implicitly from the state convention shared with
//! [`super::conv`]: a state's top bit is the input bit that produced it, so
//! a state has exactly two predecessors — `(state_without_top << 1) | 0`
//! and `| 1` — both reached via the same input bit, `top_bit(state)`.
//! Traceback therefore walks the recorded predecessor chain and reads the
//! decoded bit straight off each state, rather than storing it separately.

use crate::errors::FecError;
use crate::tables::ConstraintLength;

use super::conv::branch_output;

fn top_bit(state: u32, k: u8) -> u8 {
    ((state >> (k - 2)) & 1) as u8
}

fn predecessors(state: u32, k: u8) -> (u32, u32) {
    let without_top = state & ((1 << (k - 2)) - 1);
    (without_top << 1, (without_top << 1) | 1)
}

/// `eᵢ = +1` if expected bit is 0, else `-1` (§4.7).
fn expected(bit: u8) -> f64 {
    if bit == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Decode `soft` (one `(r0, r1)` pair per trellis step, i.e. `2*N` floats for
/// `N` steps) with all states initialised to metric 0 (tail-biting requires
/// this rather than the legacy zero-tail's 0-state-only init, §9). Returns
/// the `N`-bit decoded sequence in the rotated (not yet un-rotated) trellis
/// order; callers on the tail-biting data path must follow with
/// [`rotate_tail_biting`].
pub fn decode(soft: &[f64], constraint: ConstraintLength) -> Result<Vec<u8>, FecError> {
    if soft.len() % 2 != 0 {
        return Err(FecError::OddSoftBufferLength(soft.len()));
    }
    let k = constraint.k();
    let generators = constraint.generators();
    let num_states = constraint.num_states();
    let n = soft.len() / 2;

    let mut metrics = vec![0.0_f64; num_states];
    // best_pred[t][state] = predecessor state recorded while arriving at
    // `state` at step t.
    let mut best_pred: Vec<Vec<u32>> = Vec::with_capacity(n);

    for t in 0..n {
        let r0 = soft[2 * t];
        let r1 = soft[2 * t + 1];
        let mut next_metrics = vec![f64::INFINITY; num_states];
        let mut step_pred = vec![0u32; num_states];

        for ns in 0..num_states as u32 {
            let bit = top_bit(ns, k);
            let (s0, s1) = predecessors(ns, k);
            let mut best_metric = f64::INFINITY;
            let mut best_s = s0;
            for &s in &[s0, s1] {
                let (o1, o2) = branch_output(generators, k, s, bit);
                let branch_metric = -(r0 * expected(o1) + r1 * expected(o2));
                let candidate = metrics[s as usize] + branch_metric;
                if candidate < best_metric {
                    best_metric = candidate;
                    best_s = s;
                }
            }
            next_metrics[ns as usize] = best_metric;
            step_pred[ns as usize] = best_s;
        }

        metrics = next_metrics;
        best_pred.push(step_pred);
    }

    let mut state = (0..num_states as u32)
        .min_by(|&a, &b| metrics[a as usize].partial_cmp(&metrics[b as usize]).unwrap())
        .unwrap_or(0);

    let mut bits = vec![0u8; n];
    for t in (0..n).rev() {
        bits[t] = top_bit(state, k);
        state = best_pred[t][state as usize];
    }

    Ok(bits)
}

/// Undo the tail-biting encoder's preload rotation (§4.2, §9): the decoded
/// sequence's last `K-1` bits are the *first* `K-1` input bits, because the
/// encoder re-encoded the preload as the tail.
pub fn rotate_tail_biting(decoded: &[u8], constraint: ConstraintLength) -> Vec<u8> {
    let k = constraint.k() as usize;
    let preload_len = k - 1;
    if decoded.len() <= preload_len {
        return decoded.to_vec();
    }
    let split = decoded.len() - preload_len;
    let mut out = Vec::with_capacity(decoded.len());
    out.extend_from_slice(&decoded[split..]);
    out.extend_from_slice(&decoded[..split]);
    out
}

#[cfg(test)]
mod tests {
    use super::super::conv::encode_tail_biting;
    use super::*;

    fn to_soft(coded: &[u8]) -> Vec<f64> {
        coded
            .iter()
            .map(|&b| if b == 0 { 1.0 } else { -1.0 })
            .collect()
    }

    #[test]
    fn noise_free_tail_biting_round_trip() {
        for &k in &[ConstraintLength::K7, ConstraintLength::K9] {
            let bits: Vec<u8> = (0..200).map(|i| ((i * 7 + 3) % 5 == 0) as u8).collect();
            let coded = encode_tail_biting(&bits, k).unwrap();
            let soft = to_soft(&coded);
            let decoded = decode(&soft, k).unwrap();
            let rotated = rotate_tail_biting(&decoded, k);
            assert_eq!(rotated, bits);
        }
    }

    #[test]
    fn rejects_odd_length_soft_buffer() {
        assert!(decode(&[1.0, -1.0, 1.0], ConstraintLength::K7).is_err());
    }
}
