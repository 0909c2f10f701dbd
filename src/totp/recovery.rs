//! Single-use recovery codes backing the TOTP challenge.
//!
//! A batch is minted alongside every enrollment and shown to the user once.
//! Each code burns on use: consuming one yields the surviving batch, which
//! replaces the stored list atomically.

use rand::Rng;

/// Codes handed out per enrollment.
pub(crate) const RECOVERY_CODE_COUNT: usize = 8;

const RECOVERY_CODE_LEN: usize = 10;

// No 0/O/1/I, codes get read back over the phone.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Mint a fresh batch of distinct recovery codes.
#[must_use]
pub fn generate_batch() -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut batch: Vec<String> = Vec::with_capacity(RECOVERY_CODE_COUNT);
    while batch.len() < RECOVERY_CODE_COUNT {
        let code: String = (0..RECOVERY_CODE_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        if !batch.contains(&code) {
            batch.push(code);
        }
    }
    batch
}

/// Burn `candidate` if it matches one of `codes`.
///
/// Returns the surviving batch on a match, `None` otherwise. Every stored
/// code is compared in full so the scan takes the same time whether the
/// candidate matches the first entry, the last, or none at all.
#[must_use]
pub fn consume(codes: &[String], candidate: &str) -> Option<Vec<String>> {
    let mut matched: Option<usize> = None;
    for (index, code) in codes.iter().enumerate() {
        if eq_constant_time(code.as_bytes(), candidate.as_bytes()) && matched.is_none() {
            matched = Some(index);
        }
    }
    let burned = matched?;
    Some(
        codes
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != burned)
            .map(|(_, code)| code.clone())
            .collect(),
    )
}

fn eq_constant_time(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (a, b) in left.iter().zip(right.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{ALPHABET, RECOVERY_CODE_COUNT, RECOVERY_CODE_LEN, consume, generate_batch};

    #[test]
    fn batch_has_expected_shape() {
        let batch = generate_batch();
        assert_eq!(batch.len(), RECOVERY_CODE_COUNT);
        for code in &batch {
            assert_eq!(code.len(), RECOVERY_CODE_LEN);
            assert!(code.bytes().all(|byte| ALPHABET.contains(&byte)));
        }
    }

    #[test]
    fn batch_codes_are_distinct() {
        let batch = generate_batch();
        for (index, code) in batch.iter().enumerate() {
            assert!(!batch[index + 1..].contains(code));
        }
    }

    #[test]
    fn consume_burns_exactly_the_matched_code() {
        let batch = generate_batch();
        let target = batch[3].clone();
        let survivors = consume(&batch, &target).unwrap();
        assert_eq!(survivors.len(), RECOVERY_CODE_COUNT - 1);
        assert!(!survivors.contains(&target));
        for code in &survivors {
            assert!(batch.contains(code));
        }
    }

    #[test]
    fn consume_is_single_use() {
        let batch = generate_batch();
        let target = batch[0].clone();
        let survivors = consume(&batch, &target).unwrap();
        assert!(consume(&survivors, &target).is_none());
    }

    #[test]
    fn consume_rejects_unknown_and_near_miss_codes() {
        let batch = generate_batch();
        assert!(consume(&batch, "NOTACODE22").is_none());
        assert!(consume(&batch, "").is_none());
        let mut truncated = batch[0].clone();
        truncated.pop();
        assert!(consume(&batch, &truncated).is_none());
    }

    #[test]
    fn consume_on_empty_batch_is_none() {
        assert!(consume(&[], "ANYTHING22").is_none());
    }
}
