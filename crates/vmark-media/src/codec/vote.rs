//! Majority voting over redundant bits and candidate strings.

use std::collections::HashMap;

/// Collapse runs of `group` repeated bits into one bit each.
///
/// A group decodes to `1` only when strictly more than half of its bits are
/// `1`; ties decode to `0`. A trailing partial group is voted on its own.
pub fn majority_bits(bits: &[u8], group: usize) -> Vec<u8> {
    if group <= 1 {
        return bits.to_vec();
    }
    bits.chunks(group)
        .map(|chunk| {
            let ones = chunk.iter().filter(|b| **b == 1).count();
            u8::from(ones > chunk.len() / 2)
        })
        .collect()
}

/// Most frequent whole string among the candidates.
///
/// Ties go to the candidate seen first. Returns `None` for no candidates.
pub fn majority_string<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, candidate) in candidates.into_iter().enumerate() {
        counts.entry(candidate).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(text, _)| text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_bits() {
        assert_eq!(majority_bits(&[1, 1, 0, 0, 0, 1, 1, 1, 1], 3), vec![1, 0, 1]);
        assert_eq!(majority_bits(&[1, 0, 1, 0], 2), vec![0, 0]);
        assert_eq!(majority_bits(&[1, 0, 1], 1), vec![1, 0, 1]);
    }

    #[test]
    fn test_majority_bits_partial_group() {
        assert_eq!(majority_bits(&[1, 1, 1, 1], 3), vec![1, 1]);
    }

    #[test]
    fn test_majority_string() {
        let winner = majority_string(vec!["abc".to_string(), "abd".into(), "abd".into()]);
        assert_eq!(winner.as_deref(), Some("abd"));
    }

    #[test]
    fn test_majority_string_tie_first_seen() {
        let winner = majority_string(vec!["x".to_string(), "y".into(), "y".into(), "x".into()]);
        assert_eq!(winner.as_deref(), Some("x"));
        assert_eq!(majority_string(Vec::new()), None);
    }
}
