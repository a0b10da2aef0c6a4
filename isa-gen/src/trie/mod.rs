//! The byte-trie decoder builder: compiles a set of bit
//! patterns into a flat, pointer-free, byte-indexed prefix-matching table.
//!
//! The layout — one contiguous array of 256-entry blocks, with negative
//! entries encoding payload indices rather than pointers — is the same
//! strategy `cretonne`'s two-level encoding hash tables use for their
//! `Level1Entry`/`Level2Entry` tables: no pointers, only indices into a
//! flat array, so the whole structure is `Sync` and trivially relocatable.

use std::collections::HashMap;

use tracing::debug;

use crate::error::TrieError;

const BLOCK_SIZE: usize = 256;

/// One instruction pattern as seen by the trie builder: a required-bit
/// mask and the value those bits must take, both given byte by byte, plus
/// an opaque payload and a human-readable tag for diagnostics.
#[derive(Debug, Clone)]
pub struct Pattern<P> {
    pub tag: String,
    pub required_mask: Vec<u8>,
    pub value_mask: Vec<u8>,
    pub payload: P,
}

impl<P> Pattern<P> {
    fn consistent_with(&self, depth: usize, byte: u8) -> bool {
        let req = self.required_mask[depth];
        let val = self.value_mask[depth];
        (byte & req) == (val & req)
    }
}

/// A flat, byte-indexed prefix-matching automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteTrie<P> {
    /// A concatenation of 256-entry blocks. Non-negative entries are
    /// indices into this same vector (a child block); negative entries
    /// `-(p + 1)` encode payload index `p`; `i32::MIN` is the no-match
    /// sentinel.
    pub bytes: Vec<i32>,
    pub payloads: Vec<P>,
    pub size: usize,
    pub start_index: usize,
}

const NO_MATCH: i32 = i32::MIN;

impl<P: Clone> ByteTrie<P> {
    /// Consumes bytes from `input` one at a time until a payload is
    /// reached, the no-match sentinel is reached, or `input` is exhausted.
    ///
    /// Returns the payload and the number of bytes consumed on a match;
    /// `None` on no match (the number of bytes consumed up to the point of
    /// failure is not reported).
    pub fn decode(&self, input: &[u8]) -> Option<(usize, P)> {
        let mut idx = self.start_index;
        for (consumed, &b) in input.iter().enumerate() {
            let entry = self.bytes[idx + b as usize];
            if entry == NO_MATCH {
                return None;
            }
            if entry < 0 {
                let payload_idx = (-(entry + 1)) as usize;
                return Some((consumed + 1, self.payloads[payload_idx].clone()));
            }
            idx = entry as usize;
        }
        None
    }
}

/// Builds a [`ByteTrie`] from a list of patterns.
///
/// `depth` is the fixed byte width of the instruction word; every
/// pattern's masks must be exactly `depth` bytes long.
pub fn build<P: Clone>(patterns: &[Pattern<P>], depth: usize) -> Result<ByteTrie<P>, TrieError> {
    let mut bytes = Vec::new();
    let mut payloads = Vec::new();
    let mut memo: HashMap<(Vec<usize>, usize), usize> = HashMap::new();

    let mut payload_of_pattern: HashMap<usize, usize> = HashMap::new();
    let all_indices: Vec<usize> = (0..patterns.len()).collect();
    let start_index = build_block(
        patterns,
        &all_indices,
        0,
        depth,
        &mut bytes,
        &mut payloads,
        &mut payload_of_pattern,
        &mut memo,
    )?;

    Ok(ByteTrie {
        size: bytes.len(),
        bytes,
        payloads,
        start_index,
    })
}

fn build_block<P: Clone>(
    patterns: &[Pattern<P>],
    live: &[usize],
    depth: usize,
    total_depth: usize,
    bytes: &mut Vec<i32>,
    payloads: &mut Vec<P>,
    payload_of_pattern: &mut HashMap<usize, usize>,
    memo: &mut HashMap<(Vec<usize>, usize), usize>,
) -> Result<usize, TrieError> {
    let key = (live.to_vec(), depth);
    if let Some(&offset) = memo.get(&key) {
        debug!(depth, size = live.len(), "reusing memoized subtrie block");
        return Ok(offset);
    }

    let block_offset = bytes.len();
    bytes.resize(block_offset + BLOCK_SIZE, NO_MATCH);

    for b in 0u32..256 {
        let b = b as u8;
        let consistent: Vec<usize> = live
            .iter()
            .copied()
            .filter(|&i| patterns[i].consistent_with(depth, b))
            .collect();

        if consistent.is_empty() {
            continue; // already NO_MATCH
        }

        if depth + 1 == total_depth {
            if consistent.len() == 1 {
                let pattern_idx = consistent[0];
                let payload_idx = *payload_of_pattern.entry(pattern_idx).or_insert_with(|| {
                    payloads.push(patterns[pattern_idx].payload.clone());
                    payloads.len() - 1
                });
                bytes[block_offset + b as usize] = -(payload_idx as i32 + 1);
            } else {
                let mut tags: Vec<String> = consistent.iter().map(|&i| patterns[i].tag.clone()).collect();
                tags.dedup();
                return Err(TrieError { depth, tags });
            }
        } else {
            let child_offset = build_block(
                patterns,
                &consistent,
                depth + 1,
                total_depth,
                bytes,
                payloads,
                payload_of_pattern,
                memo,
            )?;
            bytes[block_offset + b as usize] = child_offset as i32;
        }
    }

    memo.insert(key, block_offset);
    Ok(block_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(tag: &str, required: u32, value: u32, payload: &'static str) -> Pattern<&'static str> {
        Pattern {
            tag: tag.to_string(),
            required_mask: required.to_be_bytes().to_vec(),
            value_mask: value.to_be_bytes().to_vec(),
            payload,
        }
    }

    #[test]
    fn no_operand_instruction_matches_exact_bytes_only() {
        let patterns = vec![pattern("ADD", 0xFF000000, 0x60000000, "ADD")];
        let trie = build(&patterns, 4).unwrap();

        assert_eq!(trie.decode(&[0x60, 0x00, 0x00, 0x00]), Some((4, "ADD")));
        assert_eq!(trie.decode(&[0x61, 0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn distinguishes_two_patterns_sharing_a_prefix() {
        let patterns = vec![
            pattern("MOV", 0xF0000000, 0x80000000, "MOV"),
            pattern("ADD", 0xFF000000, 0x60000000, "ADD"),
        ];
        let trie = build(&patterns, 4).unwrap();
        assert_eq!(trie.decode(&[0x82, 0x00, 0x12, 0x34]), Some((4, "MOV")));
        assert_eq!(trie.decode(&[0x60, 0x00, 0x00, 0x00]), Some((4, "ADD")));
    }

    fn pattern16(tag: &str, required: u16, value: u16, payload: &'static str) -> Pattern<&'static str> {
        Pattern {
            tag: tag.to_string(),
            required_mask: required.to_be_bytes().to_vec(),
            value_mask: value.to_be_bytes().to_vec(),
            payload,
        }
    }

    #[test]
    fn ambiguous_patterns_fail_to_build() {
        // `0xA000/0xF000` (any value in the low byte) and
        // `0xA000/0xFF00` (low byte fixed to zero) are ambiguous for any
        // input whose low byte is 0x00.
        let patterns = vec![
            pattern16("A", 0xF000, 0xA000, "A"),
            pattern16("B", 0xFF00, 0xA000, "B"),
        ];
        let err = build(&patterns, 2).unwrap_err();
        assert_eq!(err.depth, 1);
        assert!(err.tags.contains(&"A".to_string()));
        assert!(err.tags.contains(&"B".to_string()));
    }

    #[test]
    fn building_twice_yields_identical_tables() {
        let patterns = vec![
            pattern("MOV", 0xF0000000, 0x80000000, "MOV"),
            pattern("ADD", 0xFF000000, 0x60000000, "ADD"),
        ];
        let t1 = build(&patterns, 4).unwrap();
        let t2 = build(&patterns, 4).unwrap();
        assert_eq!(t1.bytes, t2.bytes);
        assert_eq!(t1.payloads, t2.payloads);
    }

    #[test]
    fn every_byte_sequence_yields_at_most_one_payload() {
        let patterns = vec![
            pattern("MOV", 0xF0000000, 0x80000000, "MOV"),
            pattern("ADD", 0xFF000000, 0x60000000, "ADD"),
        ];
        let trie = build(&patterns, 4).unwrap();
        for first in 0u8..=255 {
            let result = trie.decode(&[first, 0, 0, 0]);
            assert!(result.is_none() || result.unwrap().0 == 4);
        }
    }

    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn an_exact_pattern_matches_only_its_own_value(value: u32, probe: u32) -> bool {
        let patterns = vec![pattern("X", 0xFFFF_FFFF, value, "X")];
        let trie = build(&patterns, 4).unwrap();
        let got = trie.decode(&probe.to_be_bytes());
        got.is_some() == (probe == value)
    }

    #[quickcheck]
    fn decode_never_consumes_past_the_fixed_width(bytes: Vec<u8>) -> TestResult {
        if bytes.len() < 4 {
            return TestResult::discard();
        }
        let patterns = vec![
            pattern("MOV", 0xF0000000, 0x80000000, "MOV"),
            pattern("ADD", 0xFF000000, 0x60000000, "ADD"),
        ];
        let trie = build(&patterns, 4).unwrap();
        let result = trie.decode(&bytes);
        TestResult::from_bool(result.is_none() || result.unwrap().0 == 4)
    }

    #[quickcheck]
    fn building_is_deterministic_for_arbitrary_non_conflicting_patterns(value: u32) -> bool {
        let patterns = vec![pattern("X", 0xFFFF_FFFF, value, "X")];
        let t1 = build(&patterns, 4).unwrap();
        let t2 = build(&patterns, 4).unwrap();
        t1.bytes == t2.bytes && t1.payloads == t2.payloads
    }
}
