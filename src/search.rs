//! Candidate generation over a fixed alphabet and length.
//!
//! Candidates are addressed by index in radix order: index `i` is written in
//! base `k = |alphabet|` with `length` digits (most significant first) and
//! each digit is mapped through the alphabet. Generation is a pure function of
//! the index, so any worker can produce any slice of the space on its own.

use std::collections::HashSet;
use std::ops::Range;

use thiserror::Error;

/// Default alphabet: lowercase ASCII letters followed by digits
pub const DEFAULT_CHARSET: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// Default fixed password length
pub const DEFAULT_LENGTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchSpaceError {
    #[error("alphabet must not be empty")]
    EmptyAlphabet,

    #[error("alphabet contains duplicate character {0:?}")]
    DuplicateChar(char),

    #[error("password length must be at least 1")]
    ZeroLength,

    #[error("search space {size}^{length} does not fit in 64 bits")]
    TooLarge { size: usize, length: usize },

    #[error("window start {offset} is beyond search space size {total}")]
    OffsetOutOfRange { offset: u64, total: u64 },
}

/// The full ordered set of fixed-length candidates over an alphabet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpace {
    alphabet: Vec<char>,
    length: usize,
    total: u64,
}

impl SearchSpace {
    /// Build a search space, rejecting empty/duplicate alphabets, zero length
    /// and spaces whose size overflows `u64`.
    pub fn new(alphabet: &str, length: usize) -> Result<Self, SearchSpaceError> {
        let chars: Vec<char> = alphabet.chars().collect();
        if chars.is_empty() {
            return Err(SearchSpaceError::EmptyAlphabet);
        }
        if length == 0 {
            return Err(SearchSpaceError::ZeroLength);
        }

        let mut seen = HashSet::with_capacity(chars.len());
        for &ch in &chars {
            if !seen.insert(ch) {
                return Err(SearchSpaceError::DuplicateChar(ch));
            }
        }

        let too_large = || SearchSpaceError::TooLarge {
            size: chars.len(),
            length,
        };
        let exponent = u32::try_from(length).map_err(|_| too_large())?;
        let total = (chars.len() as u64)
            .checked_pow(exponent)
            .ok_or_else(too_large)?;

        Ok(Self {
            alphabet: chars,
            length,
            total,
        })
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of candidates, `|alphabet|^length`
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Candidate at `index`, or `None` when the index is outside the space
    pub fn candidate(&self, index: u64) -> Option<String> {
        if index >= self.total {
            return None;
        }
        let digits = self.digits(index);
        Some(digits.iter().map(|&d| self.alphabet[d]).collect())
    }

    /// Inverse of [`SearchSpace::candidate`]
    pub fn index_of(&self, candidate: &str) -> Option<u64> {
        if candidate.chars().count() != self.length {
            return None;
        }
        let base = self.alphabet.len() as u64;
        candidate.chars().try_fold(0u64, |index, ch| {
            let digit = self.alphabet.iter().position(|&a| a == ch)? as u64;
            Some(index * base + digit)
        })
    }

    /// Lazily enumerate the candidates of `range` in ascending order.
    ///
    /// The range is clamped to the space, so an out-of-range end simply
    /// stops the iterator early.
    pub fn candidates(&self, range: Range<u64>) -> Candidates<'_> {
        let end = range.end.min(self.total);
        let next = range.start.min(end);
        Candidates {
            space: self,
            digits: self.digits(next.min(self.total.saturating_sub(1))),
            next,
            end,
        }
    }

    /// Restrict the space to `[offset, offset + limit)`, clamped to the total
    pub fn window(&self, offset: u64, limit: Option<u64>) -> Result<Range<u64>, SearchSpaceError> {
        if offset >= self.total {
            return Err(SearchSpaceError::OffsetOutOfRange {
                offset,
                total: self.total,
            });
        }
        let end = match limit {
            Some(limit) => offset.saturating_add(limit).min(self.total),
            None => self.total,
        };
        Ok(offset..end)
    }

    /// Base-k digits of `index`, most significant first
    fn digits(&self, mut index: u64) -> Vec<usize> {
        let base = self.alphabet.len() as u64;
        let mut digits = vec![0usize; self.length];
        for slot in digits.iter_mut().rev() {
            *slot = (index % base) as usize;
            index /= base;
        }
        digits
    }
}

/// Odometer-style iterator over a contiguous slice of a [`SearchSpace`]
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    space: &'a SearchSpace,
    digits: Vec<usize>,
    next: u64,
    end: u64,
}

impl Candidates<'_> {
    /// Index of the candidate the next call to `next()` will yield
    pub fn position(&self) -> u64 {
        self.next
    }

    fn advance(&mut self) {
        let base = self.space.alphabet.len();
        for digit in self.digits.iter_mut().rev() {
            *digit += 1;
            if *digit < base {
                return;
            }
            *digit = 0;
        }
    }
}

impl Iterator for Candidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.end {
            return None;
        }
        let candidate = self
            .digits
            .iter()
            .map(|&d| self.space.alphabet[d])
            .collect();
        self.next += 1;
        if self.next < self.end {
            self.advance();
        }
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_alphabet_size_to_the_length() {
        let space = SearchSpace::new(DEFAULT_CHARSET, DEFAULT_LENGTH).unwrap();
        assert_eq!(space.total(), 36u64.pow(6));
        assert_eq!(space.total(), 2_176_782_336);
    }

    #[test]
    fn test_rejects_invalid_spaces() {
        assert_eq!(SearchSpace::new("", 3), Err(SearchSpaceError::EmptyAlphabet));
        assert_eq!(SearchSpace::new("abc", 0), Err(SearchSpaceError::ZeroLength));
        assert_eq!(
            SearchSpace::new("abca", 2),
            Err(SearchSpaceError::DuplicateChar('a'))
        );
        assert!(matches!(
            SearchSpace::new(DEFAULT_CHARSET, 20),
            Err(SearchSpaceError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_candidate_follows_alphabet_radix_order() {
        let space = SearchSpace::new("abc", 2).unwrap();
        let all: Vec<String> = (0..space.total())
            .map(|i| space.candidate(i).unwrap())
            .collect();
        assert_eq!(
            all,
            vec!["aa", "ab", "ac", "ba", "bb", "bc", "ca", "cb", "cc"]
        );
        assert_eq!(space.candidate(9), None);
    }

    #[test]
    fn test_alphabet_order_not_char_order() {
        // Ordering follows the alphabet as given, not code points
        let space = SearchSpace::new("zyx", 1).unwrap();
        let all: Vec<String> = space.candidates(0..3).collect();
        assert_eq!(all, vec!["z", "y", "x"]);
    }

    #[test]
    fn test_known_index_in_default_space() {
        let space = SearchSpace::new(DEFAULT_CHARSET, DEFAULT_LENGTH).unwrap();
        // a=0 b=1 c=2 '1'=27 '2'=28 '3'=29
        let expected = 36u64.pow(4) + 2 * 36u64.pow(3) + 27 * 36u64.pow(2) + 28 * 36 + 29;
        assert_eq!(space.index_of("abc123"), Some(expected));
        assert_eq!(space.candidate(expected).as_deref(), Some("abc123"));
        assert_eq!(space.candidate(0).as_deref(), Some("aaaaaa"));
        assert_eq!(space.candidate(space.total() - 1).as_deref(), Some("999999"));
    }

    #[test]
    fn test_index_round_trip() {
        let space = SearchSpace::new("a1B_", 5).unwrap();
        for index in 0..space.total() {
            let candidate = space.candidate(index).unwrap();
            assert_eq!(space.index_of(&candidate), Some(index));
        }
    }

    #[test]
    fn test_index_of_rejects_foreign_candidates() {
        let space = SearchSpace::new("abc", 3).unwrap();
        assert_eq!(space.index_of("ab"), None);
        assert_eq!(space.index_of("abcd"), None);
        assert_eq!(space.index_of("abz"), None);
    }

    #[test]
    fn test_iterator_matches_pointwise_generation() {
        let space = SearchSpace::new("xyz0", 4).unwrap();
        let from_iter: Vec<String> = space.candidates(37..201).collect();
        let pointwise: Vec<String> = (37..201).map(|i| space.candidate(i).unwrap()).collect();
        assert_eq!(from_iter, pointwise);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let space = SearchSpace::new("ab", 3).unwrap();
        let first: Vec<String> = space.candidates(2..6).collect();
        let again: Vec<String> = space.candidates(2..6).collect();
        assert_eq!(first, again);
        assert_eq!(first, vec!["aba", "abb", "baa", "bab"]);
    }

    #[test]
    fn test_iterator_clamps_to_space() {
        let space = SearchSpace::new("ab", 2).unwrap();
        assert_eq!(space.candidates(2..100).count(), 2);
        assert_eq!(space.candidates(4..10).count(), 0);
        assert_eq!(space.candidates(3..3).count(), 0);
    }

    #[test]
    fn test_full_enumeration_is_sorted_and_unique() {
        let space = SearchSpace::new("abc", 4).unwrap();
        let all: Vec<String> = space.candidates(0..space.total()).collect();
        assert_eq!(all.len() as u64, space.total());
        let mut sorted = all.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, all);
    }

    #[test]
    fn test_window() {
        let space = SearchSpace::new("abc", 3).unwrap();
        assert_eq!(space.window(0, None).unwrap(), 0..27);
        assert_eq!(space.window(5, Some(10)).unwrap(), 5..15);
        assert_eq!(space.window(20, Some(100)).unwrap(), 20..27);
        assert_eq!(
            space.window(27, None),
            Err(SearchSpaceError::OffsetOutOfRange { offset: 27, total: 27 })
        );
    }
}
