//! Wordlist loading and automatic shift detection.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::caesar::DecodedVariant;

/// Trim and lower-case a word; `None` for blank lines
pub fn normalize_word(line: &str) -> Option<String> {
    let word = line.trim();
    (!word.is_empty()).then(|| word.to_lowercase())
}

/// Set of known words, compared case-insensitively
#[derive(Debug, Default, Clone)]
pub struct Wordlist {
    words: HashSet<String>,
}

impl Wordlist {
    /// Load a wordlist, one word per line.
    ///
    /// A missing file yields an empty list, so detection never matches and
    /// the caller falls back to asking the user.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "wordlist not found, auto-detection disabled");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to open wordlist: {}", path.display()))
            }
        };

        let mut words = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line.context("Failed to read line from wordlist")?;
            if let Some(word) = normalize_word(&line) {
                words.insert(word);
            }
        }

        debug!(path = %path.display(), words = words.len(), "wordlist loaded");
        Ok(Self { words })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Exact, case-insensitive membership
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    /// Whether any whitespace-delimited token of `text` is a known word
    pub fn matches_any_token(&self, text: &str) -> bool {
        text.split_whitespace().any(|token| self.contains(token))
    }
}

impl<S: AsRef<str>> FromIterator<S> for Wordlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            words: iter
                .into_iter()
                .filter_map(|w| normalize_word(w.as_ref()))
                .collect(),
        }
    }
}

/// First variant (lowest shift) containing a known word, if any
pub fn detect<'a>(variants: &'a [DecodedVariant], wordlist: &Wordlist) -> Option<&'a DecodedVariant> {
    variants
        .iter()
        .find(|variant| wordlist.matches_any_token(&variant.text))
}

/// Counts reported by [`clean_wordlist`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanStats {
    pub total_lines: usize,
    pub empty_lines: usize,
    pub duplicates_removed: usize,
    pub unique_words: usize,
}

/// Normalize a wordlist file: trim, lower-case, drop blanks and duplicates
/// while keeping first-seen order.
pub fn clean_wordlist(input: &Path, output: &Path) -> Result<CleanStats> {
    if !input.exists() {
        bail!("Input wordlist not found: {}", input.display());
    }

    let file = File::open(input).context("Failed to open input wordlist")?;
    let reader = BufReader::new(file);

    let mut seen: HashSet<String> = HashSet::new();
    let mut unique_words: Vec<String> = Vec::new();
    let mut total_lines = 0usize;
    let mut empty_lines = 0usize;

    for line in reader.lines() {
        let line = line.context("Failed to read line from wordlist")?;
        total_lines += 1;

        let Some(word) = normalize_word(&line) else {
            empty_lines += 1;
            continue;
        };

        if seen.insert(word.clone()) {
            unique_words.push(word);
        }
    }

    let out_file = File::create(output).context("Failed to create output wordlist")?;
    let mut writer = BufWriter::new(out_file);

    for word in &unique_words {
        writeln!(writer, "{}", word).context("Failed to write to output wordlist")?;
    }

    writer.flush().context("Failed to flush output wordlist")?;

    Ok(CleanStats {
        total_lines,
        empty_lines,
        duplicates_removed: total_lines - empty_lines - unique_words.len(),
        unique_words: unique_words.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caesar::{decode_all, encode};
    use tempfile::TempDir;

    fn create_test_wordlist(dir: &TempDir, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("dictionary.txt");
        let mut file = File::create(&path).expect("Failed to create test wordlist");
        for line in lines {
            writeln!(file, "{}", line).expect("Failed to write word");
        }
        path
    }

    #[test]
    fn test_detects_robby_at_shift_four_only() {
        let wordlist: Wordlist = ["robby"].into_iter().collect();
        let variants = decode_all("vsffc");

        let detected = detect(&variants, &wordlist).expect("should detect");
        assert_eq!(detected.shift, 4);
        assert_eq!(detected.text, "robby");

        let matching: Vec<u8> = variants
            .iter()
            .filter(|v| wordlist.matches_any_token(&v.text))
            .map(|v| v.shift)
            .collect();
        assert_eq!(matching, vec![4]);
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        let wordlist: Wordlist = ["Mars", "DOOR"].into_iter().collect();
        let ciphertext = encode("Open the Door now", 11);
        let variants = decode_all(&ciphertext);

        let detected = detect(&variants, &wordlist).expect("should detect");
        assert_eq!(detected.shift, 11);
        assert_eq!(detected.text, "Open the Door now");
    }

    #[test]
    fn test_token_equality_not_substring() {
        let wordlist: Wordlist = ["cat"].into_iter().collect();
        assert!(!wordlist.matches_any_token("catering service"));
        assert!(wordlist.matches_any_token("the cat sat"));
        assert!(wordlist.matches_any_token("the\tCAT\nsat"));
    }

    #[test]
    fn test_lowest_shift_wins() {
        // Both "ab" (shift 0) and "za" (shift 1) are known words
        let wordlist: Wordlist = ["ab", "za"].into_iter().collect();
        let variants = decode_all("ab");
        assert_eq!(detect(&variants, &wordlist).unwrap().shift, 0);
    }

    #[test]
    fn test_undetected_without_match() {
        let wordlist: Wordlist = ["banana"].into_iter().collect();
        let variants = decode_all("vsffc");
        assert!(detect(&variants, &wordlist).is_none());
    }

    #[test]
    fn test_load_normalizes_words() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = create_test_wordlist(&temp_dir, &["  Robby ", "", "MARS", "mars"]);

        let wordlist = Wordlist::load(&path).expect("Failed to load wordlist");

        assert_eq!(wordlist.len(), 2);
        assert!(wordlist.contains("robby"));
        assert!(wordlist.contains("Mars"));
    }

    #[test]
    fn test_missing_wordlist_degrades_to_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let wordlist = Wordlist::load(&temp_dir.path().join("nope.txt")).expect("should not fail");

        assert!(wordlist.is_empty());
        assert!(detect(&decode_all("vsffc"), &wordlist).is_none());
    }

    #[test]
    fn test_clean_wordlist_normalizes_and_dedupes() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = create_test_wordlist(&temp_dir, &["Zebra", "apple", "", "APPLE ", "mango", "zebra"]);
        let output = temp_dir.path().join("clean.txt");

        let stats = clean_wordlist(&input, &output).expect("Failed to clean wordlist");

        assert_eq!(
            stats,
            CleanStats {
                total_lines: 6,
                empty_lines: 1,
                duplicates_removed: 2,
                unique_words: 3,
            }
        );
        let cleaned = std::fs::read_to_string(&output).unwrap();
        assert_eq!(cleaned, "zebra\napple\nmango\n");
    }

    #[test]
    fn test_clean_wordlist_missing_input() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = clean_wordlist(
            &temp_dir.path().join("nonexistent.txt"),
            &temp_dir.path().join("out.txt"),
        );
        assert!(result.is_err());
    }
}
