//! Parallel brute-force password recovery for encrypted ZIP archives, plus a
//! Caesar-cipher decoder with wordlist-based shift detection for the text
//! found inside.
//!
//! The cracking engine is split along the path a run takes:
//! [`search`] turns indices into candidates, [`partition`] hands each worker
//! a slice of the index range, [`worker`] tries its slice through the
//! [`unlock`] boundary, [`progress`] aggregates attempt counts, and
//! [`coordinator`] ties them together and decides the outcome.

pub mod caesar;
pub mod coordinator;
pub mod dictionary;
pub mod partition;
pub mod progress;
pub mod search;
pub mod unlock;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use caesar::{decode, decode_all, encode, DecodedVariant};
pub use coordinator::{CrackConfig, CrackError, CrackOutcome, CrackReport, Coordinator};
pub use dictionary::{clean_wordlist, detect, CleanStats, Wordlist};
pub use partition::{partition, partition_range, WorkRange};
pub use progress::progress_bar;
pub use search::{SearchSpace, DEFAULT_CHARSET, DEFAULT_LENGTH};
pub use unlock::{extract_dir, ArchiveError, UnlockOutcome, Unlocker, ZipUnlocker};
