//! In-memory archive doubles for engine tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::unlock::{ArchiveError, UnlockHandle, UnlockOutcome, Unlocker};

#[derive(Debug, Clone, Default)]
struct Behaviour {
    password: Option<String>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    stall_on: Option<(String, Duration)>,
    delay: Duration,
    fail_open: bool,
}

/// Fake archive that unlocks for exactly one password
#[derive(Debug, Clone)]
pub struct MockArchive {
    behaviour: Arc<Behaviour>,
    attempts: Arc<AtomicU64>,
}

impl MockArchive {
    pub fn with_password(password: &str) -> Self {
        Self::from_behaviour(Behaviour {
            password: Some(password.to_string()),
            ..Behaviour::default()
        })
    }

    /// An archive no candidate can open
    pub fn never() -> Self {
        Self::from_behaviour(Behaviour::default())
    }

    /// Report a corrupt archive when `candidate` is tried
    pub fn fail_on(self, candidate: &str) -> Self {
        self.modify(|b| b.fail_on = Some(candidate.to_string()))
    }

    /// Panic when `candidate` is tried
    pub fn panic_on(self, candidate: &str) -> Self {
        self.modify(|b| b.panic_on = Some(candidate.to_string()))
    }

    /// Block for `duration` when `candidate` is tried
    pub fn stall_on(self, candidate: &str, duration: Duration) -> Self {
        self.modify(|b| b.stall_on = Some((candidate.to_string(), duration)))
    }

    /// Sleep this long on every attempt
    pub fn delay(self, delay: Duration) -> Self {
        self.modify(|b| b.delay = delay)
    }

    pub fn failing_open(self) -> Self {
        self.modify(|b| b.fail_open = true)
    }

    /// Total attempts made through every handle
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn from_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour: Arc::new(behaviour),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    fn modify(self, f: impl FnOnce(&mut Behaviour)) -> Self {
        let mut behaviour = (*self.behaviour).clone();
        f(&mut behaviour);
        Self {
            behaviour: Arc::new(behaviour),
            attempts: self.attempts,
        }
    }
}

fn corrupt(reason: &str) -> ArchiveError {
    ArchiveError::Corrupt {
        path: PathBuf::from("mock.zip"),
        reason: reason.to_string(),
    }
}

impl Unlocker for MockArchive {
    type Handle = MockHandle;

    fn open(&self) -> Result<MockHandle, ArchiveError> {
        if self.behaviour.fail_open {
            return Err(corrupt("bad central directory"));
        }
        Ok(MockHandle {
            archive: self.clone(),
        })
    }
}

pub struct MockHandle {
    archive: MockArchive,
}

impl UnlockHandle for MockHandle {
    fn try_password(&mut self, password: &str) -> Result<UnlockOutcome, ArchiveError> {
        let behaviour = &self.archive.behaviour;
        if behaviour.fail_on.as_deref() == Some(password) {
            return Err(corrupt("invalid local file header"));
        }
        if behaviour.panic_on.as_deref() == Some(password) {
            panic!("reader blew up on {}", password);
        }

        self.archive.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some((candidate, duration)) = &behaviour.stall_on {
            if candidate == password {
                std::thread::sleep(*duration);
            }
        }
        if !behaviour.delay.is_zero() {
            std::thread::sleep(behaviour.delay);
        }

        if behaviour.password.as_deref() == Some(password) {
            Ok(UnlockOutcome::Unlocked)
        } else {
            Ok(UnlockOutcome::WrongPassword)
        }
    }
}
