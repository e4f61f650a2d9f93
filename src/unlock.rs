//! The "try this password" boundary to the archive reader.
//!
//! Workers never see the archive format. They hold an [`UnlockHandle`]
//! opened from an [`Unlocker`] and get back a tagged [`UnlockOutcome`]; only
//! structural problems with the archive come back as [`ArchiveError`].

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Result of one password attempt that did not hit a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The password decrypts the archive
    Unlocked,
    /// Decryption failed cleanly; try the next candidate
    WrongPassword,
}

/// Errors that make further attempts on this archive pointless
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read archive {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("archive {} uses an unsupported feature: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    #[error("archive {} contains no encrypted entries", .0.display())]
    NotEncrypted(PathBuf),
}

impl ArchiveError {
    fn from_zip(err: ZipError, path: &Path) -> Self {
        let path = path.to_path_buf();
        match err {
            ZipError::Io(source) => ArchiveError::Io { path, source },
            ZipError::UnsupportedArchive(reason) => ArchiveError::Unsupported {
                path,
                reason: reason.to_string(),
            },
            other => ArchiveError::Corrupt {
                path,
                reason: other.to_string(),
            },
        }
    }
}

/// Source of independent password-checking handles, one per worker
pub trait Unlocker: Send + Sync + 'static {
    type Handle: UnlockHandle;

    /// Open a fresh handle. Each worker owns its own; nothing is shared.
    fn open(&self) -> Result<Self::Handle, ArchiveError>;
}

pub trait UnlockHandle {
    fn try_password(&mut self, password: &str) -> Result<UnlockOutcome, ArchiveError>;
}

// ============================================================================
// ZIP implementation
// ============================================================================

/// ZIP archives (ZipCrypto or AES) read through the `zip` crate
#[derive(Debug, Clone)]
pub struct ZipUnlocker {
    path: PathBuf,
}

impl ZipUnlocker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_archive(&self) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
        let file = File::open(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ArchiveError::NotFound(self.path.clone())
            } else {
                ArchiveError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::from_zip(e, &self.path))
    }

    /// Extract every entry with `password` into `output_dir`
    pub fn extract(&self, password: &str, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)
            .context(format!("Failed to create output directory: {}", output_dir.display()))?;

        let mut archive = self.open_archive()?;

        for i in 0..archive.len() {
            let mut file = archive
                .by_index_decrypt(i, password.as_bytes())
                .context("Failed to read ZIP entry")?;

            let outpath = match file.enclosed_name() {
                Some(path) => output_dir.join(path),
                None => continue,
            };

            if file.is_dir() {
                std::fs::create_dir_all(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&outpath)
                    .context(format!("Failed to create {}", outpath.display()))?;
                io::copy(&mut file, &mut outfile)
                    .context(format!("Failed to extract {}", outpath.display()))?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }

        Ok(())
    }
}

impl Unlocker for ZipUnlocker {
    type Handle = ZipHandle;

    fn open(&self) -> Result<ZipHandle, ArchiveError> {
        let mut archive = self.open_archive()?;

        // Verify against the smallest encrypted entry; a full read of it
        // (CRC or HMAC check) weeds out header-check collisions.
        let mut target: Option<(usize, u64)> = None;
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| ArchiveError::from_zip(e, &self.path))?;
            if file.encrypted() && target.map_or(true, |(_, size)| file.size() < size) {
                target = Some((i, file.size()));
            }
        }

        let (entry, size) = target.ok_or_else(|| ArchiveError::NotEncrypted(self.path.clone()))?;

        Ok(ZipHandle {
            archive,
            path: self.path.clone(),
            entry,
            buf: Vec::with_capacity(usize::try_from(size).unwrap_or(0)),
        })
    }
}

/// One worker's private view of a ZIP archive
pub struct ZipHandle {
    archive: ZipArchive<BufReader<File>>,
    path: PathBuf,
    entry: usize,
    buf: Vec<u8>,
}

impl UnlockHandle for ZipHandle {
    fn try_password(&mut self, password: &str) -> Result<UnlockOutcome, ArchiveError> {
        let mut file = match self.archive.by_index_decrypt(self.entry, password.as_bytes()) {
            Ok(file) => file,
            Err(ZipError::InvalidPassword) => return Ok(UnlockOutcome::WrongPassword),
            Err(e) => return Err(ArchiveError::from_zip(e, &self.path)),
        };

        // The header check passes for roughly 1 in 256 wrong ZipCrypto keys;
        // those fail here with a checksum or inflate error.
        self.buf.clear();
        match file.read_to_end(&mut self.buf) {
            Ok(_) => Ok(UnlockOutcome::Unlocked),
            Err(_) => Ok(UnlockOutcome::WrongPassword),
        }
    }
}

/// Directory to unpack into: the archive path without its extension
pub fn extract_dir(archive_path: &Path) -> PathBuf {
    let parent = archive_path.parent().unwrap_or(Path::new("."));
    let stem = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("extracted");
    parent.join(stem)
}
