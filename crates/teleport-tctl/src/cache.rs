//! On-disk cache for the node join token.
//!
//! The cache is a YAML document holding the last [`InviteResult`]. It is always read and
//! rewritten whole, under an exclusive `flock` on the file itself. [`TokenCache::lock`] hands out
//! a guard so a caller can read, decide and rewrite inside one critical section.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::models::InviteResult;
use crate::Result;
use teleport_core::Error;

/// Join-token cache file.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Creates a cache backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the cache file, creating it and its parent directories when missing, and waits for
    /// the exclusive lock without blocking the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheError`] if the file cannot be opened, or [`Error::LockError`] if
    /// the lock cannot be taken.
    pub async fn lock(&self) -> Result<CacheGuard> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| cache_error(&self.path, "create directory for", &err))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|err| cache_error(&self.path, "open", &err))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<CacheGuard> {
            let lock = FileLock::exclusive(file, &path)?;
            Ok(CacheGuard { path, lock })
        })
        .await
        .map_err(|err| Error::LockError(format!("lock task failed: {err}")))?
    }

    /// Reads the cached invite; `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheError`] if the file cannot be read or parsed, or
    /// [`Error::LockError`] if the lock cannot be taken.
    pub fn read(&self) -> Result<Option<InviteResult>> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(cache_error(&self.path, "open", &err)),
        };
        let mut guard = CacheGuard {
            path: self.path.clone(),
            lock: FileLock::exclusive(file, &self.path)?,
        };
        guard.read()
    }

    /// Replaces the cache contents with `invite`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheError`] if the file cannot be written, or [`Error::LockError`] if
    /// the lock cannot be taken.
    pub async fn write(&self, invite: &InviteResult) -> Result<()> {
        self.lock().await?.write(invite)
    }
}

/// Locked cache file; the lock is released when the guard is dropped.
#[derive(Debug)]
pub struct CacheGuard {
    path: PathBuf,
    lock: FileLock,
}

impl CacheGuard {
    /// Reads the cached invite; `Ok(None)` when the file is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheError`] if the file cannot be read or parsed.
    pub fn read(&mut self) -> Result<Option<InviteResult>> {
        let file = &mut self.lock.file;
        let mut contents = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut contents))
            .map_err(|err| cache_error(&self.path, "read", &err))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&contents)?))
    }

    /// Replaces the file contents with `invite`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheError`] if the file cannot be written.
    pub fn write(&mut self, invite: &InviteResult) -> Result<()> {
        let serialized = serde_yaml::to_string(invite)?;
        let file = &mut self.lock.file;
        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)))
            .map_err(|err| cache_error(&self.path, "truncate", &err))?;
        file.write_all(serialized.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|err| cache_error(&self.path, "write", &err))
    }
}

fn cache_error(path: &Path, action: &str, err: &std::io::Error) -> Error {
    Error::CacheError(format!("failed to {action} {}: {err}", path.display()))
}

/// Exclusive advisory lock released on drop.
#[derive(Debug)]
struct FileLock {
    file: File,
}

impl FileLock {
    fn exclusive(file: File, path: &Path) -> Result<Self> {
        loop {
            // SAFETY: the descriptor belongs to `file`, which outlives this call.
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if ret == 0 {
                return Ok(Self { file });
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != ErrorKind::Interrupted {
                return Err(Error::LockError(format!(
                    "cannot lock {}: {err}",
                    path.display()
                )));
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still open.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
