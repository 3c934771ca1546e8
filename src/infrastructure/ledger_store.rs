//! Ledger store adapters.
//!
//! [`FileLedgerStore`] keeps the ledger in a file shared by every process
//! logging to the same directory and serializes access with an exclusive
//! advisory lock. [`InMemoryLedgerStore`] is for a single long-running
//! process that has no need to share state.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::application::ports::LedgerStore;
use crate::domain::ledger::{LedgerFormat, LedgerState};
use crate::error::LedgerError;

const BACKOFF_START: Duration = Duration::from_millis(5);
const BACKOFF_MAX: Duration = Duration::from_millis(100);

/// Ledger persisted in a single file under an exclusive lock.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
    lock_timeout: Option<Duration>,
}

/// Holds the lock on an open ledger file until dropped.
struct LockGuard<'a> {
    file: &'a File,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.file);
    }
}

impl FileLedgerStore {
    /// Store backed by `path`. Lock acquisition blocks indefinitely.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: None,
        }
    }

    /// Give up acquiring the lock after `timeout`, retrying with backoff.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn lock<'a>(&self, file: &'a File) -> Result<LockGuard<'a>, LedgerError> {
        let Some(timeout) = self.lock_timeout else {
            file.lock_exclusive().map_err(|source| LedgerError::Lock {
                path: self.path.clone(),
                source,
            })?;
            return Ok(LockGuard { file });
        };

        let start = Instant::now();
        let mut backoff = BACKOFF_START;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard { file }),
                Err(e) if is_contended(&e) => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(LedgerError::LockTimeout {
                            path: self.path.clone(),
                            waited,
                        });
                    }
                    std::thread::sleep(backoff.min(timeout - waited));
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
                Err(source) => {
                    return Err(LedgerError::Lock {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
    }

    fn read(&self, mut file: &File) -> Result<(LedgerState, LedgerFormat), LedgerError> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| self.io_error(e))?;

        let (state, format) = LedgerState::decode(&content);
        if format.needs_migration() {
            tracing::warn!(
                target: "alert_throttle",
                path = %self.path.display(),
                format = ?format,
                recovered_hashes = state.sent_hashes.len(),
                "ledger not in current format, migrating"
            );
        }
        Ok((state, format))
    }

    fn write(&self, mut file: &File, state: &LedgerState) -> Result<(), LedgerError> {
        let encoded = state.encode()?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.set_len(0))
            .and_then(|_| file.write_all(encoded.as_bytes()))
            .and_then(|_| file.flush())
            .map_err(|e| self.io_error(e))
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl LedgerStore for FileLedgerStore {
    fn transact(
        &self,
        update: &mut dyn FnMut(&mut LedgerState) -> bool,
    ) -> Result<(), LedgerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let _guard = self.lock(&file)?;

        let (mut state, format) = self.read(&file)?;
        let changed = update(&mut state);
        if changed || format.needs_migration() {
            self.write(&file, &state)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<LedgerState, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LedgerState::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        let _guard = self.lock(&file)?;
        let (state, _) = self.read(&file)?;
        Ok(state)
    }
}

/// Ledger kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored ledger.
    pub fn replace(&self, state: LedgerState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transact(
        &self,
        update: &mut dyn FnMut(&mut LedgerState) -> bool,
    ) -> Result<(), LedgerError> {
        let mut guard = self.state.lock().map_err(|_| LedgerError::Poisoned)?;
        let mut working = guard.clone();
        if update(&mut working) {
            *guard = working;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<LedgerState, LedgerError> {
        self.state
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| LedgerError::Poisoned)
    }
}
