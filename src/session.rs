//! Build session: units that already own suite-entry injection, shared by
//! every toolchain invocation of one build.
//!
//! The record is a newline-separated text file in the temp area, one per
//! build id, guarded by an exclusive advisory lock on a sibling `.lock`
//! file. It is append-only and never pruned.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

pub const SESSION_FILE_PREFIX: &str = ".test_main_packages_";
const LOCK_EXTENSION: &str = "lock";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to lock build session {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read build session {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write build session {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Session record for one build id.
#[derive(Debug, Clone)]
pub struct BuildSession {
    path: PathBuf,
    lock_path: PathBuf,
}

impl BuildSession {
    pub fn new(dir: &Path, build_id: &str) -> Self {
        let name = format!("{}{}", SESSION_FILE_PREFIX, sanitize(build_id));
        let lock_path = dir.join(format!("{}.{}", name, LOCK_EXTENSION));
        let path = dir.join(name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock and load the recorded units.
    pub fn lock(&self) -> Result<SessionGuard<'_>, SessionError> {
        let lock_err = |source| SessionError::Lock {
            path: self.lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;

        let units = self.read_units()?;
        Ok(SessionGuard {
            session: self,
            lock: Some(file),
            units,
        })
    }

    /// Like [`lock`](Self::lock), but a lock or read failure degrades to an
    /// unguarded view instead of stalling the build.
    pub fn enter(&self) -> SessionGuard<'_> {
        match self.lock() {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!(error = %err, "proceeding without build session lock");
                let units = self.read_units().unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "treating build session as empty");
                    Vec::new()
                });
                SessionGuard {
                    session: self,
                    lock: None,
                    units,
                }
            }
        }
    }

    /// Units recorded so far. A missing file is an empty session.
    pub fn read_units(&self) -> Result<Vec<String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(SessionError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Read-decide-write section over the session. The lock, if any, is
/// released on drop.
#[derive(Debug)]
pub struct SessionGuard<'s> {
    session: &'s BuildSession,
    lock: Option<File>,
    units: Vec<String>,
}

impl SessionGuard<'_> {
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u == unit)
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    /// Record a unit and persist the session right away.
    pub fn record(&mut self, unit: &str) -> Result<(), SessionError> {
        if self.contains(unit) {
            return Ok(());
        }
        self.units.push(unit.to_string());

        let mut content = self.units.join("\n");
        content.push('\n');
        fs::write(&self.session.path, content).map_err(|source| SessionError::Write {
            path: self.session.path.clone(),
            source,
        })
    }
}

/// Build ids contain `/`; keep the session a single file name.
fn sanitize(build_id: &str) -> String {
    build_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
