//! Locating (or fetching) the instrumentation SDK sources.

pub mod cache;

pub use cache::{parse_work_dir, BuildCache};

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SdkConfig;

/// Package folder inside an SDK checkout.
pub const SDK_PACKAGE_DIR: &str = "autoinstrument";
/// Checkout directory name inside the temp area.
pub const SDK_CHECKOUT_DIR: &str = "dd-sdk-go-testing";
const LOCK_FILE: &str = "testinject-sdk.lock";

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed with exit code {code:?}:\n{output}")]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("go build did not report a WORK directory:\n{output}")]
    MissingWorkDir { output: String },

    #[error("SDK package folder {} is missing after checkout", .path.display())]
    Missing { path: PathBuf },
}

/// Where the SDK came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkLocation {
    Found(PathBuf),
    Fetched(PathBuf),
}

impl SdkLocation {
    /// The SDK package folder.
    pub fn path(&self) -> &Path {
        match self {
            SdkLocation::Found(path) | SdkLocation::Fetched(path) => path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SdkLocator {
    /// Checkout roots searched in order.
    candidates: Vec<PathBuf>,
    temp_dir: PathBuf,
    repository: String,
    revision: String,
}

impl SdkLocator {
    pub fn new(config: &SdkConfig, temp_dir: impl Into<PathBuf>) -> Self {
        let temp_dir = temp_dir.into();
        let mut candidates: Vec<PathBuf> = config.path.iter().cloned().collect();
        candidates.push(temp_dir.join(SDK_CHECKOUT_DIR));
        Self {
            candidates,
            temp_dir,
            repository: config.repository.clone(),
            revision: config.revision.clone(),
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Find the SDK package folder, cloning the repository when no
    /// candidate has one. Serialized across processes by a lock file.
    pub fn locate(&self) -> Result<SdkLocation, SdkError> {
        let lock_path = self.temp_dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .and_then(|file| file.lock_exclusive().map(|_| file));
        if let Err(err) = &lock {
            warn!(path = %lock_path.display(), error = %err, "locating SDK without lock");
        }

        if let Some(found) = self
            .candidates
            .iter()
            .map(|root| root.join(SDK_PACKAGE_DIR))
            .find(|dir| dir.is_dir())
        {
            return Ok(SdkLocation::Found(found));
        }

        let checkout = self.temp_dir.join(SDK_CHECKOUT_DIR);
        info!(repository = %self.repository, to = %checkout.display(), "cloning SDK");
        let checkout_arg = checkout.to_string_lossy().into_owned();
        git(&self.temp_dir, &["clone", &self.repository, &checkout_arg])?;
        git(&checkout, &["checkout", &self.revision])?;

        let package = checkout.join(SDK_PACKAGE_DIR);
        if !package.is_dir() {
            return Err(SdkError::Missing { path: package });
        }
        Ok(SdkLocation::Fetched(package))
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<(), SdkError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|source| SdkError::Spawn {
            program: "git".to_string(),
            source,
        })?;
    if output.status.success() {
        return Ok(());
    }
    Err(SdkError::Failed {
        program: format!("git {}", args.join(" ")),
        code: output.status.code(),
        output: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
