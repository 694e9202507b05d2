//! `go build -work` with the work directory cached per argument list.
//!
//! The key file `<dir>/.<sha256 of args joined by "|">.build` holds the
//! work directory of a previous build. It is reused while that directory
//! still exists.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::SdkError;

const WORK_PREFIX: &str = "WORK=";

#[derive(Debug, Clone)]
pub struct BuildCache {
    dir: PathBuf,
    go: PathBuf,
}

impl BuildCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            go: PathBuf::from("go"),
        }
    }

    /// Use a specific `go` binary.
    pub fn with_go(mut self, go: impl Into<PathBuf>) -> Self {
        self.go = go.into();
        self
    }

    pub fn key_path(&self, args: &[String]) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(args.join("|").as_bytes());
        self.dir
            .join(format!(".{}.build", hex::encode(hasher.finalize())))
    }

    /// Build in the cache directory, always keeping the work dir (`-work`)
    /// and rebuilding every dependency (`-a`). Returns the work dir.
    pub fn go_build(&self, extra: &[&str]) -> Result<PathBuf, SdkError> {
        let args: Vec<String> = ["build", "-work", "-a"]
            .iter()
            .chain(extra)
            .map(|s| s.to_string())
            .collect();
        let key = self.key_path(&args);

        if let Some(work) = cached_work_dir(&key) {
            debug!(work = %work.display(), "reusing cached build");
            return Ok(work);
        }

        let output = Command::new(&self.go)
            .args(&args)
            .current_dir(&self.dir)
            .output()
            .map_err(|source| SdkError::Spawn {
                program: self.go.display().to_string(),
                source,
            })?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!(output = %combined, "go build finished");

        if !output.status.success() {
            return Err(SdkError::Failed {
                program: self.go.display().to_string(),
                code: output.status.code(),
                output: combined,
            });
        }

        let work = parse_work_dir(&combined).ok_or(SdkError::MissingWorkDir { output: combined })?;
        if let Err(err) = fs::write(&key, work.to_string_lossy().as_bytes()) {
            warn!(key = %key.display(), error = %err, "failed to write build cache key");
        }
        Ok(work)
    }
}

fn cached_work_dir(key: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(key).ok()?;
    let work = PathBuf::from(content.trim());
    work.is_dir().then_some(work)
}

/// The `WORK=<dir>` line `go build -work` prints.
pub fn parse_work_dir(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix(WORK_PREFIX))
        .map(|dir| PathBuf::from(dir.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_work_line() {
        let out = "go: downloading x\nWORK=/tmp/go-build123\n";
        assert_eq!(parse_work_dir(out), Some(PathBuf::from("/tmp/go-build123")));
        assert_eq!(parse_work_dir("nothing"), None);
    }

    #[test]
    fn key_depends_on_args() {
        let cache = BuildCache::new("/sdk");
        let a = cache.key_path(&["build".to_string(), "-a".to_string()]);
        let b = cache.key_path(&["build".to_string()]);
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with('.') && name.ends_with(".build"));
        assert_eq!(name.len(), 1 + 64 + ".build".len());
    }
}
