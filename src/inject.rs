//! Registering the SDK package with the compiler and linker.
//!
//! Both tools resolve imports through an importcfg file of
//! `packagefile <import path>=<archive>` lines. The injector copies the
//! command's importcfg, appends the SDK archives it lacks and points
//! `-importcfg` at the copy.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::command::{CommandLine, CompileCommand, LinkCommand};
use crate::rewrite::{parse_file, Instrumentation, TESTING_PACKAGE};
use crate::sdk::{BuildCache, SdkError, SdkLocator};

const PACKAGEFILE: &str = "packagefile";
const IMPORTCFG_FLAG: &str = "importcfg";
const ARCHIVE_NAME: &str = "_pkg_.a";

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("failed to read importcfg {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write importcfg copy: {0}")]
    Write(#[source] io::Error),

    #[error("command has no -importcfg flag")]
    MissingImportCfg,

    #[error("failed to build SDK archives: {0}")]
    Build(#[from] SdkError),
}

/// Ensures the SDK package is available to the compile and link steps.
pub trait PackageInjector {
    /// Returns whether the command was modified.
    fn process_compile(&self, cmd: &mut CompileCommand) -> Result<bool, InjectError>;

    /// Returns whether the command was modified.
    fn process_link(&self, cmd: &mut LinkCommand) -> Result<bool, InjectError>;
}

/// Archives of the SDK and its transitive dependencies, by import path.
pub trait ArtifactSource {
    fn archives(&self) -> Result<BTreeMap<String, PathBuf>, InjectError>;
}

/// Parsed importcfg. Unknown lines are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCfg {
    lines: Vec<String>,
    packages: BTreeMap<String, PathBuf>,
}

impl ImportCfg {
    pub fn parse(text: &str) -> Self {
        let mut cfg = ImportCfg::default();
        for line in text.lines() {
            if let Some((package, archive)) = parse_packagefile(line) {
                cfg.packages.insert(package.to_string(), PathBuf::from(archive));
            }
            cfg.lines.push(line.to_string());
        }
        cfg
    }

    pub fn read(path: &Path) -> Result<Self, InjectError> {
        let text = fs::read_to_string(path).map_err(|source| InjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    pub fn archive(&self, package: &str) -> Option<&Path> {
        self.packages.get(package).map(PathBuf::as_path)
    }

    pub fn packages(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.packages
            .iter()
            .map(|(package, archive)| (package.as_str(), archive.as_path()))
    }

    /// Add a package unless it is already listed. Returns whether it was
    /// added.
    pub fn add(&mut self, package: &str, archive: &Path) -> bool {
        if self.contains(package) {
            return false;
        }
        self.lines
            .push(format!("{} {}={}", PACKAGEFILE, package, archive.display()));
        self.packages
            .insert(package.to_string(), archive.to_path_buf());
        true
    }
}

impl fmt::Display for ImportCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

fn parse_packagefile(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim().strip_prefix(PACKAGEFILE)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (package, archive) = rest.trim_start().split_once('=')?;
    Some((package.trim(), archive.trim()))
}

/// [`PackageInjector`] that extends the command's importcfg.
pub struct ImportCfgInjector<S> {
    sdk: Instrumentation,
    source: S,
    temp_dir: PathBuf,
    /// Packages a link importcfg must list for the binary to be a test
    /// binary.
    required: Vec<String>,
}

impl<S: ArtifactSource> ImportCfgInjector<S> {
    pub fn new(sdk: Instrumentation, source: S, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            sdk,
            source,
            temp_dir: temp_dir.into(),
            required: vec![TESTING_PACKAGE.to_string()],
        }
    }

    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = required;
        self
    }

    /// Point `-importcfg` at a copy that lists every SDK archive.
    fn extend(&self, line: &mut CommandLine, cfg_path: &Path, mut cfg: ImportCfg) -> Result<bool, InjectError> {
        let archives = self.source.archives()?;
        let mut added = 0;
        for (package, archive) in &archives {
            if cfg.add(package, archive) {
                added += 1;
            }
        }
        if added == 0 {
            return Ok(false);
        }

        let mut copy = tempfile::Builder::new()
            .prefix("importcfg_")
            .tempfile_in(&self.temp_dir)
            .map_err(InjectError::Write)?;
        copy.write_all(cfg.to_string().as_bytes())
            .map_err(InjectError::Write)?;
        let (_, copy_path) = copy.keep().map_err(|err| InjectError::Write(err.error))?;

        info!(
            from = %cfg_path.display(),
            to = %copy_path.display(),
            added,
            "extended importcfg with SDK packages"
        );
        line.set_flag_value(IMPORTCFG_FLAG, &copy_path.to_string_lossy());
        Ok(true)
    }
}

impl<S: ArtifactSource> PackageInjector for ImportCfgInjector<S> {
    fn process_compile(&self, cmd: &mut CompileCommand) -> Result<bool, InjectError> {
        let uses_sdk = cmd.rewrite_candidates().iter().any(|file| {
            parse_file(Path::new(file.path))
                .map(|parsed| parsed.imports_path(&self.sdk.import_path))
                .unwrap_or(false)
        });
        if !uses_sdk {
            return Ok(false);
        }

        let cfg_path = PathBuf::from(cmd.importcfg().ok_or(InjectError::MissingImportCfg)?);
        let cfg = ImportCfg::read(&cfg_path)?;
        self.extend(cmd, &cfg_path, cfg)
    }

    fn process_link(&self, cmd: &mut LinkCommand) -> Result<bool, InjectError> {
        let Some(cfg_path) = cmd.importcfg().map(PathBuf::from) else {
            debug!("link without importcfg, nothing to inject");
            return Ok(false);
        };
        let cfg = ImportCfg::read(&cfg_path)?;
        if !self.required.iter().all(|package| cfg.contains(package)) {
            return Ok(false);
        }
        self.extend(cmd, &cfg_path, cfg)
    }
}

/// Locates the SDK, builds it once and reads the archives from the
/// build's work dir. Nothing happens until archives are requested.
#[derive(Debug, Clone)]
pub struct SdkBuild {
    locator: SdkLocator,
    import_path: String,
}

impl SdkBuild {
    pub fn new(locator: SdkLocator, import_path: impl Into<String>) -> Self {
        Self {
            locator,
            import_path: import_path.into(),
        }
    }
}

impl ArtifactSource for SdkBuild {
    fn archives(&self) -> Result<BTreeMap<String, PathBuf>, InjectError> {
        let location = self.locator.locate()?;
        let work = BuildCache::new(location.path()).go_build(&[])?;
        collect_work_archives(&work, &self.import_path)
    }
}

/// The root package archive (`b001`) plus every archive reachable through
/// the importcfg files of the work dir.
pub fn collect_work_archives(work: &Path, import_path: &str) -> Result<BTreeMap<String, PathBuf>, InjectError> {
    let root = work.join("b001");
    let mut archives = BTreeMap::new();
    archives.insert(import_path.to_string(), root.join(ARCHIVE_NAME));

    let mut visited = BTreeSet::new();
    let mut pending = vec![root];
    while let Some(dir) = pending.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let cfg_path = dir.join("importcfg");
        if !cfg_path.is_file() {
            continue;
        }
        let cfg = ImportCfg::read(&cfg_path)?;
        for (package, archive) in cfg.packages() {
            archives
                .entry(package.to_string())
                .or_insert_with(|| archive.to_path_buf());
            if let Some(parent) = archive.parent().filter(|p| p.starts_with(work)) {
                pending.push(parent.to_path_buf());
            }
        }
    }
    Ok(archives)
}
