//! Shared test utilities: Go sources on disk and fake toolchain binaries.

#![allow(dead_code, unused_imports)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use testinject::inject::{ArtifactSource, InjectError, PackageInjector};
use testinject::command::{CompileCommand, LinkCommand};

pub const SDK_PATH: &str = "github.com/DataDog/dd-sdk-go-testing/autoinstrument";

/// A scratch directory holding Go files, a temp output dir and a session
/// dir, so parallel tests never share state.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::create_dir_all(dir.path().join("session")).unwrap();
        Self { dir }
    }

    /// Write a source file and return its path as a string.
    pub fn go_file(&self, name: &str, content: &str) -> String {
        let path = self.dir.path().join("src").join(name);
        fs::write(&path, content).expect("Failed to write go file");
        path.to_string_lossy().into_owned()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.dir.path().join("session")
    }

    /// An importcfg listing `testing` and `os`.
    pub fn importcfg(&self, name: &str, packages: &[&str]) -> String {
        let path = self.dir.path().join(name);
        let content: String = packages
            .iter()
            .map(|p| format!("packagefile {}=/goroot/pkg/{}.a\n", p, p))
            .collect();
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }
}

/// A compile command line the way the go command builds it.
pub fn compile(package: &str, build_id: &str, importcfg: &str, files: &[&str]) -> CompileCommand {
    let mut args: Vec<String> = [
        "-o", "/work/b001/_pkg_.a", "-trimpath", "/work/b001=>", "-p", package,
        "-lang=go1.21", "-complete", "-buildid", build_id, "-goversion", "go1.21.0",
        "-c=4", "-nolocalimports", "-importcfg", importcfg, "-pack",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend(files.iter().map(|s| s.to_string()));
    CompileCommand::new(PathBuf::from("/goroot/pkg/tool/linux_amd64/compile"), args)
}

/// Artifact source with fixed archives.
pub struct FakeArtifacts(pub BTreeMap<String, PathBuf>);

impl FakeArtifacts {
    pub fn sdk() -> Self {
        let mut archives = BTreeMap::new();
        archives.insert(SDK_PATH.to_string(), PathBuf::from("/work/b001/_pkg_.a"));
        archives.insert("os".to_string(), PathBuf::from("/goroot/pkg/os.a"));
        archives.insert(
            "github.com/DataDog/dd-trace-go/ddtrace".to_string(),
            PathBuf::from("/work/b002/_pkg_.a"),
        );
        Self(archives)
    }
}

impl ArtifactSource for FakeArtifacts {
    fn archives(&self) -> Result<BTreeMap<String, PathBuf>, InjectError> {
        Ok(self.0.clone())
    }
}

/// Injector that never touches the command.
pub struct NoopInjector;

impl PackageInjector for NoopInjector {
    fn process_compile(&self, _cmd: &mut CompileCommand) -> Result<bool, InjectError> {
        Ok(false)
    }

    fn process_link(&self, _cmd: &mut LinkCommand) -> Result<bool, InjectError> {
        Ok(false)
    }
}

/// Executable shell script standing in for a toolchain binary.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Read a rewritten file, dropping the leading `//line` directive.
pub fn read_rewritten(path: &Path) -> String {
    let text = fs::read_to_string(path).unwrap();
    match text.split_once('\n') {
        Some((first, rest)) if first.starts_with("//line ") => rest.to_string(),
        _ => text,
    }
}
