//! Toolchain command model.
//!
//! `go build -toolexec` runs this binary as `testinject <tool> <args...>` for
//! every compile and link step of the build graph. This module turns that
//! argument vector into a typed command:
//!
//! ```text
//! argv → classify → Compile | Link | Other → mutate → run
//! ```
//!
//! Arguments are classified once; every mutation keeps the per-argument
//! roles in sync, so accessors never re-parse the command line.

mod classifier;
mod registry;

pub use classifier::{
    classify, split_flag, ArgRole, ClassifyResult, SourceKind, DRIVER_FILE_FRAGMENT,
    GO_FILE_SUFFIX, TEST_FILE_SUFFIX,
};
pub use registry::{compile_flags, link_flags, lookup, FlagArity, FlagDef};

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::process;

use thiserror::Error;

/// Errors produced while classifying or running a toolchain command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty toolchain command line")]
    Empty,

    #[error("failed to launch '{}': {source}", .tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' failed with {}", .tool.display(), describe_code(.code))]
    ExecutionFailed { tool: PathBuf, code: Option<i32> },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl CommandError {
    /// Exit code the host process should report for this error.
    ///
    /// The wrapped tool's code is forwarded verbatim; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::ExecutionFailed {
                code: Some(code), ..
            } => *code,
            _ => 1,
        }
    }
}

/// Which toolchain step a command line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Compile,
    Link,
    Other,
}

impl CommandKind {
    /// Decide the kind from the tool path and its arguments.
    ///
    /// `-V` / `-V=full` is the go command probing the tool version; it
    /// must reach the tool untouched, so it is always `Other`.
    pub fn detect(tool: &Path, args: &[String]) -> Self {
        let is_version_probe = args.iter().any(|a| a == "-V" || a.starts_with("-V="));
        if is_version_probe {
            return CommandKind::Other;
        }

        let stem = tool
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.strip_suffix(".exe").unwrap_or(n))
            .unwrap_or_default();

        match stem {
            "compile" => CommandKind::Compile,
            "link" => CommandKind::Link,
            _ => CommandKind::Other,
        }
    }
}

/// A source file argument of a compile command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceArg<'a> {
    pub path: &'a str,
    pub kind: SourceKind,
}

/// Tool path plus classified argument vector.
#[derive(Debug, Clone)]
pub struct CommandLine {
    tool: PathBuf,
    args: Vec<String>,
    roles: Vec<ArgRole>,
}

impl CommandLine {
    /// Classify `args` for `tool` against a flag registry.
    pub fn new(tool: PathBuf, args: Vec<String>, registry: &[FlagDef]) -> Self {
        let classified = classify(&args, registry);
        for warning in &classified.warnings {
            tracing::warn!("{}: {}", tool.display(), warning);
        }
        Self {
            tool,
            args,
            roles: classified.roles,
        }
    }

    /// Path of the real tool binary.
    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// The live argument vector (tool path excluded).
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Mutable view of the live argument vector.
    ///
    /// Values may be edited in place; adding or removing arguments goes
    /// through [`CommandLine::append_arg`] / [`CommandLine::set_flag_value`]
    /// so roles stay aligned.
    pub fn args_mut(&mut self) -> &mut [String] {
        &mut self.args
    }

    /// Per-argument roles, parallel to [`CommandLine::args`].
    pub fn roles(&self) -> &[ArgRole] {
        &self.roles
    }

    /// Value of a flag. The last occurrence wins, as in the Go `flag` package.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let mut found = None;
        for (arg, role) in self.args.iter().zip(&self.roles) {
            match role {
                ArgRole::Value { flag } if flag == name => found = Some(arg.as_str()),
                ArgRole::InlineFlag { name: flag } if flag == name => {
                    found = split_flag(arg).and_then(|(_, value)| value);
                }
                _ => {}
            }
        }
        found
    }

    /// Replace the value of a flag, or add the flag if it is missing.
    ///
    /// A new flag is inserted right before the first operand so the tool
    /// still sees it while parsing flags.
    pub fn set_flag_value(&mut self, name: &str, value: &str) {
        let last = self
            .roles
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, role)| match role {
                ArgRole::Value { flag } if flag == name => Some((idx, false)),
                ArgRole::InlineFlag { name: flag } if flag == name => Some((idx, true)),
                _ => None,
            });

        match last {
            Some((idx, false)) => self.args[idx] = value.to_string(),
            Some((idx, true)) => self.args[idx] = format!("-{}={}", name, value),
            None => {
                let at = self
                    .roles
                    .iter()
                    .position(|role| !role.is_flag_part())
                    .unwrap_or(self.roles.len());
                self.args.insert(at, format!("-{}", name));
                self.args.insert(at + 1, value.to_string());
                self.roles.insert(
                    at,
                    ArgRole::Flag {
                        name: name.to_string(),
                    },
                );
                self.roles.insert(
                    at + 1,
                    ArgRole::Value {
                        flag: name.to_string(),
                    },
                );
            }
        }
    }

    /// Append an operand (file or archive) at the end of the command line.
    pub fn append_arg(&mut self, arg: impl Into<String>) {
        let arg = arg.into();
        self.roles.push(ArgRole::operand(&arg));
        self.args.push(arg);
    }

    /// Source file arguments in their original order.
    pub fn go_files(&self) -> Vec<SourceArg<'_>> {
        self.args
            .iter()
            .zip(&self.roles)
            .filter_map(|(arg, role)| match role {
                ArgRole::Source(kind) => Some(SourceArg {
                    path: arg.as_str(),
                    kind: *kind,
                }),
                _ => None,
            })
            .collect()
    }

    /// Replace a source file argument in place. Returns whether it was found.
    ///
    /// The argument keeps its original role: a swapped test file is still
    /// the test file as far as the command line is concerned.
    pub fn replace_file(&mut self, old: &str, new: &str) -> bool {
        let position = self
            .args
            .iter()
            .zip(&self.roles)
            .position(|(arg, role)| matches!(role, ArgRole::Source(_)) && arg == old);
        match position {
            Some(idx) => {
                self.args[idx] = new.to_string();
                true
            }
            None => false,
        }
    }

    /// Run the tool with the current arguments, forwarding stdio verbatim.
    pub fn run(&self) -> Result<(), CommandError> {
        run_tool(&self.tool, &self.args)
    }
}

fn run_tool(tool: &Path, args: &[String]) -> Result<(), CommandError> {
    tracing::debug!(tool = %tool.display(), ?args, "running toolchain command");
    let status = process::Command::new(tool)
        .args(args)
        .status()
        .map_err(|source| CommandError::Spawn {
            tool: tool.to_path_buf(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandError::ExecutionFailed {
            tool: tool.to_path_buf(),
            code: status.code(),
        })
    }
}

/// `go tool compile` invocation.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    line: CommandLine,
}

impl CompileCommand {
    pub fn new(tool: PathBuf, args: Vec<String>) -> Self {
        Self {
            line: CommandLine::new(tool, args, compile_flags()),
        }
    }

    /// Build identifier shared with the rest of the build (`-buildid`).
    pub fn build_id(&self) -> Option<&str> {
        self.flag_value("buildid")
    }

    /// Output object path (`-o`).
    pub fn output(&self) -> Option<&str> {
        self.flag_value("o")
    }

    /// Import path of the package being compiled (`-p`).
    pub fn package_path(&self) -> Option<&str> {
        self.flag_value("p")
    }

    /// Import configuration file (`-importcfg`).
    pub fn importcfg(&self) -> Option<&str> {
        self.flag_value("importcfg")
    }

    /// Test and driver sources, the candidates for rewriting.
    pub fn rewrite_candidates(&self) -> Vec<SourceArg<'_>> {
        self.go_files()
            .into_iter()
            .filter(|f| f.kind.is_rewrite_candidate())
            .collect()
    }
}

impl Deref for CompileCommand {
    type Target = CommandLine;

    fn deref(&self) -> &CommandLine {
        &self.line
    }
}

impl DerefMut for CompileCommand {
    fn deref_mut(&mut self) -> &mut CommandLine {
        &mut self.line
    }
}

/// `go tool link` invocation.
#[derive(Debug, Clone)]
pub struct LinkCommand {
    line: CommandLine,
}

impl LinkCommand {
    pub fn new(tool: PathBuf, args: Vec<String>) -> Self {
        Self {
            line: CommandLine::new(tool, args, link_flags()),
        }
    }

    /// Build identifier (`-buildid`).
    pub fn build_id(&self) -> Option<&str> {
        self.flag_value("buildid")
    }

    /// Output binary path (`-o`).
    pub fn output(&self) -> Option<&str> {
        self.flag_value("o")
    }

    /// Import configuration file (`-importcfg`).
    pub fn importcfg(&self) -> Option<&str> {
        self.flag_value("importcfg")
    }

    /// Main package archives given as operands.
    pub fn archives(&self) -> Vec<&str> {
        self.args()
            .iter()
            .zip(self.roles())
            .filter(|(_, role)| **role == ArgRole::Positional)
            .map(|(arg, _)| arg.as_str())
            .collect()
    }
}

impl Deref for LinkCommand {
    type Target = CommandLine;

    fn deref(&self) -> &CommandLine {
        &self.line
    }
}

impl DerefMut for LinkCommand {
    fn deref_mut(&mut self) -> &mut CommandLine {
        &mut self.line
    }
}

/// Any other tool (asm, cgo, vet, version probes, ...), passed through as is.
#[derive(Debug, Clone)]
pub struct OtherCommand {
    tool: PathBuf,
    args: Vec<String>,
}

impl OtherCommand {
    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn run(&self) -> Result<(), CommandError> {
        run_tool(&self.tool, &self.args)
    }
}

/// A classified toolchain invocation.
#[derive(Debug, Clone)]
pub enum Command {
    Compile(CompileCommand),
    Link(LinkCommand),
    Other(OtherCommand),
}

impl Command {
    /// Classify `argv = [tool, args...]`.
    pub fn classify(argv: Vec<String>) -> Result<Self, CommandError> {
        let mut argv = argv.into_iter();
        let tool = PathBuf::from(argv.next().ok_or(CommandError::Empty)?);
        let args: Vec<String> = argv.collect();

        let command = match CommandKind::detect(&tool, &args) {
            CommandKind::Compile => Command::Compile(CompileCommand::new(tool, args)),
            CommandKind::Link => Command::Link(LinkCommand::new(tool, args)),
            CommandKind::Other => Command::Other(OtherCommand { tool, args }),
        };
        tracing::debug!(kind = ?command.kind(), tool = %command.tool().display(), "classified command");
        Ok(command)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Compile(_) => CommandKind::Compile,
            Command::Link(_) => CommandKind::Link,
            Command::Other(_) => CommandKind::Other,
        }
    }

    pub fn tool(&self) -> &Path {
        match self {
            Command::Compile(cmd) => cmd.tool(),
            Command::Link(cmd) => cmd.tool(),
            Command::Other(cmd) => cmd.tool(),
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Command::Compile(cmd) => cmd.args(),
            Command::Link(cmd) => cmd.args(),
            Command::Other(cmd) => cmd.args(),
        }
    }

    /// Launch the real tool with the (possibly mutated) arguments.
    pub fn run(&self) -> Result<(), CommandError> {
        match self {
            Command::Compile(cmd) => cmd.run(),
            Command::Link(cmd) => cmd.run(),
            Command::Other(cmd) => cmd.run(),
        }
    }
}
