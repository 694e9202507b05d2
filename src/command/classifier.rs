//! Argument classifier: raw tool args to per-argument roles.

use crate::command::registry::{lookup, FlagArity, FlagDef};

/// Suffix of Go test sources.
pub const TEST_FILE_SUFFIX: &str = "_test.go";
/// Fragment of the driver file `go test` synthesizes for the test binary.
pub const DRIVER_FILE_FRAGMENT: &str = "_testmain.go";
/// Suffix of every Go source argument.
pub const GO_FILE_SUFFIX: &str = ".go";

/// What kind of source a file argument is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Regular package source.
    Ordinary,
    /// `*_test.go` file.
    Test,
    /// Synthesized `_testmain.go` driver.
    Driver,
}

impl SourceKind {
    /// Classify a source path by its name.
    pub fn of(path: &str) -> Self {
        if path.contains(DRIVER_FILE_FRAGMENT) {
            Self::Driver
        } else if path.ends_with(TEST_FILE_SUFFIX) {
            Self::Test
        } else {
            Self::Ordinary
        }
    }

    /// Test and driver files are candidates for rewriting.
    pub fn is_rewrite_candidate(self) -> bool {
        matches!(self, Self::Test | Self::Driver)
    }
}

/// The role a single argument plays on the tool's command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgRole {
    /// `-name` with no inline value. The value, if the flag takes one,
    /// is the next argument.
    Flag { name: String },
    /// Value of the preceding flag.
    Value { flag: String },
    /// `-name=value`.
    InlineFlag { name: String },
    /// `--`, ends flag parsing.
    Terminator,
    /// A `.go` source file after the flags.
    Source(SourceKind),
    /// Any other non-flag argument (archives, `-`, ...).
    Positional,
}

impl ArgRole {
    /// Role of an argument that appears after flag parsing stopped.
    pub fn operand(arg: &str) -> Self {
        if arg.ends_with(GO_FILE_SUFFIX) {
            Self::Source(SourceKind::of(arg))
        } else {
            Self::Positional
        }
    }

    /// Does this role belong to the flag section of the command line?
    pub fn is_flag_part(&self) -> bool {
        matches!(
            self,
            Self::Flag { .. } | Self::Value { .. } | Self::InlineFlag { .. }
        )
    }
}

/// Result of classifying raw arguments.
#[derive(Debug, Clone)]
pub struct ClassifyResult {
    /// One role per argument, in order.
    pub roles: Vec<ArgRole>,
    /// Warnings produced during classification (e.g., missing values).
    pub warnings: Vec<String>,
}

/// Split `-name=value` / `--name` into the bare flag name and inline value.
pub fn split_flag(arg: &str) -> Option<(&str, Option<&str>)> {
    let body = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    if body.is_empty() {
        return None;
    }
    Some(match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    })
}

/// Classify raw tool args against the registry.
///
/// Mirrors the Go `flag` package: flags come first, a value-taking flag
/// consumes the next argument unconditionally, and parsing stops at `--`
/// or the first argument that is not a flag.
pub fn classify(raw_args: &[String], registry: &[FlagDef]) -> ClassifyResult {
    let mut roles = Vec::with_capacity(raw_args.len());
    let mut warnings = Vec::new();
    let mut iter = raw_args.iter().peekable();
    let mut in_flags = true;

    while let Some(arg) = iter.next() {
        if !in_flags {
            roles.push(ArgRole::operand(arg));
            continue;
        }

        if arg == "--" {
            roles.push(ArgRole::Terminator);
            in_flags = false;
            continue;
        }

        let Some((name, inline)) = split_flag(arg) else {
            // First operand ends flag parsing
            in_flags = false;
            roles.push(ArgRole::operand(arg));
            continue;
        };

        if inline.is_some() {
            roles.push(ArgRole::InlineFlag {
                name: name.to_string(),
            });
            continue;
        }

        let def = lookup(registry, name).filter(|def| def.arity == FlagArity::RequiresValue);
        roles.push(ArgRole::Flag {
            name: name.to_string(),
        });

        if let Some(def) = def {
            if iter.next().is_some() {
                roles.push(ArgRole::Value {
                    flag: name.to_string(),
                });
            } else {
                warnings.push(format!(
                    "-{} ({}): missing required value",
                    name, def.description
                ));
            }
        }
    }

    ClassifyResult { roles, warnings }
}
