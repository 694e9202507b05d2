//! Test model extracted from one parsed source file.

use std::path::{Path, PathBuf};

use super::lexer::Span;
use super::{Instrumentation, SUITE_ENTRY_NAME};

/// Line and column, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl From<Span> for Position {
    fn from(span: Span) -> Self {
        Self {
            line: span.line,
            column: span.column,
        }
    }
}

/// One import spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Explicit local name (`ddtesting`, `.`, `_`), if any.
    pub name: Option<String>,
    /// Unquoted import path.
    pub path: String,
    pub position: Position,
}

impl ImportSpec {
    /// Name the imported package is referenced by, `None` for dot and blank
    /// imports.
    pub fn local_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(name) => Some(name),
            None => Some(self.path.rsplit('/').next().unwrap_or(&self.path)),
        }
    }
}

/// Where new imports are inserted: right after the package clause, on the
/// same line, so no original line moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportAnchor {
    /// Byte offset to insert at.
    pub offset: usize,
    /// Whether the package clause already ends with an explicit `;`.
    pub explicit_semi: bool,
}

/// A call `X.Run(args...)` where `X` is a bound context identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The receiver identifier (`t`, `m`, ...).
    pub receiver: String,
    /// From the receiver through the method name.
    pub callee: Span,
    pub open_paren: Span,
    pub close_paren: Span,
    /// One span per argument, in order.
    pub args: Vec<Span>,
}

impl CallSite {
    pub fn position(&self) -> Position {
        self.callee.into()
    }

    /// Source text of each argument.
    pub fn arg_texts<'s>(&self, source: &'s str) -> Vec<&'s str> {
        self.args.iter().map(|s| &source[s.start..s.end]).collect()
    }
}

/// A subtest invocation inside a test function.
pub type SubtestCall = CallSite;

/// A top-level `TestXxx` function with a `*testing.T` or `*testing.M`
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFunction {
    pub name: String,
    /// Identifier bound to the context parameter.
    pub context_ident: String,
    /// The parameter is the suite driver (`*testing.M`).
    pub is_suite_entry: bool,
    pub start: Position,
    pub end: Position,
    pub subtests: Vec<SubtestCall>,
}

/// The `main` function of a synthesized test driver and its `m.Run()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEntry {
    pub function: String,
    pub run_call: CallSite,
}

/// A parsed source file plus the facts the planner needs.
///
/// Never mutated after parsing; rewrites are collected in a separate
/// [`super::Rewrite`] buffer.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub package: String,
    pub imports: Vec<ImportSpec>,
    pub import_anchor: ImportAnchor,
    pub tests: Vec<TestFunction>,
    pub driver: Option<DriverEntry>,
    /// A receiver-less `func main` is declared.
    pub defines_main: bool,
    /// Names declared at package scope by `func`, `var`, `const` and `type`.
    pub declarations: Vec<String>,
}

impl ParsedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First usable local name for an import path.
    pub fn local_name(&self, path: &str) -> Option<&str> {
        self.imports
            .iter()
            .filter(|spec| spec.path == path)
            .find_map(|spec| spec.local_name())
    }

    /// Whether a package-scope declaration binds `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.declarations.iter().any(|d| d == name)
    }

    pub fn imports_path(&self, path: &str) -> bool {
        self.imports.iter().any(|spec| spec.path == path)
    }

    /// The SDK is imported under its canonical name.
    pub fn contains_sdk_import(&self, sdk: &Instrumentation) -> bool {
        self.imports.iter().any(|spec| {
            spec.path == sdk.import_path && spec.name.as_deref() == Some(sdk.local_name.as_str())
        })
    }

    /// A hand-written `TestMain` or a program entry point.
    ///
    /// A file declaring `func main` belongs to a driver package, which runs
    /// the suite itself even when it delegates to a user `TestMain`.
    pub fn has_suite_entry(&self) -> bool {
        self.defines_main
            || self.driver.is_some()
            || self.tests.iter().any(|t| t.name == SUITE_ENTRY_NAME)
    }

    pub fn test(&self, name: &str) -> Option<&TestFunction> {
        self.tests.iter().find(|t| t.name == name)
    }

    /// Number of call sites an instrumentation pass would rewrite.
    pub fn call_site_count(&self) -> usize {
        self.tests.iter().map(|t| t.subtests.len()).sum::<usize>()
            + usize::from(self.driver.is_some())
    }
}
