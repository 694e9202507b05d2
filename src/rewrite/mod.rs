//! Go source analysis and rewriting.
//!
//! Flow: source → [`lexer`] tokens → [`tree`] token trees → [`parser`]
//! test model ([`ParsedFile`]) → [`Rewrite`] edits → emitted source.
//!
//! Rewrites are span edits against the original text, so formatting and
//! line numbers outside the edited spans are preserved.

pub mod diagnostic;
pub mod edit;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod tree;

use std::path::PathBuf;

use thiserror::Error;

pub use diagnostic::{format_diagnostic, Diagnostic};
pub use edit::Rewrite;
pub use model::{
    CallSite, DriverEntry, ImportAnchor, ImportSpec, ParsedFile, Position, SubtestCall,
    TestFunction,
};
pub use parser::{parse_file, parse_source};

/// Prefix every test function name starts with.
pub const TEST_PREFIX: &str = "Test";
pub const TESTING_PACKAGE: &str = "testing";
/// `*testing.T`
pub const CONTEXT_TYPE: &str = "T";
/// `*testing.M`
pub const SUITE_DRIVER_TYPE: &str = "M";
pub const RUN_METHOD: &str = "Run";
pub const SUITE_ENTRY_NAME: &str = "TestMain";
pub const MAIN_FUNC: &str = "main";
pub const MAIN_START_FUNC: &str = "MainStart";
/// Driver binding assumed when no `testing.MainStart` assignment is found.
pub const DEFAULT_DRIVER_IDENT: &str = "m";
pub const OS_PACKAGE: &str = "os";
pub const EXIT_FUNC: &str = "Exit";

pub const DEFAULT_SDK_IMPORT_PATH: &str = "github.com/DataDog/dd-sdk-go-testing/autoinstrument";
pub const DEFAULT_SDK_IMPORT_NAME: &str = "ddtesting";

/// The SDK package that rewritten calls are routed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumentation {
    pub import_path: String,
    /// Preferred local name for the import.
    pub local_name: String,
    /// `ddtesting.Run(t, name, fn)`
    pub subtest_entry: String,
    /// `ddtesting.RunM(m)`
    pub suite_entry: String,
}

impl Instrumentation {
    pub fn new(import_path: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            local_name: local_name.into(),
            ..Self::default()
        }
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self {
            import_path: DEFAULT_SDK_IMPORT_PATH.to_string(),
            local_name: DEFAULT_SDK_IMPORT_NAME.to_string(),
            subtest_entry: "Run".to_string(),
            suite_entry: "RunM".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}:{column}: {message}\n{excerpt}", .path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
        excerpt: String,
    },
}

impl ParseError {
    pub(crate) fn syntax(path: PathBuf, diag: &Diagnostic, source: &str) -> Self {
        let (line, column) = diag.position();
        ParseError::Syntax {
            path,
            line,
            column,
            message: diag.message.clone(),
            excerpt: format_diagnostic(diag, source),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("overlapping edits in {} at byte {offset}", .path.display())]
    Overlap { path: PathBuf, offset: usize },

    #[error("rewritten source does not parse: {0}")]
    Invalid(#[source] ParseError),

    #[error("failed to write rewritten {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
