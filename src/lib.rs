//! testinject - build-time test instrumentation for `go test -toolexec`
//!
//! Every compile and link step of a test build passes through this crate.
//! Compile steps get their test sources rewritten so that `t.Run` and
//! `m.Run` go through the tracing SDK, with a `TestMain` synthesized when a
//! test binary has none. Link steps get the SDK archives registered. The
//! real tool then runs with the patched command line.

pub mod cli;
pub mod command;
pub mod config;
pub mod inject;
pub mod logging;
pub mod planner;
pub mod processor;
pub mod rewrite;
pub mod sdk;
pub mod session;
pub mod swap;

use crate::command::CommandError;

/// Host exit code for the outcome of running the real tool.
pub fn exit_code(outcome: Result<(), CommandError>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            if !matches!(err, CommandError::ExecutionFailed { .. }) {
                eprintln!("testinject: {}", err);
            }
            tracing::debug!(error = %err, "toolchain command failed");
            err.exit_code()
        }
    }
}
