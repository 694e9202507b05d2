//! Compile and link orchestration: rewrite → swap → inject.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{CompileCommand, LinkCommand};
use crate::inject::{InjectError, PackageInjector};
use crate::planner::{BuildContext, RewriteResult};
use crate::rewrite::{parse_file, Instrumentation};
use crate::swap::FileSwapper;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("package injection failed: {0}")]
    Inject(#[from] InjectError),
}

pub struct TestProcessor<I> {
    sdk: Instrumentation,
    injector: I,
    temp_dir: PathBuf,
    session_dir: PathBuf,
}

impl<I: PackageInjector> TestProcessor<I> {
    pub fn new(sdk: Instrumentation, injector: I, temp_dir: impl Into<PathBuf>) -> Self {
        let temp_dir = temp_dir.into();
        Self {
            sdk,
            injector,
            session_dir: temp_dir.clone(),
            temp_dir,
        }
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    /// Rewrite the test and driver sources of a compile command, swap the
    /// rewritten copies in and register the SDK package.
    pub fn process_compile(&self, cmd: &mut CompileCommand) -> Result<RewriteResult, ProcessError> {
        let build_id = cmd.build_id().unwrap_or_default().to_string();
        let mut ctx = BuildContext::new(build_id, self.sdk.clone(), &self.temp_dir)
            .with_session_dir(&self.session_dir);

        for source in cmd.rewrite_candidates() {
            match parse_file(Path::new(source.path)) {
                Ok(parsed) => ctx.add_file(parsed),
                Err(err) => warn!(error = %err, "skipping unparsable file"),
            }
        }

        let result = if ctx.units().is_empty() {
            RewriteResult::new()
        } else {
            ctx.plan()
        };

        if !result.is_empty() {
            let swapped = FileSwapper::new(&result).process_compile(cmd);
            debug!(swapped, "swapped rewritten files");
        }

        self.injector.process_compile(cmd)?;
        Ok(result)
    }

    pub fn process_link(&self, cmd: &mut LinkCommand) -> Result<bool, ProcessError> {
        Ok(self.injector.process_link(cmd)?)
    }
}
