//! Injection planning: per-unit decisions on call rewrites and suite-entry
//! synthesis, and the temp files they produce.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::rewrite::{
    EmitError, Instrumentation, ParsedFile, Rewrite, DEFAULT_DRIVER_IDENT, TESTING_PACKAGE,
};
use crate::session::{BuildSession, SessionGuard};

/// Package-name suffix of external test units.
pub const EXTERNAL_TEST_SUFFIX: &str = "_test";

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Original path → rewritten temp path. Absent means unchanged.
pub type RewriteResult = BTreeMap<PathBuf, PathBuf>;

/// Files of one invocation sharing a package name.
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    files: Vec<ParsedFile>,
}

impl Unit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    pub fn has_suite_entry(&self) -> bool {
        self.files.iter().any(ParsedFile::has_suite_entry)
    }

    pub fn is_external(&self) -> bool {
        self.name.ends_with(EXTERNAL_TEST_SUFFIX)
    }
}

/// Everything one invocation's planning step depends on.
#[derive(Debug, Clone)]
pub struct BuildContext {
    build_id: String,
    sdk: Instrumentation,
    temp_dir: PathBuf,
    session_dir: PathBuf,
    units: Vec<Unit>,
}

impl BuildContext {
    pub fn new(build_id: impl Into<String>, sdk: Instrumentation, temp_dir: impl Into<PathBuf>) -> Self {
        let temp_dir = temp_dir.into();
        Self {
            build_id: build_id.into(),
            sdk,
            session_dir: temp_dir.clone(),
            temp_dir,
            units: Vec::new(),
        }
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = dir.into();
        self
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn sdk(&self) -> &Instrumentation {
        &self.sdk
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn session(&self) -> BuildSession {
        BuildSession::new(&self.session_dir, &self.build_id)
    }

    /// Add a parsed file to its unit. Units and files keep input order.
    pub fn add_file(&mut self, file: ParsedFile) {
        match self.units.iter_mut().find(|u| u.name == file.package) {
            Some(unit) => unit.files.push(file),
            None => self.units.push(Unit {
                name: file.package.clone(),
                files: vec![file],
            }),
        }
    }

    /// Decide and write every rewrite of this invocation.
    pub fn plan(&self) -> RewriteResult {
        let mut result = RewriteResult::new();
        for unit in &self.units {
            self.plan_unit(unit, &mut result);
        }
        result
    }

    fn plan_unit(&self, unit: &Unit, result: &mut RewriteResult) {
        let rewrites: Vec<Rewrite<'_>> = unit
            .files
            .iter()
            .map(|file| self.instrument_file(file))
            .collect();

        if unit.has_suite_entry() {
            debug!(unit = %unit.name, "unit already has a suite entry");
        } else {
            let session = self.session();
            let mut guard = session.enter();
            if self.defers_suite_entry(unit, &guard) {
                debug!(unit = %unit.name, "suite entry owned by sibling unit");
            } else if let Some(host) = self.synthesize_suite_entry(unit, &rewrites, result) {
                info!(unit = %unit.name, file = %host.display(), "synthesized TestMain");
                if let Err(err) = guard.record(&unit.name) {
                    warn!(error = %err, "failed to record unit in build session");
                }
            }
        }

        for rewrite in rewrites.iter().filter(|r| !r.is_empty()) {
            let path = rewrite.file().path();
            if result.contains_key(path) {
                continue;
            }
            match rewrite.emit().and_then(|text| self.write_temp(path, &text)) {
                Ok(temp) => {
                    info!(file = %path.display(), "instrumented");
                    result.insert(path.to_path_buf(), temp);
                }
                Err(err) => warn!(error = %err, "keeping original file"),
            }
        }
    }

    /// Call rewrites for one file. Files that already import the SDK are
    /// left alone.
    pub fn instrument_file<'f>(&self, file: &'f ParsedFile) -> Rewrite<'f> {
        let mut rewrite = Rewrite::new(file);
        if file.contains_sdk_import(&self.sdk) {
            debug!(file = %file.path().display(), "already imports the SDK");
            return rewrite;
        }
        let count = rewrite.instrument(&self.sdk);
        if count > 0 {
            debug!(file = %file.path().display(), count, "rewrote call sites");
        }
        rewrite
    }

    /// Whether a sibling unit (`x` / `x_test`) owns the suite entry.
    fn defers_suite_entry(&self, unit: &Unit, session: &SessionGuard<'_>) -> bool {
        match unit.name.strip_suffix(EXTERNAL_TEST_SUFFIX) {
            Some(base) => session.contains(base),
            None => {
                let sibling = format!("{}{}", unit.name, EXTERNAL_TEST_SUFFIX);
                self.units.iter().any(|u| u.name == sibling) || session.contains(&sibling)
            }
        }
    }

    /// Append `TestMain` to the first file that imports `testing` and still
    /// emits cleanly. Returns the host's original path.
    fn synthesize_suite_entry<'u>(
        &self,
        unit: &'u Unit,
        rewrites: &[Rewrite<'_>],
        result: &mut RewriteResult,
    ) -> Option<&'u Path> {
        for (file, rewrite) in unit.files.iter().zip(rewrites) {
            if file.contains_sdk_import(&self.sdk) || file.local_name(TESTING_PACKAGE).is_none() {
                continue;
            }
            let mut candidate = rewrite.clone();
            candidate.append_suite_entry(&self.sdk, DEFAULT_DRIVER_IDENT);
            match candidate
                .emit()
                .and_then(|text| self.write_temp(file.path(), &text))
            {
                Ok(temp) => {
                    result.insert(file.path().to_path_buf(), temp);
                    return Some(file.path());
                }
                Err(err) => warn!(error = %err, "cannot host TestMain, trying next file"),
            }
        }
        None
    }

    /// Write `text` to `<stem>_<random>_<ext>` in the temp dir. The leading
    /// `//line` directive keeps positions pointing at the original file.
    fn write_temp(&self, original: &Path, text: &str) -> Result<PathBuf, EmitError> {
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = original
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let write_err = |source| EmitError::Write {
            path: original.to_path_buf(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{}_", stem))
            .suffix(&format!("_{}", ext))
            .tempfile_in(&self.temp_dir)
            .map_err(write_err)?;
        // A BOM is only legal as the very first character.
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
        write!(temp, "//line {}:1\n{}", line_directive_path(original).display(), text)
            .map_err(write_err)?;
        let (_, path) = temp.keep().map_err(|err| write_err(err.error))?;
        Ok(path)
    }
}

/// The compiler keeps `//line` file names as written, so relative compile
/// arguments are resolved against the working directory.
fn line_directive_path(original: &Path) -> PathBuf {
    if original.is_absolute() {
        return original.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(original),
        Err(err) => {
            warn!(error = %err, "cannot resolve working directory for //line");
            original.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::parse_source;

    fn file(path: &str, src: &str) -> ParsedFile {
        parse_source(path, src.to_string()).unwrap()
    }

    #[test]
    fn groups_files_by_package_in_input_order() {
        let mut ctx = BuildContext::new("id", Instrumentation::default(), "/tmp");
        ctx.add_file(file("a_test.go", "package p\n"));
        ctx.add_file(file("b_test.go", "package p_test\n"));
        ctx.add_file(file("c_test.go", "package p\n"));

        let names: Vec<&str> = ctx.units().iter().map(Unit::name).collect();
        assert_eq!(names, ["p", "p_test"]);
        assert_eq!(ctx.units()[0].files().len(), 2);
        assert!(ctx.units()[1].is_external());
    }

    #[test]
    fn line_directive_path_is_absolute() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(line_directive_path(Path::new("./a_test.go")), cwd.join("./a_test.go"));
        assert_eq!(line_directive_path(Path::new("/src/a_test.go")), PathBuf::from("/src/a_test.go"));
    }

    #[test]
    fn leading_bom_is_dropped_from_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a_test.go");
        let src = "\u{feff}package p\n\nimport \"testing\"\n\nfunc TestA(t *testing.T) { t.Run(\"x\", nil) }\n";
        std::fs::write(&original, src).unwrap();

        let mut ctx = BuildContext::new("bom", Instrumentation::default(), dir.path());
        ctx.add_file(crate::rewrite::parse_file(&original).unwrap());
        let result = ctx.plan();

        let text = std::fs::read_to_string(&result[&original]).unwrap();
        assert!(text.starts_with(&format!("//line {}:1\npackage p;", original.display())));
        assert!(!text.contains(BYTE_ORDER_MARK));
        assert!(crate::rewrite::parse_source(&result[&original], text).is_ok());
    }

    #[test]
    fn sdk_importing_file_gets_no_edits() {
        let ctx = BuildContext::new("id", Instrumentation::default(), "/tmp");
        let parsed = file(
            "a_test.go",
            "package p\nimport (\n\t\"testing\"\n\tddtesting \"github.com/DataDog/dd-sdk-go-testing/autoinstrument\"\n)\nfunc TestA(t *testing.T) { t.Run(\"x\", nil); _ = ddtesting.Run }\n",
        );
        assert!(ctx.instrument_file(&parsed).is_empty());
    }
}
