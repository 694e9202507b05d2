//! Span edits collected against an immutable [`ParsedFile`].

use super::model::{CallSite, ParsedFile};
use super::{parse_source, EmitError, Instrumentation, EXIT_FUNC, OS_PACKAGE, SUITE_ENTRY_NAME, TESTING_PACKAGE};

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Pending rewrite of one file.
#[derive(Debug, Clone)]
pub struct Rewrite<'a> {
    file: &'a ParsedFile,
    edits: Vec<Edit>,
    /// (import path, local name) added by this rewrite
    added_imports: Vec<(String, String)>,
    appended: String,
}

impl<'a> Rewrite<'a> {
    pub fn new(file: &'a ParsedFile) -> Self {
        Self {
            file,
            edits: Vec::new(),
            added_imports: Vec::new(),
            appended: String::new(),
        }
    }

    pub fn file(&self) -> &'a ParsedFile {
        self.file
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.appended.is_empty()
    }

    /// Route every subtest call and driver `Run` call through the SDK.
    /// Returns the number of rewritten call sites.
    pub fn instrument(&mut self, sdk: &Instrumentation) -> usize {
        let file = self.file;
        if file.call_site_count() == 0 {
            return 0;
        }
        let qualifier = self.ensure_import(&sdk.import_path, &sdk.local_name);

        let mut count = 0;
        for test in &file.tests {
            let entry = if test.is_suite_entry {
                &sdk.suite_entry
            } else {
                &sdk.subtest_entry
            };
            for call in &test.subtests {
                self.rewrite_call(call, &qualifier, entry);
                count += 1;
            }
        }
        if let Some(driver) = &file.driver {
            self.rewrite_call(&driver.run_call, &qualifier, &sdk.suite_entry);
            count += 1;
        }
        count
    }

    /// `recv.Run(args)` → `qualifier.entry(recv, args)`.
    pub fn rewrite_call(&mut self, call: &CallSite, qualifier: &str, entry: &str) {
        let mut text = format!("{}.{}({}", qualifier, entry, call.receiver);
        if !call.args.is_empty() {
            text.push_str(", ");
        }
        self.edits.push(Edit {
            start: call.callee.start,
            end: call.open_paren.end,
            text,
        });
    }

    /// Make `path` importable and return the name to reference it by.
    ///
    /// Reuses an existing usable import. A new import takes `preferred`, or
    /// a numbered variant of it when that name is already bound.
    pub fn ensure_import(&mut self, path: &str, preferred: &str) -> String {
        if let Some(name) = self.file.local_name(path) {
            return name.to_string();
        }
        if let Some((_, name)) = self.added_imports.iter().find(|(p, _)| p == path) {
            return name.clone();
        }

        let mut name = preferred.to_string();
        let mut suffix = 1;
        while self.name_taken(&name) {
            name = format!("{}{}", preferred, suffix);
            suffix += 1;
        }

        let anchor = self.file.import_anchor;
        let text = if anchor.explicit_semi {
            format!(" import {} \"{}\";", name, path)
        } else {
            format!("; import {} \"{}\"", name, path)
        };
        self.edits.push(Edit {
            start: anchor.offset,
            end: anchor.offset,
            text,
        });
        self.added_imports.push((path.to_string(), name.clone()));
        name
    }

    /// Bound by an import or a package-scope declaration.
    fn name_taken(&self, name: &str) -> bool {
        self.file
            .imports
            .iter()
            .any(|spec| spec.local_name() == Some(name))
            || self.file.declares(name)
            || self.added_imports.iter().any(|(_, n)| n == name)
    }

    /// Append a `TestMain` that runs the suite through the SDK.
    pub fn append_suite_entry(&mut self, sdk: &Instrumentation, var: &str) {
        let testing = self.ensure_import(TESTING_PACKAGE, TESTING_PACKAGE);
        let os = self.ensure_import(OS_PACKAGE, OS_PACKAGE);
        let qualifier = self.ensure_import(&sdk.import_path, &sdk.local_name);
        self.appended = format!(
            "\n\nfunc {entry}({var} *{testing}.M) {{\n\t{os}.{exit}({q}.{run}({var}))\n}}\n",
            entry = SUITE_ENTRY_NAME,
            var = var,
            testing = testing,
            os = os,
            exit = EXIT_FUNC,
            q = qualifier,
            run = sdk.suite_entry,
        );
    }

    /// Apply the edits and check the result still parses.
    pub fn emit(&self) -> Result<String, EmitError> {
        let source = &self.file.source;
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| (edit.start, edit.end));

        let mut out = String::with_capacity(source.len() + self.appended.len() + 128);
        let mut cursor = 0;
        for edit in edits {
            if edit.start < cursor {
                return Err(EmitError::Overlap {
                    path: self.file.path.clone(),
                    offset: edit.start,
                });
            }
            out.push_str(&source[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&source[cursor..]);
        out.push_str(&self.appended);

        let reparsed = parse_source(self.file.path.clone(), out).map_err(EmitError::Invalid)?;
        Ok(reparsed.source)
    }
}
