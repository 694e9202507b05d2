//! Substitutes rewritten temp files for their originals on a compile line.

use std::path::Path;

use tracing::debug;

use crate::command::CompileCommand;
use crate::planner::RewriteResult;

pub struct FileSwapper<'m> {
    mapping: &'m RewriteResult,
}

impl<'m> FileSwapper<'m> {
    pub fn new(mapping: &'m RewriteResult) -> Self {
        Self { mapping }
    }

    /// Replace every source argument found in the mapping. Argument count
    /// and order are unchanged. Returns the number of swapped files.
    pub fn process_compile(&self, cmd: &mut CompileCommand) -> usize {
        let swaps: Vec<(String, String)> = cmd
            .go_files()
            .into_iter()
            .filter_map(|file| {
                let temp = self.mapping.get(Path::new(file.path))?;
                Some((file.path.to_string(), temp.to_string_lossy().into_owned()))
            })
            .collect();

        let mut swapped = 0;
        for (old, new) in swaps {
            if cmd.replace_file(&old, &new) {
                debug!(from = %old, to = %new, "swapped source file");
                swapped += 1;
            }
        }
        swapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn swaps_only_mapped_files() {
        let mut cmd = CompileCommand::new(
            PathBuf::from("/go/pkg/tool/compile"),
            ["-o", "out.a", "-p", "p", "a.go", "a_test.go", "b_test.go"]
                .map(String::from)
                .to_vec(),
        );
        let mut mapping = RewriteResult::new();
        mapping.insert(PathBuf::from("b_test.go"), PathBuf::from("/tmp/b_test_1_.go"));

        assert_eq!(FileSwapper::new(&mapping).process_compile(&mut cmd), 1);
        assert_eq!(
            cmd.args(),
            ["-o", "out.a", "-p", "p", "a.go", "a_test.go", "/tmp/b_test_1_.go"]
        );
    }
}
