//! Integration tests for per-unit planning, the build session and the
//! compile pipeline (rewrite → swap → inject).

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{read_rewritten, FakeArtifacts, NoopInjector, Workspace, SDK_PATH};
use testinject::inject::ImportCfgInjector;
use testinject::planner::{BuildContext, RewriteResult};
use testinject::processor::TestProcessor;
use testinject::rewrite::{parse_file, parse_source, Instrumentation};
use testinject::session::BuildSession;

const TEST_A: &str = r#"package pkg

import "testing"

func TestA(t *testing.T) {
	t.Run("s", func(t *testing.T) {})
}
"#;

const TEST_EXTERNAL: &str = r#"package pkg_test

import "testing"

func TestB(t *testing.T) {}
"#;

fn context(ws: &Workspace, build_id: &str) -> BuildContext {
    BuildContext::new(build_id, Instrumentation::default(), ws.out_dir())
        .with_session_dir(ws.session_dir())
}

fn plan(ws: &Workspace, build_id: &str, files: &[&str]) -> RewriteResult {
    let mut ctx = context(ws, build_id);
    for path in files {
        ctx.add_file(parse_file(Path::new(path)).unwrap());
    }
    ctx.plan()
}

fn synthesized_test_main(path: &Path) -> bool {
    let text = read_rewritten(path);
    parse_source(path, text)
        .unwrap()
        .test("TestMain")
        .is_some()
}

// =============================================================================
// SUITE ENTRY OWNERSHIP
// =============================================================================

#[test]
fn unit_and_external_unit_share_one_test_main() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);
    let external = ws.go_file("b_test.go", TEST_EXTERNAL);

    let first = plan(&ws, "build-1", &[&internal]);
    let second = plan(&ws, "build-1", &[&external]);

    let internal_main = first.get(Path::new(&internal)).is_some_and(|p| synthesized_test_main(p));
    let external_main = second.get(Path::new(&external)).is_some_and(|p| synthesized_test_main(p));
    assert!(internal_main ^ external_main, "exactly one unit owns TestMain");

    let session = BuildSession::new(&ws.session_dir(), "build-1");
    assert_eq!(session.read_units().unwrap(), ["pkg"]);
}

#[test]
fn external_unit_first_defers_the_internal_unit() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);
    let external = ws.go_file("b_test.go", TEST_EXTERNAL);

    let first = plan(&ws, "build-2", &[&external]);
    let second = plan(&ws, "build-2", &[&internal]);

    assert!(synthesized_test_main(&first[Path::new(&external)]));
    // Still rewritten for the subtest, but without a TestMain.
    let rewritten = &second[Path::new(&internal)];
    assert!(!synthesized_test_main(rewritten));
    assert!(read_rewritten(rewritten).contains("ddtesting.Run(t, \"s\""));
}

#[test]
fn sibling_in_same_invocation_defers() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);
    let external = ws.go_file("b_test.go", TEST_EXTERNAL);

    let result = plan(&ws, "build-3", &[&internal, &external]);
    assert!(!synthesized_test_main(&result[Path::new(&internal)]));
    assert!(synthesized_test_main(&result[Path::new(&external)]));
}

#[test]
fn sessions_are_scoped_by_build_id() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);

    let first = plan(&ws, "build-x", &[&internal]);
    let second = plan(&ws, "build-y", &[&internal]);
    assert!(synthesized_test_main(&first[Path::new(&internal)]));
    assert!(synthesized_test_main(&second[Path::new(&internal)]));
}

#[test]
fn unit_without_testing_import_gets_no_test_main() {
    let ws = Workspace::new();
    let helper = ws.go_file("helper_test.go", "package pkg\n\nfunc helper() int { return 1 }\n");

    let result = plan(&ws, "build-4", &[&helper]);
    assert!(result.is_empty());
    let session = BuildSession::new(&ws.session_dir(), "build-4");
    assert!(session.read_units().unwrap().is_empty());
}

#[test]
fn existing_test_main_is_kept() {
    let ws = Workspace::new();
    let main = ws.go_file(
        "main_test.go",
        "package pkg\n\nimport (\n\t\"os\"\n\t\"testing\"\n)\n\nfunc TestMain(m *testing.M) {\n\tos.Exit(m.Run())\n}\n",
    );
    let test = ws.go_file("a_test.go", TEST_A);

    let result = plan(&ws, "build-5", &[&main, &test]);
    let main_out = read_rewritten(&result[Path::new(&main)]);
    assert!(main_out.contains("os.Exit(ddtesting.RunM(m))"));
    assert_eq!(main_out.matches("func TestMain").count(), 1);
    assert!(!synthesized_test_main(&result[Path::new(&test)]));
}

#[test]
fn host_is_first_file_importing_testing() {
    let ws = Workspace::new();
    let plain = ws.go_file("util_test.go", "package pkg\n\nvar x = 1\n");
    let first = ws.go_file("a_test.go", "package pkg\n\nimport \"testing\"\n\nfunc TestA(t *testing.T) {}\n");
    let second = ws.go_file("b_test.go", "package pkg\n\nimport \"testing\"\n\nfunc TestB(t *testing.T) {}\n");

    let result = plan(&ws, "build-6", &[&plain, &first, &second]);
    assert_eq!(result.len(), 1);
    assert!(synthesized_test_main(&result[Path::new(&first)]));
}

#[test]
fn unlockable_session_still_synthesizes() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);
    let session_dir = ws.dir.path().join("nope");
    let mut ctx = BuildContext::new("build-lock", Instrumentation::default(), ws.out_dir())
        .with_session_dir(&session_dir);
    ctx.add_file(parse_file(Path::new(&internal)).unwrap());

    let result = ctx.plan();
    assert!(synthesized_test_main(&result[Path::new(&internal)]));
    // The record could not be written either; that is only a warning.
    assert!(!ctx.session().path().exists());
    assert!(!session_dir.exists());
}

#[test]
fn concurrent_sibling_units_share_one_test_main() {
    let ws = Workspace::new();
    let internal = ws.go_file("a_test.go", TEST_A);
    let external = ws.go_file("b_test.go", TEST_EXTERNAL);
    let internal_file = parse_file(Path::new(&internal)).unwrap();
    let external_file = parse_file(Path::new(&external)).unwrap();

    for round in 0..100 {
        let build_id = format!("race-{round}");
        let plan_one = |file: &testinject::rewrite::ParsedFile| {
            let mut ctx = context(&ws, &build_id);
            ctx.add_file(file.clone());
            ctx.plan()
                .get(file.path())
                .is_some_and(|p| synthesized_test_main(p))
        };

        let (internal_main, external_main) = std::thread::scope(|scope| {
            let a = scope.spawn(|| plan_one(&internal_file));
            let b = scope.spawn(|| plan_one(&external_file));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(
            internal_main ^ external_main,
            "round {round}: internal={internal_main} external={external_main}"
        );
        let units = BuildSession::new(&ws.session_dir(), &build_id).read_units().unwrap();
        assert_eq!(units.len(), 1, "round {round}: {units:?}");
    }
}

// =============================================================================
// IDEMPOTENCE AND OUTPUT FILES
// =============================================================================

#[test]
fn file_importing_sdk_is_unchanged() {
    let ws = Workspace::new();
    let src = format!(
        "package pkg\n\nimport (\n\t\"testing\"\n\n\tddtesting \"{}\"\n)\n\nfunc TestA(t *testing.T) {{\n\tddtesting.Run(t, \"s\", func(t *testing.T) {{ t.Run(\"x\", nil) }})\n}}\n",
        SDK_PATH
    );
    let path = ws.go_file("a_test.go", &src);

    let result = plan(&ws, "build-7", &[&path]);
    assert!(result.is_empty());
}

#[test]
fn temp_file_keeps_name_and_points_back_to_original() {
    let ws = Workspace::new();
    let path = ws.go_file("widget_test.go", TEST_A);

    let result = plan(&ws, "build-8", &[&path]);
    let temp = &result[Path::new(&path)];

    assert_eq!(temp.parent(), Some(ws.out_dir().as_path()));
    let name = temp.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("widget_test_"), "{name}");
    assert!(name.ends_with("_.go"), "{name}");

    let raw = fs::read_to_string(temp).unwrap();
    assert!(raw.starts_with(&format!("//line {}:1\n", path)));
    assert_eq!(fs::read_to_string(&path).unwrap(), TEST_A, "original untouched");
}

#[test]
fn unwritable_temp_dir_keeps_originals() {
    let ws = Workspace::new();
    let path = ws.go_file("a_test.go", TEST_A);
    let mut ctx = BuildContext::new("build-9", Instrumentation::default(), ws.dir.path().join("missing"))
        .with_session_dir(ws.session_dir());
    ctx.add_file(parse_file(Path::new(&path)).unwrap());

    assert!(ctx.plan().is_empty());
    // No host could be written, so the unit is not claimed.
    assert!(ctx.session().read_units().unwrap().is_empty());
}

// =============================================================================
// END TO END
// =============================================================================

#[test]
fn compile_pipeline_end_to_end() {
    let ws = Workspace::new();
    let src = "package pkg\n\nimport \"testing\"\n\nfunc TestA(t *testing.T){ t.Run(\"s\", func(t *testing.T){}) }\n";
    let test = ws.go_file("a_test.go", src);
    let ordinary = ws.go_file("a.go", "package pkg\n");
    let importcfg = ws.importcfg("importcfg", &["testing", "os"]);

    let mut cmd = common::compile("example.com/pkg", "e2e/build", &importcfg, &[&ordinary, &test]);
    let injector = ImportCfgInjector::new(Instrumentation::default(), FakeArtifacts::sdk(), ws.out_dir());
    let processor = TestProcessor::new(Instrumentation::default(), injector, ws.out_dir())
        .with_session_dir(ws.session_dir());

    let result = processor.process_compile(&mut cmd).unwrap();

    // (a) subtest call targets the SDK with the original arguments
    let temp = result[Path::new(&test)].clone();
    let rewritten = read_rewritten(&temp);
    assert!(rewritten.contains("ddtesting.Run(t, \"s\", func(t *testing.T){})"));

    // (b) the command compiles the temp file in place of the original
    let files: Vec<&str> = cmd.go_files().iter().map(|f| f.path).collect();
    assert_eq!(files, [ordinary.as_str(), temp.to_str().unwrap()]);

    // (c) TestMain routed through the SDK
    assert!(rewritten.contains("func TestMain(m *testing.M) {\n\tos.Exit(ddtesting.RunM(m))\n}"));

    // (d) the session lists the unit
    let session = BuildSession::new(&ws.session_dir(), "e2e/build");
    assert_eq!(session.read_units().unwrap(), ["pkg"]);

    // the SDK package is registered for the compiler
    let new_cfg = PathBuf::from(cmd.importcfg().unwrap());
    assert_ne!(new_cfg, PathBuf::from(&importcfg));
    let cfg_text = fs::read_to_string(new_cfg).unwrap();
    assert!(cfg_text.contains(&format!("packagefile {}=/work/b001/_pkg_.a", SDK_PATH)));
    assert_eq!(cfg_text.matches("packagefile os=").count(), 1);
}

#[test]
fn compile_without_test_files_is_untouched() {
    let ws = Workspace::new();
    let ordinary = ws.go_file("a.go", "package pkg\n\nfunc A() {}\n");
    let importcfg = ws.importcfg("importcfg", &["fmt"]);

    let mut cmd = common::compile("example.com/pkg", "plain", &importcfg, &[&ordinary]);
    let before = cmd.args().to_vec();
    let processor = TestProcessor::new(Instrumentation::default(), NoopInjector, ws.out_dir())
        .with_session_dir(ws.session_dir());

    let result = processor.process_compile(&mut cmd).unwrap();
    assert!(result.is_empty());
    assert_eq!(cmd.args(), before.as_slice());
}

#[test]
fn unparsable_test_file_is_compiled_as_is() {
    let ws = Workspace::new();
    let broken = ws.go_file("broken_test.go", "package pkg\n\nfunc TestA(t *testing.T) {\n");
    let importcfg = ws.importcfg("importcfg", &["testing"]);

    let mut cmd = common::compile("example.com/pkg", "broken", &importcfg, &[&broken]);
    let processor = TestProcessor::new(Instrumentation::default(), NoopInjector, ws.out_dir())
        .with_session_dir(ws.session_dir());

    let result = processor.process_compile(&mut cmd).unwrap();
    assert!(result.is_empty());
    assert_eq!(cmd.go_files()[0].path, broken);
}
