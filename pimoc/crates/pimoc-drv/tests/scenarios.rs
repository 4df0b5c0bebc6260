//! End-to-end scenarios S1-S6 (spec §8), each run against the built `pimoc`
//! binary over a `.pim` fixture written to a temp directory.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn pim_fixture(source: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".pim")
        .tempfile()
        .expect("create temp fixture");
    file.write_all(source.as_bytes()).expect("write fixture");
    file
}

fn run_pimoc(source: &str) -> assert_cmd::assert::Assert {
    let fixture = pim_fixture(source);
    Command::cargo_bin("pimoc")
        .expect("pimoc binary should build")
        .arg(fixture.path())
        .assert()
}

#[test]
fn s1_empty_proc_emits_implicit_ret_void() {
    run_pimoc("proc main { }")
        .success()
        .stdout(predicate::str::contains("define void @main"))
        .stdout(predicate::str::contains("ret void"));
}

#[test]
fn s2_integer_return() {
    run_pimoc("func i32 main() { return 42; }")
        .success()
        .stdout(predicate::str::contains("ret i32 42"));
}

#[test]
fn s3_macro_expansion_matches_s2() {
    run_pimoc("# define FORTY_TWO 42\nfunc i32 main() { return §FORTY_TWO; }")
        .success()
        .stdout(predicate::str::contains("ret i32 42"));
}

#[test]
fn s4_if_else_selection_both_alternatives_terminate() {
    run_pimoc("func i32 main() { if true { return 1; } else { return 0; }; }")
        .success()
        .stdout(predicate::str::contains("ret i32 1"))
        .stdout(predicate::str::contains("ret i32 0"));
}

#[test]
fn s5_while_loop_countdown() {
    let source = "func i32 main() {\n  i32 n = 3;\n  while [n 0 !=] { n = [n 1 -]; };\n  return n;\n}";
    run_pimoc(source).success().stdout(predicate::str::contains("while_body"));
}

#[test]
fn s6_operator_stack_arithmetic_with_dup() {
    run_pimoc("func i32 main() { return [3 dup +]; }")
        .success()
        .stdout(predicate::str::contains("ret i32 6"));
}

#[test]
fn rejects_non_pim_extension() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().expect("create temp fixture");
    file.write_all(b"func void main() { return; }").expect("write fixture");

    Command::cargo_bin("pimoc")
        .expect("pimoc binary should build")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(".pim"));
}

#[test]
fn surfaces_fatal_errors_with_line_and_snippet() {
    Command::cargo_bin("pimoc")
        .expect("pimoc binary should build")
        .arg(pim_fixture("func void main() { bogus; }").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidInstruction"));
}
