//! End-to-end tests running the `subst` binary.
//!
//! Every test runs in its own temporary directory, which also serves as HOME so
//! a user's ~/.subst/config.toml never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn subst(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("subst").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG").current_dir(home);
    cmd
}

fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_replace_in_file_with_backup() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "foo bar foo\n");

    subst(dir.path())
        .args(["-s", "s/foo/baz/g"])
        .arg(&file)
        .assert()
        .success()
        .stdout("");

    assert_eq!(fs::read_to_string(&file).unwrap(), "baz bar baz\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt.bak")).unwrap(),
        "foo bar foo\n"
    );
}

#[test]
fn test_combined_expression_defaults_to_one_replacement() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "foo bar foo");

    subst(dir.path())
        .args(["-b", "-s", "s/foo/baz/"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "baz bar foo");
}

#[test]
fn test_separate_pattern_replaces_all() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "a1 b2 c3");

    subst(dir.path())
        .args(["-b", "-p", r"(\w)(\d)", "-r", "$2$1"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "1a 2b 3c");
}

#[test]
fn test_stdin_to_stdout() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["-s", "s/a/b/g"])
        .write_stdin("aaa\nxa\n")
        .assert()
        .success()
        .stdout("bbb\nxb\n");

    // nothing written next to the working directory
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_dash_reads_stdin() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["-p", "x", "-r", "y", "-"])
        .write_stdin("xx")
        .assert()
        .success()
        .stdout("yy");
}

#[test]
fn test_no_replacements_exits_with_one() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "nothing here");

    subst(dir.path())
        .args(["-s", "s/zzz/y/g"])
        .arg(&file)
        .assert()
        .code(1);

    assert_eq!(fs::read_to_string(&file).unwrap(), "nothing here");
}

#[test]
fn test_stdout_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "foo");

    subst(dir.path())
        .args(["--stdout", "-s", "s/foo/bar/"])
        .arg(&file)
        .assert()
        .success()
        .stdout("bar");

    assert_eq!(fs::read_to_string(&file).unwrap(), "foo");
    assert!(!dir.path().join("a.txt.bak").exists());
}

#[test]
fn test_existing_backup_skips_file() {
    let dir = TempDir::new().unwrap();
    let first = create_test_file(dir.path(), "a.txt", "foo");
    create_test_file(dir.path(), "a.txt.bak", "old");
    let second = create_test_file(dir.path(), "b.txt", "foo");

    subst(dir.path())
        .args(["-s", "s/foo/bar/"])
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stderr(predicate::str::contains("ERROR:").and(predicate::str::contains("already exists")));

    assert_eq!(fs::read_to_string(&first).unwrap(), "foo");
    assert_eq!(fs::read_to_string(dir.path().join("a.txt.bak")).unwrap(), "old");
    assert_eq!(fs::read_to_string(&second).unwrap(), "bar");
}

#[test]
fn test_missing_file_reported() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["-s", "s/a/b/"])
        .arg(dir.path().join("missing.txt"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ERROR:").and(predicate::str::contains("missing.txt")));
}

#[test]
fn test_custom_backup_extension() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "foo");

    subst(dir.path())
        .args(["-e", ".orig", "-s", "s/foo/bar/"])
        .arg(&file)
        .assert()
        .success();

    assert!(dir.path().join("a.txt.orig").exists());
    assert!(!dir.path().join("a.txt..orig").exists());
}

#[test]
fn test_linear_count_across_lines() {
    let dir = TempDir::new().unwrap();
    let file = create_test_file(dir.path(), "a.txt", "aa\naa\naa\n");

    subst(dir.path())
        .args(["-b", "-l", "-c", "3", "-p", "a", "-r", "X"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "XX\nXa\naa\n");
}

#[test]
fn test_literal_pattern() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["-t", "-p", "a.b", "-r", "X"])
        .write_stdin("a.b axb")
        .assert()
        .success()
        .stdout("X axb");
}

#[test]
fn test_eval_replace() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["--eval-replace", "-s", "s/[0-9]+/parse_int(m.group()) * 2/g"])
        .write_stdin("2 cats, 21 dogs")
        .assert()
        .success()
        .stdout("4 cats, 42 dogs");
}

#[test]
fn test_verbose_summary() {
    let dir = TempDir::new().unwrap();
    let a = create_test_file(dir.path(), "a.txt", "x x");
    let b = create_test_file(dir.path(), "b.txt", "y");

    subst(dir.path())
        .args(["--verbose", "-b", "-s", "s/x/z/g"])
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stderr(
            predicate::str::contains("    2 replacements")
                .and(predicate::str::contains("    0 replacements"))
                .and(predicate::str::contains("There was 2 replacements in 1 file.")),
        );
}

#[test]
fn test_debug_reports_files_without_summary() {
    let dir = TempDir::new().unwrap();
    let a = create_test_file(dir.path(), "a.txt", "x x");

    subst(dir.path())
        .args(["--debug", "-b", "-s", "s/x/z/g"])
        .arg(&a)
        .assert()
        .success()
        .stderr(
            predicate::str::contains("    2 replacements")
                .and(predicate::str::contains("There was").not()),
        );
}

#[test]
fn test_bad_pattern_is_usage_error() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .args(["-s", "s/(unclosed/x/"])
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ERROR:"));

    subst(dir.path())
        .args(["-s", "s/a/b/q"])
        .write_stdin("")
        .assert()
        .code(2);
}

#[test]
fn test_missing_pattern_is_usage_error() {
    let dir = TempDir::new().unwrap();

    subst(dir.path()).arg("file.txt").assert().code(2);
    subst(dir.path()).args(["-p", "a", "file.txt"]).assert().code(2);
}

#[test]
fn test_undecodable_input() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bin.dat");
    fs::write(&file, b"a\xff\xfea").unwrap();

    subst(dir.path())
        .args(["-b", "-s", "s/a/b/g"])
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--encoding-file"));

    assert_eq!(fs::read(&file).unwrap(), b"a\xff\xfea");
}

#[test]
fn test_file_encoding() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("latin2.txt");
    fs::write(&file, [0x5a, 0xf3, 0xb3, 0x74, 0x79]).unwrap();

    subst(dir.path())
        .args(["-b", "--encoding-file", "iso-8859-2", "-s", "s/ł/l/"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(fs::read(&file).unwrap(), vec![0x5a, 0xf3, b'l', 0x74, 0x79]);
}

#[test]
fn test_utf16_file_encoding() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("wide.txt");
    let utf16le = |s: &str| -> Vec<u8> { s.encode_utf16().flat_map(u16::to_le_bytes).collect() };
    fs::write(&file, utf16le("foo bar")).unwrap();

    subst(dir.path())
        .args(["-b", "--encoding-file", "utf-16le", "-s", "s/foo/baz/"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(fs::read(&file).unwrap(), utf16le("baz bar"));
}

#[test]
fn test_expand_wildcards() {
    let dir = TempDir::new().unwrap();
    let a = create_test_file(dir.path(), "a.txt", "foo");
    let b = create_test_file(dir.path(), "b.txt", "foo");
    let c = create_test_file(dir.path(), "c.log", "foo");

    subst(dir.path())
        .args(["-W", "-b", "-s", "s/foo/bar/"])
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .success();

    assert_eq!(fs::read_to_string(a).unwrap(), "bar");
    assert_eq!(fs::read_to_string(b).unwrap(), "bar");
    assert_eq!(fs::read_to_string(c).unwrap(), "foo");
}

#[test]
fn test_config_file_defaults() {
    let dir = TempDir::new().unwrap();
    let config = create_test_file(dir.path(), "subst.toml", "[backup]\nextension = \"old\"\n");
    let file = create_test_file(dir.path(), "a.txt", "foo");

    subst(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["-s", "s/foo/bar/"])
        .arg(&file)
        .assert()
        .success();

    assert!(dir.path().join("a.txt.old").exists());
}

#[test]
fn test_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = create_test_file(dir.path(), "subst.toml", "[encoding]\nfile = \"martian\"\n");

    subst(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["-s", "s/a/b/"])
        .write_stdin("a")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("encoding.file"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();

    subst(dir.path())
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
