use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const SQUARE: &str = "class Square {
    field int size;
    method void erase() { return; }
}
";

#[test]
fn compiles_file_next_to_source() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("Square.jack");
    fs::write(&input_path, SQUARE).expect("write input");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(&input_path)
        .assert()
        .success();

    let vm = fs::read_to_string(dir.path().join("Square.vm")).expect("read vm");
    assert_eq!(
        vm,
        "function Square.erase 0\npush argument 0\npop pointer 0\npush constant 0\nreturn\n"
    );
}

#[test]
fn emits_xml_parse_tree() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("Square.jack");
    fs::write(&input_path, SQUARE).expect("write input");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg("--xml")
        .arg(&input_path)
        .assert()
        .success();

    let xml = fs::read_to_string(dir.path().join("Square.xml")).expect("read xml");
    assert!(xml.starts_with("<class>\n  <keyword> class </keyword>\n"));
    assert!(!dir.path().join("Square.vm").exists());
}

#[test]
fn compiles_whole_directory_into_out_dir() {
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("project");
    fs::create_dir_all(project.join("shapes")).expect("create project");
    fs::write(
        project.join("Main.jack"),
        "class Main { function void main() { do Output.printInt(1); return; } }",
    )
    .expect("write main");
    fs::write(project.join("shapes").join("Square.jack"), SQUARE).expect("write square");
    fs::write(project.join("notes.txt"), "not a class").expect("write notes");
    let out_dir = dir.path().join("build");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(&project)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success();

    let main = fs::read_to_string(out_dir.join("Main.vm")).expect("read main");
    assert!(main.contains("call Output.printInt 1\npop temp 7\n"));
    assert!(out_dir.join("shapes").join("Square.vm").exists());
    assert!(!out_dir.join("notes.vm").exists());
}

#[test]
fn out_dir_keeps_same_named_classes_apart() {
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("project");
    for (folder, function) in [("a", "one"), ("b", "two")] {
        fs::create_dir_all(project.join(folder)).expect("create folder");
        fs::write(
            project.join(folder).join("Main.jack"),
            format!("class Main {{ function void {function}() {{ return; }} }}"),
        )
        .expect("write main");
    }
    let out_dir = dir.path().join("build");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(&project)
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success();

    let first = fs::read_to_string(out_dir.join("a").join("Main.vm")).expect("read a");
    let second = fs::read_to_string(out_dir.join("b").join("Main.vm")).expect("read b");
    assert!(first.starts_with("function Main.one 0\n"));
    assert!(second.starts_with("function Main.two 0\n"));
}

#[test]
fn prints_to_stdout_without_writing_files() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("Square.jack");
    fs::write(&input_path, SQUARE).expect("write input");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg("--stdout")
        .arg(&input_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("function Square.erase 0"));

    assert!(!dir.path().join("Square.vm").exists());
}

#[test]
fn reports_undeclared_variable() {
    let dir = tempdir().expect("tempdir");
    let input_path = dir.path().join("Main.jack");
    fs::write(
        &input_path,
        "class Main { function void main() { let ghost = 1; return; } }",
    )
    .expect("write input");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(&input_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("`ghost` is not declared"));

    assert!(!dir.path().join("Main.vm").exists());
}

#[test]
fn reports_missing_path() {
    let dir = tempdir().expect("tempdir");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(dir.path().join("Missing.jack"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to collect sources"));
}

#[test]
fn rejects_directory_without_sources() {
    let dir = tempdir().expect("tempdir");

    Command::cargo_bin("jack-cli")
        .expect("binary exists")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no .jack files found"));
}
