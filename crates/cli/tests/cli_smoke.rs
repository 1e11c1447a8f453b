use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn csa(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("csa").expect("binary");
    cmd.current_dir(workdir.path())
        .env("CSA_LLM_MODE", "stub")
        .env_remove("CSA_CONFIG")
        .env_remove("CSA_OUTPUT_FILE")
        .env_remove("CSA_REPORTER");
    cmd
}

fn project(workdir: &TempDir) -> std::path::PathBuf {
    let src = workdir.path().join("project");
    fs::create_dir_all(src.join("pkg")).expect("mkdir");
    fs::write(
        src.join("a.py"),
        "import os\n\nclass Greeter:\n    def greet(self):\n        return os.name\n",
    )
    .expect("write a.py");
    fs::write(
        src.join("pkg/b.js"),
        "const fs = require('fs');\nfunction load(p) {\n  return fs.readFileSync(p);\n}\n",
    )
    .expect("write b.js");
    fs::write(src.join("notes.txt"), "not analyzed\n").expect("write notes");
    src
}

#[test]
fn analyzes_directory_into_markdown_report() {
    let temp = TempDir::new().expect("tempdir");
    let src = project(&temp);
    let report = temp.path().join("report.md");

    csa(&temp)
        .arg(&src)
        .arg("-o")
        .arg(&report)
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 2 files analyzed"));

    let text = fs::read_to_string(&report).expect("report");
    assert!(text.contains("### `a.py`"), "{text}");
    assert!(text.contains("### `pkg/b.js`"), "{text}");
    assert!(text.contains("Greeter"), "{text}");
    assert!(!text.contains("notes.txt"), "{text}");
    assert!(src.join(".csa/checkpoint.jsonl").exists());
}

#[test]
fn second_run_resumes_from_checkpoint() {
    let temp = TempDir::new().expect("tempdir");
    let src = project(&temp);
    let report = temp.path().join("report.md");

    csa(&temp)
        .arg(&src)
        .arg("-o")
        .arg(&report)
        .assert()
        .success();

    csa(&temp)
        .arg(&src)
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of 2 files analyzed (2 already complete"));

    csa(&temp)
        .arg(&src)
        .arg("-o")
        .arg(&report)
        .arg("--fresh")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 2 files analyzed (0 already complete"));
}

#[test]
fn jsonl_reporter_writes_one_line_per_file() {
    let temp = TempDir::new().expect("tempdir");
    let src = project(&temp);
    let report = temp.path().join("report.jsonl");

    csa(&temp)
        .arg(&src)
        .args(["--reporter", "jsonl", "--extensions", ".py"])
        .arg("-o")
        .arg(&report)
        .assert()
        .success();

    let text = fs::read_to_string(&report).expect("report");
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 1, "{text}");
    assert!(lines[0].contains("\"path\":\"a.py\""), "{text}");
}

#[test]
fn missing_directory_fails() {
    let temp = TempDir::new().expect("tempdir");
    csa(&temp)
        .arg(temp.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn unknown_reporter_fails_before_running() {
    let temp = TempDir::new().expect("tempdir");
    let src = project(&temp);

    csa(&temp)
        .arg(&src)
        .args(["--reporter", "html"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("markdown"));
    assert!(!src.join(".csa").exists());
}

#[test]
fn print_config_dumps_effective_settings() {
    let temp = TempDir::new().expect("tempdir");
    let output = csa(&temp)
        .args(["--print-config", "-c", "75", "--no-dependencies"])
        .output()
        .expect("command run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("chunk_size = 75"), "{stdout}");
    assert!(stdout.contains("include_dependencies = false"), "{stdout}");
}
