mod common;

use serde_json::Value;
use std::process::Command;

use common::*;

fn run(args: &[&str]) -> anyhow::Result<std::process::Output> {
    let bin = env!("CARGO_BIN_EXE_class-usage-finder");
    Ok(Command::new(bin).args(args).env("RUST_LOG", "warn").output()?)
}

fn run_json(args: &[&str]) -> anyhow::Result<Value> {
    let out = run(args)?;
    if !out.status.success() {
        anyhow::bail!(
            "command failed: status={:?}\nstdout:\n{}\nstderr:\n{}",
            out.status.code(),
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

#[test]
fn json_output_for_a_directory_of_jars() -> anyhow::Result<()> {
    let dir = temp_dir("usage_cli_json");
    write_jar(&dir.join("lib.jar"), &[("a/B.class", &class_calling_list_add())])?;
    write_jar(&dir.join("nested/empty.jar"), &[("README.txt", b"nothing here")])?;
    std::fs::write(dir.join("notes.txt"), "not an archive")?;

    let dir_arg = dir.to_string_lossy().to_string();
    let value = run_json(&[
        "-q",
        "method:owner=[e]util.List;name=add",
        "-f",
        "json",
        "--class-workers",
        "2",
        &dir_arg,
    ])?;

    assert_eq!(value["queries"][0]["type"], "method");
    assert_eq!(value["stats"]["total_archives"], 2);
    assert_eq!(value["stats"]["total_classes"], 1);
    assert_eq!(value["stats"]["reports"], 1);
    assert!(value["duration_ms"].is_u64());

    let report = &value["reports"][0];
    assert_eq!(report["location"]["scope"], "code");
    assert_eq!(report["location"]["class_name"], "a.B");
    assert_eq!(report["location"]["method_name"], "m");
    assert_eq!(report["location"]["descriptor"], "()V");
    assert_eq!(report["location"]["line"], 11);
    assert_eq!(report["query"]["owner"]["mode"], "exact");
    assert_eq!(report["query"]["name"]["mode"], "contains_word");

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn text_output_written_to_a_file() -> anyhow::Result<()> {
    let dir = temp_dir("usage_cli_text");
    let jar = dir.join("lib.jar");
    write_jar(&jar, &[("a/B.class", &class_calling_list_add())])?;
    let output = dir.join("out/report.txt");

    let out = run(&[
        "--query",
        "class:name=[e]util.List",
        "-o",
        &output.to_string_lossy(),
        &jar.to_string_lossy(),
    ])?;
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let text = std::fs::read_to_string(&output)?;
    let expected = format!(
        "Query: class:name=[e]util.List\n\
         -  usage at file {} in class a.B in method m (()V) on line 11 from query class:name=[e]util.List\n",
        jar.display()
    );
    assert_eq!(text, expected);

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn invalid_queries_and_missing_paths_fail_before_scanning() -> anyhow::Result<()> {
    let out = run(&["-q", "package:name=x", "whatever.jar"])?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid query"));

    let missing = temp_path("usage_cli_missing", "jar");
    let out = run(&["-q", "class:name=x", &missing.to_string_lossy()])?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
    Ok(())
}
