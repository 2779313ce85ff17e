use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use tempfile::tempdir;

use hene_compiler::{compile_with_options, CompileOptions};

/// Collects all .js files from a directory
fn collect_js_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("js")
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

fn options_for(path: &Path) -> CompileOptions {
    CompileOptions::default().with_file_id(path.to_string_lossy().to_string())
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let demos = collect_js_files(PathBuf::from("demos"));
    assert!(!demos.is_empty(), "No demos found in demos/");

    let mut failed = Vec::new();
    for path in &demos {
        let source = fs::read_to_string(path).unwrap();
        match compile_with_options(&source, &options_for(path)) {
            Ok(code) => {
                assert!(code.contains("extends HTMLElement"), "{}", path.display());
                assert!(code.contains("__build()"), "{}", path.display());
                assert!(!code.contains("$render"), "{}", path.display());
                assert!(!code.contains("$node"), "{}", path.display());
                assert!(!code.contains("$event"), "{}", path.display());
                let out = temp_dir.path().join(path.file_name().unwrap());
                fs::write(out, code).unwrap();
            }
            Err(e) => failed.push((path.clone(), e)),
        }
    }

    if !failed.is_empty() {
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} demo(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn e2e_smoke_test_error_demos() {
    let errors = collect_js_files(PathBuf::from("demos/errors"));
    assert!(!errors.is_empty(), "No error demos found in demos/errors/");

    for path in &errors {
        let source = fs::read_to_string(path).unwrap();
        let err = compile_with_options(&source, &options_for(path))
            .expect_err(&format!("{} should fail to compile", path.display()));
        assert!(err.location.is_some(), "{} has no location", path.display());
        let report = err.render();
        assert!(report.contains("[Hene ERR_"));
        assert!(report.contains("help:") || err.hint.is_none());
        assert!(report.contains(&path.to_string_lossy().to_string()));
    }
}

#[test]
fn e2e_cli_writes_output_and_runtime() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let output = temp_dir.path().join("counter.out.js");
    let runtime = temp_dir.path().join("runtime.js");

    let status = Command::new(env!("CARGO_BIN_EXE_henec"))
        .arg("demos/counter.js")
        .arg("-o")
        .arg(&output)
        .arg("--emit-runtime")
        .arg(&runtime)
        .arg("--log-level")
        .arg("off")
        .status()
        .unwrap();
    assert!(status.success());

    let code = fs::read_to_string(&output).unwrap();
    assert!(code.contains("class CounterButton extends HTMLElement"));
    assert!(fs::read_to_string(&runtime).unwrap().contains("export function $state"));
}

#[test]
fn e2e_cli_error_and_passthrough() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = "demos/errors/node-in-method.js";
    let output = temp_dir.path().join("out.js");

    let status = Command::new(env!("CARGO_BIN_EXE_henec"))
        .args([input, "--log-level", "off", "-o"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!output.exists());

    let status = Command::new(env!("CARGO_BIN_EXE_henec"))
        .args([input, "--log-level", "off", "--passthrough", "-o"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        fs::read_to_string(input).unwrap()
    );
}

#[test]
fn e2e_cli_rejects_unknown_option_keys() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config = temp_dir.path().join("hene.json");
    fs::write(&config, r#"{ "markerBase": "HeneElement", "typo": true }"#).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_henec"))
        .args(["demos/counter.js", "--log-level", "off", "--config"])
        .arg(&config)
        .status()
        .unwrap();
    assert!(!status.success());
}
