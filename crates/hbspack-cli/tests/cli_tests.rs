use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn hbspack_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hbspack"))
}

// ============================================================================
// COMPILING TO FILES
// ============================================================================

#[test]
fn test_writes_module_next_to_template() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("card.hbs");
    fs::write(&input, "<h1>{{bold title}}</h1>{{> footer}}").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .args(["--helper", "bold=./bold", "--partial", "footer=./footer"])
        .assert()
        .success();

    let output = fs::read_to_string(temp_dir.path().join("card.js")).unwrap();
    assert!(output.starts_with("import * as Handlebars from \"handlebars/runtime\";"));
    assert!(output.contains("import bold from \"./bold\";"));
    assert!(output.contains("import footer from \"./footer\";"));
    assert!(output.contains("export default Handlebars.template("));
}

#[test]
fn test_out_dir_and_directory_input() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("templates");
    let out = temp_dir.path().join("dist");
    fs::create_dir_all(src.join("nested")).unwrap();
    fs::write(src.join("a.hbs"), "a").unwrap();
    fs::write(src.join("nested").join("b.handlebars"), "b").unwrap();
    fs::write(src.join("notes.txt"), "not a template").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&src)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("a.js").exists());
    assert!(out.join("nested").join("b.js").exists());
    assert!(!out.join("notes.js").exists());
}

#[test]
fn test_out_dir_collision_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("dist");
    for dir in ["x", "y"] {
        fs::create_dir_all(temp_dir.path().join(dir)).unwrap();
        fs::write(temp_dir.path().join(dir).join("card.hbs"), dir).unwrap();
    }

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(temp_dir.path().join("x").join("card.hbs"))
        .arg(temp_dir.path().join("y").join("card.hbs"))
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Output collision"));

    assert!(!out.join("card.js").exists());
}

#[test]
fn test_include_glob() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("one.hbs"), "1").unwrap();
    fs::write(temp_dir.path().join("two.hbs"), "2").unwrap();
    let pattern = format!("{}/*.hbs", temp_dir.path().display());

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .args(["--include", &pattern])
        .assert()
        .success();

    assert!(temp_dir.path().join("one.js").exists());
    assert!(temp_dir.path().join("two.js").exists());
}

#[test]
fn test_runtime_module_override() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("x.hbs");
    fs::write(&input, "x").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .args(["--runtime-module", "handlebars/dist/handlebars.runtime"])
        .assert()
        .success();

    let output = fs::read_to_string(temp_dir.path().join("x.js")).unwrap();
    assert!(output.contains("from \"handlebars/dist/handlebars.runtime\""));
}

#[test]
fn test_inline_source_map_flag() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("x.hbs");
    let config = temp_dir.path().join("hbsconfig.yaml");
    fs::write(&input, "<b>{{x}}</b>").unwrap();
    fs::write(&config, "compileOptions:\n  sourceMap: true\n").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .arg("--inline-source-map")
        .assert()
        .success();

    let output = fs::read_to_string(temp_dir.path().join("x.js")).unwrap();
    assert!(output.contains("//# sourceMappingURL=data:application/json;base64,"));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_project_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("page.hbs");
    let config = temp_dir.path().join("custom.json");
    fs::write(&input, "{{upper name}}").unwrap();
    fs::write(&config, r#"{ "helpers": { "upper": "./helpers/upper.js" } }"#).unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .arg("--project")
        .arg(&config)
        .assert()
        .success();

    let output = fs::read_to_string(temp_dir.path().join("page.js")).unwrap();
    assert!(output.contains("import upper from \"./helpers/upper.js\";"));
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created hbsconfig.yaml"));

    let config = fs::read_to_string(temp_dir.path().join("hbsconfig.yaml")).unwrap();
    assert!(config.contains("runtimeModule: handlebars/runtime"));

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg("--init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("x.hbs");
    fs::write(&input, "x").unwrap();
    fs::write(temp_dir.path().join("hbsconfig.yaml"), "helpers: [not, a, map]\n").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load hbsconfig.yaml"));
}

#[test]
fn test_malformed_helper_override_fails() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("x.hbs");
    fs::write(&input, "x").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&input)
        .args(["--helper", "bold"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected NAME=SPECIFIER"));
}

// ============================================================================
// ERRORS & JSON OUTPUT
// ============================================================================

#[test]
fn test_compile_error_exits_with_one() {
    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.hbs");
    let bad = temp_dir.path().join("bad.hbs");
    fs::write(&good, "fine").unwrap();
    fs::write(&bad, "{{shout name}}").unwrap();

    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&good)
        .arg(&bad)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error ["))
        .stderr(predicate::str::contains("bad.hbs]: You specified knownHelpersOnly"));

    assert!(temp_dir.path().join("good.js").exists());
    assert!(!temp_dir.path().join("bad.js").exists());
}

#[test]
fn test_json_output() {
    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.hbs");
    let bad = temp_dir.path().join("bad.hbs");
    fs::write(&good, "fine").unwrap();
    fs::write(&bad, "{{#if x}}").unwrap();

    let assert = hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(&good)
        .arg(&bad)
        .arg("--json")
        .assert()
        .code(1);

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    let bad_line = lines
        .iter()
        .find(|l| l["path"].as_str().unwrap().ends_with("bad.hbs"))
        .unwrap();
    assert!(bad_line["errors"][0]["text"].is_string());
    let good_line = lines
        .iter()
        .find(|l| l["path"].as_str().unwrap().ends_with("good.hbs"))
        .unwrap();
    assert!(good_line["contents"].as_str().unwrap().contains("Handlebars.template("));
    assert!(!temp_dir.path().join("good.js").exists());
}

#[test]
fn test_no_inputs_fails() {
    let temp_dir = TempDir::new().unwrap();
    hbspack_cmd()
        .current_dir(temp_dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No input templates"));
}

#[test]
fn test_missing_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    hbspack_cmd()
        .current_dir(temp_dir.path())
        .arg(temp_dir.path().join("missing.hbs"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.hbs]"));
}
