//! CLI command integration tests.
//! Each test uses a temp directory via ARMORY_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn armory_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("armory").unwrap();
    cmd.env("ARMORY_DATA_DIR", data_dir.path());
    cmd
}

#[test]
fn fresh_store_shows_defaults() {
    let dir = TempDir::new().unwrap();
    let output = armory_cmd(&dir)
        .args(["bindings", "--hand", "right"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines.iter().all(|l| l.starts_with("right") && l.ends_with("default")));
    assert!(stdout.contains("SwordShortCommon"));
}

#[test]
fn bindings_json_lists_both_hands() {
    let dir = TempDir::new().unwrap();
    let output = armory_cmd(&dir).args(["bindings", "--json"]).output().unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 12);
}

#[test]
fn assign_then_resolve() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["assign", "left", "up", "SpearFighter"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bound left/up"));

    armory_cmd(&dir)
        .args(["resolve", "left", "up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SpearFighter (exact)"));

    // right hand is untouched
    armory_cmd(&dir)
        .args(["resolve", "right", "up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SwordShortCommon (default)"));
}

#[test]
fn assign_rejects_none_direction() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["assign", "right", "none", "Sword"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be bound"));
}

#[test]
fn unknown_hand_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["resolve", "middle", "up"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown hand"));
}

#[test]
fn reset_one_hand() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["assign", "right", "down", "BowRecurve"])
        .assert()
        .success();
    armory_cmd(&dir)
        .args(["assign", "left", "down", "BowRecurve"])
        .assert()
        .success();

    armory_cmd(&dir)
        .args(["reset", "--hand", "right"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cleared 1 right hand bindings"));

    armory_cmd(&dir)
        .args(["resolve", "right", "down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DaggerCommon (default)"));
    armory_cmd(&dir)
        .args(["resolve", "left", "down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BowRecurve (exact)"));
}

#[test]
fn classify_mirrors_left_hand() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["classify", "0.2", "0", "0"])
        .assert()
        .success()
        .stdout("right\n");
    armory_cmd(&dir)
        .args(["classify", "0.2", "0", "0", "--hand", "left"])
        .assert()
        .success()
        .stdout("left\n");
    armory_cmd(&dir)
        .args(["classify", "-0.01", "0", "0", "--elapsed", "1.0"])
        .assert()
        .success()
        .stdout("none\n");
}

#[test]
fn export_import_between_stores() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let file = src.path().join("bindings.json");

    armory_cmd(&src)
        .args(["assign", "right", "forward", "Halberd"])
        .assert()
        .success();
    armory_cmd(&src)
        .arg("export")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported to"));

    armory_cmd(&dst)
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported"));
    armory_cmd(&dst)
        .args(["resolve", "right", "forward"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Halberd"));
}

#[test]
fn import_garbage_fails() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("junk.json");
    std::fs::write(&file, "not json").unwrap();
    armory_cmd(&dir)
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to import JSON"));
}

#[test]
fn config_reflects_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("armory.toml"),
        "[capture]\nsearch_radius = 3.5\n",
    )
    .unwrap();
    armory_cmd(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("search_radius = 3.5"))
        .stdout(predicate::str::contains("portal_resource = \"Rift\""));
}

#[test]
fn malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("armory.toml"), "[capture\n").unwrap();
    armory_cmd(&dir)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn simulate_runs_the_timeline() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["simulate", "--hz", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bound right/right → DaggerCommon"))
        .stdout(predicate::str::contains("recalled DaggerCommon"))
        .stdout(predicate::str::contains("bound=DaggerCommon, recalled=1"));

    // throwaway prefs: the real store still has defaults
    armory_cmd(&dir)
        .args(["resolve", "right", "right"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ShieldPartisan (default)"));
}

#[test]
fn simulate_persist_writes_binding() {
    let dir = TempDir::new().unwrap();
    armory_cmd(&dir)
        .args(["simulate", "--hz", "200", "--persist"])
        .assert()
        .success();
    armory_cmd(&dir)
        .args(["resolve", "right", "right"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DaggerCommon (exact)"));
}
