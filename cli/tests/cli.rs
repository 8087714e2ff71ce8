use std::fs;
use std::process::Command;

use indoc::indoc;

const BIN: &str = env!("CARGO_BIN_EXE_mallows");

const DATA: &str = indoc! {r#"
    {
        "kind": "rankings",
        "n_items": 4,
        "steps": [
            {"ann": [1, 2, 3, 4], "bob": [2, 1, 0, 0]},
            {"cat": [1, 3, 2, 4]},
            {"bob": [2, 1, 4, 3]}
        ]
    }
"#};

const CONFIG: &str = indoc! {"
    prior:
      n_items: 4
    options:
      metric: footrule
      n_particles: 16
      n_particle_filters: 2
      max_rejuvenation_steps: 2
      trace: true
"};

#[test]
fn run_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.json");
    let config = dir.path().join("config.yaml");
    let out = dir.path().join("results.json");
    fs::write(&data, DATA).unwrap();
    fs::write(&config, CONFIG).unwrap();

    let output = Command::new(BIN)
        .args(["run", "--quiet", "--seed", "1337"])
        .arg("--data")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(results["n_steps"], 3);
    assert_eq!(results["complete"], true);
    assert_eq!(results["alpha"].as_array().unwrap().len(), 16);
    assert_eq!(results["ess"].as_array().unwrap().len(), 3);
    assert_eq!(
        results["traces"]["parameters"].as_array().unwrap().len(),
        3
    );
}

#[test]
fn run_with_mismatched_prior_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.json");
    let config = dir.path().join("config.yaml");
    fs::write(&data, DATA).unwrap();
    fs::write(&config, "prior:\n  n_items: 5\n").unwrap();

    let output = Command::new(BIN)
        .args(["run", "--quiet"])
        .arg("--data")
        .arg(&data)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(dir.path().join("results.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("items"));
}

#[test]
fn tabulate_writes_a_table_the_run_can_use() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(BIN)
        .args(["tabulate", "--metric", "ulam", "--n-items", "4", "--dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let table: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join("ulam_4.json")).unwrap(),
    )
    .unwrap();
    let total: f64 = table["cardinalities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_f64().unwrap())
        .sum();
    assert_eq!(total, 24.0);
}

#[test]
fn tabulate_refuses_too_many_items() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(BIN)
        .args(["tabulate", "--metric", "footrule", "--n-items", "20", "--dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at most 12"));
    assert!(!dir.path().join("footrule_20.json").exists());
}
