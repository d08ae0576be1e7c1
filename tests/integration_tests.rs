//! End-to-end tests of the butterfly-access binary
//!
//! Each test writes a small dataset into a temporary directory, runs the
//! binary on it and checks the CSV it produces.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Two facilities, two origins, three OD edges (plus one beyond 30 minutes)
fn write_dataset(dir: &Path) {
    std::fs::write(
        dir.join("facilities.csv"),
        "facility_id,Name,Capacity_Doctors\n1,North Clinic,10\n2,South Clinic,20\n",
    )
    .unwrap();
    std::fs::write(dir.join("population.csv"), "PopID,Population_2011\n7,5\n8,15\n9,40\n").unwrap();
    std::fs::write(
        dir.join("od.csv"),
        "OriginID,DestinationID,TravelTime\n7,1,10\n7,2,20\n8,2,5\n9,1,45\n",
    )
    .unwrap();
}

fn butterfly_access(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("butterfly-access").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_cli_help_works() {
    Command::cargo_bin("butterfly-access")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--decay-exponent"));
}

#[test]
fn test_cli_version_works() {
    Command::cargo_bin("butterfly-access")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_uniform_scores_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "--max-travel-time",
            "30",
            "-o",
            "scores.csv",
        ])
        .assert()
        .success();

    let lines = read_lines(&dir.path().join("scores.csv"));
    assert_eq!(lines[0], "origin_id,facility_count,access_2sfca");
    assert_eq!(lines[1], "7,2,3");
    assert_eq!(lines[2], "8,1,1");
    // Origin 9 only had an edge above the threshold
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_decay_sweep_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-b",
            "1.5",
            "-b",
            "2",
            "--facility-summary",
            "facilities_out.csv",
            "-o",
            "scores.csv",
        ])
        .assert()
        .success();

    let lines = read_lines(&dir.path().join("scores.csv"));
    assert_eq!(lines[0], "origin_id,facility_count,access_huff_b1.5,access_huff_b2");
    assert_eq!(lines.len(), 4);

    let summary = read_lines(&dir.path().join("facilities_out.csv"));
    assert_eq!(summary[0], "method,facility_id,capacity,demand,ratio,origin_count");
    // Two facilities per exponent
    assert_eq!(summary.len(), 5);
}

#[test]
fn test_join_onto_attribute_table() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(
        dir.path().join("communities.csv"),
        "PopID,Community,access_2sfca\n7,Riverside,0\n8,Hilltop,0\n10,Lakeshore,0\n",
    )
    .unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "--max-travel-time",
            "30",
            "--join",
            "communities.csv",
            "-o",
            "joined.csv",
        ])
        .assert()
        .success();

    let lines = read_lines(&dir.path().join("joined.csv"));
    assert_eq!(lines[0], "PopID,Community,facility_count,access_2sfca");
    assert_eq!(lines[1], "7,Riverside,2,3");
    assert_eq!(lines[2], "8,Hilltop,1,1");
    assert_eq!(lines[3], "10,Lakeshore,,");
}

#[test]
fn test_config_file_run() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(
        dir.path().join("access.toml"),
        r#"
[inputs]
facilities = "facilities.csv"
population = "population.csv"
od_matrix = "od.csv"

[run]
mode = "decay"
decay_exponents = [2.0]
max_travel_time = 30.0

[output]
scores = "scores.csv"
"#,
    )
    .unwrap();

    butterfly_access(dir.path())
        .args(["--config", "access.toml"])
        .assert()
        .success();

    let lines = read_lines(&dir.path().join("scores.csv"));
    assert_eq!(lines[0], "origin_id,facility_count,access_huff_b2");
}

#[test]
fn test_no_clobber_keeps_existing_output() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(dir.path().join("scores.csv"), "existing").unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(std::fs::read_to_string(dir.path().join("scores.csv")).unwrap(), "existing");
}

#[test]
fn test_existing_summary_blocks_all_outputs() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(dir.path().join("summary.csv"), "existing").unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
            "--facility-summary",
            "summary.csv",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert!(!dir.path().join("scores.csv").exists());
    assert_eq!(std::fs::read_to_string(dir.path().join("summary.csv")).unwrap(), "existing");
}

#[test]
fn test_force_overwrites_output() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(dir.path().join("scores.csv"), "existing").unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
            "--force",
        ])
        .assert()
        .success();

    assert!(read_lines(&dir.path().join("scores.csv"))[0].starts_with("origin_id"));
}

#[test]
fn test_force_and_no_clobber_conflict() {
    let dir = TempDir::new().unwrap();
    butterfly_access(dir.path())
        .args(["--force", "--no-clobber"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used together"));
}

#[test]
fn test_unknown_facility_fails() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(dir.path().join("od.csv"), "OriginID,DestinationID,TravelTime\n7,3,10\n").unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("facility 3"));

    assert!(!dir.path().join("scores.csv").exists());
}

#[test]
fn test_missing_column_suggestion() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path());
    std::fs::write(dir.path().join("od.csv"), "OriginID,DestinationID,Travel_Time\n7,1,10\n").unwrap();

    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did you mean 'Travel_Time'"));
}

#[test]
fn test_dry_run_prints_config() {
    let dir = TempDir::new().unwrap();
    butterfly_access(dir.path())
        .args([
            "--facilities",
            "facilities.csv",
            "--population",
            "population.csv",
            "--od",
            "od.csv",
            "-o",
            "scores.csv",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"od_matrix\": \"od.csv\""));

    assert!(!dir.path().join("scores.csv").exists());
}
