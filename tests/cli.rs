use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn headless_run_prints_composition_and_frames() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.args(["--headless", "--frames", "5", "--seed", "1", "--size", "800x600"]);
    cmd.assert()
        .success()
        .stdout(contains(
            "Composed scene with 3 turbines, 10 solar panels, 3 buildings",
        ))
        .stdout(contains("Rendered 5 frame(s) at 800x600"))
        .stdout(contains("Last frame: 52 draw calls"))
        .stdout(contains(" - turbine 0 at (-8.0, -5.0) speed=0.0"))
        .stdout(contains(" - turbine 2 at (10.0, -8.0)"));
}

#[test]
fn same_seed_gives_same_speeds() {
    let run = || {
        let output = Command::cargo_bin("hero-scene")
            .expect("binary exists")
            .args(["--headless", "--frames", "0", "--seed", "42"])
            .output()
            .expect("run binary");
        assert!(output.status.success());
        String::from_utf8(output.stdout).expect("utf8 stdout")
    };
    let speeds = |stdout: String| {
        stdout
            .lines()
            .filter(|line| line.starts_with(" - turbine"))
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
    };
    let first = speeds(run());
    assert_eq!(first.len(), 3);
    assert_eq!(first, speeds(run()));
}

#[test]
fn zero_frames_renders_nothing() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.args(["--headless", "--frames", "0", "--seed", "3"]);
    cmd.assert()
        .success()
        .stdout(contains("Rendered 0 frame(s) at 1280x720"))
        .stdout(contains("angle=0.000"));
}

#[test]
fn unknown_argument_fails_with_usage() {
    let mut cmd = Command::cargo_bin("hero-scene").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"))
        .stderr(contains("Usage: hero-scene"));
}
