// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// End-to-end CLI tests. These run the real binary against the in-process
// virtual device; no hardware required.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_caps_reports_mem2mem() {
    Command::cargo_bin("codecshim")
        .unwrap()
        .args(["--quiet", "caps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("codecshim"))
        .stdout(predicate::str::contains("Mem2mem      : yes"));
}

#[test]
fn test_caps_json_shape() {
    let output = Command::cargo_bin("codecshim")
        .unwrap()
        .args(["--quiet", "--json", "caps"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["driver"], "codecshim");
    assert_eq!(value["mem2mem"], true);
}

#[test]
fn test_run_completes_session() {
    let output = Command::cargo_bin("codecshim")
        .unwrap()
        .args(["--quiet", "--json", "run", "--frames", "8", "--payload", "512"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["frames"], 8);
    assert_eq!(value["bytes"], 8 * 512);
    assert_eq!(value["interrupted"], false);
    // The loopback codec announces its geometry on the first frame.
    assert_eq!(value["resolution_events"], 1);
}

#[test]
fn test_run_rejects_zero_frames() {
    Command::cargo_bin("codecshim")
        .unwrap()
        .args(["--quiet", "run", "--frames", "0"])
        .assert()
        .failure()
        .code(2);
}
