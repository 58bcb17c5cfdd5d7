use assert_cmd::cargo::cargo_bin_cmd;
use dartfuse::core::{CalibrationSource, Homography};
use dartfuse::{AxisQuality, BaselineResult, CameraDetection, ThrowInput};
use nalgebra::{Point2, Vector2};
use predicates::str::contains;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

/// pixel (u, v) -> board ((u - 500) / 400, (400 - v) / 400)
fn calibration() -> CalibrationSource {
    CalibrationSource::Homography {
        h: Homography::from_array([
            [1.0 / 400.0, 0.0, -500.0 / 400.0],
            [0.0, -1.0 / 400.0, 1.0],
            [0.0, 0.0, 1.0],
        ]),
        points: Vec::new(),
    }
}

fn detection(tip: Point2<f64>, dir: Vector2<f64>) -> CameraDetection {
    CameraDetection {
        tip: Some(Point2::new(500.0 + 400.0 * tip.x, 400.0 - 400.0 * tip.y)),
        axis: Some(Vector2::new(dir.x, -dir.y)),
        inlier_ratio: 0.8,
        barrel_pixel_count: 150,
        barrel_aspect_ratio: 6.0,
        mask_quality: 0.7,
    }
}

/// A throw recorded as a miss whose two axes cross on double 20.
fn missed_throw() -> ThrowInput {
    let ix = Point2::new(0.0, 0.95);
    let da = Vector2::new(88f64.to_radians().cos(), 88f64.to_radians().sin());
    let db = Vector2::new(92f64.to_radians().cos(), 92f64.to_radians().sin());
    let mut baseline = BaselineResult::from_coords(Point2::new(0.0, 1.2), "tri");
    baseline.segment = 0;
    baseline.multiplier = 0;
    baseline.score = 0;

    let mut detections = BTreeMap::new();
    detections.insert("cam0".to_string(), detection(ix + da * 0.015, da));
    detections.insert("cam1".to_string(), detection(ix + db * 0.015, db));
    let mut axis_quality = BTreeMap::new();
    for (id, quality, inliers) in [("cam0", 0.55, 35), ("cam1", 0.45, 10)] {
        axis_quality.insert(
            id.to_string(),
            AxisQuality {
                quality,
                inlier_count: inliers,
                axis_length_px: 40.0,
                valid: true,
            },
        );
    }
    ThrowInput {
        baseline,
        detections,
        axis_quality,
    }
}

fn write_replay(dir: &Path, flags: Value) -> std::path::PathBuf {
    let replay = json!({
        "flags": flags,
        "calibrations": { "cam0": calibration(), "cam1": calibration() },
        "throws": [missed_throw()],
    });
    let path = dir.join("replay.json");
    std::fs::write(&path, serde_json::to_string_pretty(&replay).unwrap()).unwrap();
    path
}

#[test]
fn replay_keeps_baseline_by_default() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({}));
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("throw 0: miss (0) [tri] kept"));
}

#[test]
fn replay_flag_enables_soft_accept() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({}));
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .args(["--flag", "UseSoftAcceptPrevention=1"])
        .assert()
        .success()
        .stdout(contains(
            "throw 0: miss (0) [tri] -> D20 (40) [SoftAccept_RelaxedTriangulation]",
        ))
        .stdout(contains("sap: accepted"));
}

#[test]
fn command_line_flags_override_file_flags() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({ "UseSoftAcceptPrevention": 1 }));
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .args(["-f", "UseSoftAcceptPrevention=0"])
        .assert()
        .success()
        .stdout(contains("kept"));
}

#[test]
fn json_output_carries_decision() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({ "UseSoftAcceptPrevention": 1 }));
    let output = cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .arg("--json")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout must be JSON");
    assert_eq!(value[0]["index"], 0);
    assert_eq!(value[0]["result"]["score"], 40);
    assert_eq!(value[0]["decision"]["soft_accept"]["applied"], true);
}

#[test]
fn unknown_flag_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({}));
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .args(["--flag", "HHS_Bogus=1"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("unknown flag `HHS_Bogus`"));
}

#[test]
fn malformed_flag_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_replay(dir.path(), json!({}));
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(&path)
        .args(["--flag", "UseHHS"])
        .assert()
        .failure()
        .stderr(contains("malformed flag `UseHHS`"));
}

#[test]
fn missing_replay_file_fails() {
    let dir = TempDir::new().unwrap();
    cargo_bin_cmd!("dartfuse")
        .arg("replay")
        .arg(dir.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(contains("failed to read"));
}

#[test]
fn flags_lists_names() {
    cargo_bin_cmd!("dartfuse")
        .arg("flags")
        .assert()
        .success()
        .stdout(contains("UseHHS"))
        .stdout(contains("SAP_EnableBoardContainmentGate"));
}
