// End-to-end runs of the mnist-trainer binary on synthetic data.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn trainer() -> Command {
    let mut cmd = Command::cargo_bin("mnist-trainer").unwrap();
    for var in ["SM_MODEL_DIR", "SM_CHANNEL_TRAIN", "SM_CHANNEL_VALIDATION", "SM_OUTPUT_DATA_DIR", "SM_HPS"] {
        cmd.env_remove(var);
    }
    cmd
}

fn stage_synthetic(dir: &Path) {
    trainer()
        .args(["stage", "--source", "synthetic", "--samples", "100", "--prefix", "mnist"])
        .arg("--destination")
        .arg(dir.join("bucket"))
        .arg("--work-dir")
        .arg(dir.join("work"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"train_samples\": 80"));
}

fn tree_job(dir: &Path) -> Command {
    let root    = dir.join("bucket").join("mnist");
    let mut cmd = trainer();
    cmd.arg("train-tree")
        .arg("--model_dir")
        .arg(dir.join("model"))
        .arg("--train")
        .arg(root.join("train"))
        .arg("--validation")
        .arg(root.join("validation"));
    cmd
}

#[test]
fn stage_train_tree_and_inspect() {
    let dir = TempDir::new().unwrap();
    stage_synthetic(dir.path());

    let output = tree_job(dir.path())
        .args(["--max_depth", "3", "--eta", "0.3", "--num_round", "10"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("[9]\ttrain-mlogloss:"));
    let metric_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with("validation-accuracy: ")).collect();
    assert_eq!(metric_lines.len(), 1);
    let accuracy: f64 = metric_lines[0]["validation-accuracy: ".len()..].trim().parse().unwrap();
    assert!((0.0..=1.0).contains(&accuracy));

    let model_dir = dir.path().join("model");
    assert!(model_dir.join("model.json").is_file());
    assert!(!model_dir.join("model.json.gz").exists());

    trainer()
        .arg("inspect")
        .arg("--model-dir")
        .arg(&model_dir)
        .arg("--validation")
        .arg(dir.path().join("bucket").join("mnist").join("validation"))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"num_rounds\": 10")
                .and(predicate::str::contains("\"training_config\""))
                .and(predicate::str::contains("validation_accuracy")),
        );
}

#[test]
fn hyperparameters_come_from_sm_hps() {
    let dir = TempDir::new().unwrap();
    stage_synthetic(dir.path());

    tree_job(dir.path())
        .env("SM_HPS", r#"{"max_depth": "2", "eta": "0.5", "num_round": "3"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("[2]\ttrain-mlogloss:").and(predicate::str::contains("[3]\t").not()));
}

#[test]
fn zero_rounds_is_rejected_before_training() {
    let dir = TempDir::new().unwrap();
    stage_synthetic(dir.path());

    tree_job(dir.path())
        .args(["--num_round", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("validation-accuracy").not())
        .stderr(predicate::str::contains("num_round"));
    assert!(!dir.path().join("model").join("model.json").exists());
}

#[test]
fn inspect_empty_dir_reports_missing_artifact() {
    let dir = TempDir::new().unwrap();
    trainer()
        .arg("inspect")
        .arg("--model-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no model artifact"));
}

#[test]
fn ranges_lists_tree_parameters() {
    trainer()
        .args(["ranges", "--variant", "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_depth").and(predicate::str::contains("num_round")));
}
