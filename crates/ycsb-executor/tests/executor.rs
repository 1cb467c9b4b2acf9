#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loadtest_ramp::{GeometricRamp, RampController};
use tempfile::TempDir;
use ycsb_executor::{Phase, YcsbError, YcsbExecutor, YcsbInvocation, YcsbLoadRunner};

/// Writes a stand-in `ycsb` launcher that appends its arguments and the
/// credentials variable to `calls.log` and prints YCSB-style measurements.
fn fake_ycsb(dir: &Path, exit_code: i32) -> PathBuf {
    let log = dir.join("calls.log");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$GOOGLE_APPLICATION_CREDENTIALS $*\" >> {log}\n\
         echo 'Starting test.'\n\
         echo '[OVERALL], RunTime(ms), 1200'\n\
         echo '[OVERALL], Throughput(ops/sec), 125.5'\n\
         echo 'fake ycsb failure' >&2\n\
         exit {exit_code}\n",
        log = log.display(),
    );
    let path = dir.join("ycsb");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_execute_parses_measurements() {
    let dir = TempDir::new().unwrap();
    let executor = YcsbExecutor::new(fake_ycsb(dir.path(), 0), "workloads/workloada")
        .with_credentials_file(Path::new("/keys/sa.json"))
        .property("googledatastore.projectId", "proj");

    let output = executor
        .execute(&YcsbInvocation::new(Phase::Run, 4).target(100))
        .await
        .unwrap();

    assert_eq!(output.throughput(), Some(125.5));
    assert_eq!(output.runtime_ms(), Some(1200.0));
    assert!(output.stderr.contains("fake ycsb failure"));

    let calls = calls(dir.path());
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("/keys/sa.json run googledatastore -P workloads/workloada"));
    assert!(calls[0].contains("-p googledatastore.projectId=proj"));
    assert!(calls[0].ends_with("-threads 4 -target 100 -s"));
}

#[tokio::test]
async fn test_execute_reports_failure() {
    let dir = TempDir::new().unwrap();
    let executor = YcsbExecutor::new(fake_ycsb(dir.path(), 3), "w");

    let err = executor
        .execute(&YcsbInvocation::new(Phase::Load, 1))
        .await
        .unwrap_err();
    match err {
        YcsbError::Exited { phase, stderr, .. } => {
            assert_eq!(phase, Phase::Load);
            assert_eq!(stderr, "fake ycsb failure");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_execute_missing_binary() {
    let dir = TempDir::new().unwrap();
    let executor = YcsbExecutor::new(dir.path().join("does-not-exist"), "w");

    let err = executor
        .execute(&YcsbInvocation::new(Phase::Load, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, YcsbError::Spawn { .. }));
}

#[tokio::test]
async fn test_load_ramp_runs_every_client_per_stage() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(YcsbExecutor::new(fake_ycsb(dir.path(), 0), "w"));
    let runner = YcsbLoadRunner::new(executor, 2, 1000);
    let controller = RampController::new(
        Box::new(GeometricRamp::default()),
        32,
        Duration::from_secs(300),
    );

    let report = controller.ramp_up(1000, 2, &runner).await.unwrap();

    // Stages: 250 and 375 per client (limited), then 500 per client.
    assert_eq!(report.stages.len(), 3);
    let (_, outcome) = report.final_stage().unwrap();
    assert_eq!(outcome.throughput_ops_sec, Some(251.0));

    let calls = calls(dir.path());
    assert_eq!(calls.len(), 6);
    let limited = calls
        .iter()
        .filter(|c| c.contains("maxexecutiontime=300"))
        .count();
    assert_eq!(limited, 4);
    assert_eq!(
        calls
            .iter()
            .filter(|c| c.contains("insertstart=500") && c.contains("insertcount=500"))
            .count(),
        3
    );
}
