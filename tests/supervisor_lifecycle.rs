//! Supervisor lifecycle against real child processes.

mod common;

use std::time::Duration;

use relay_manager::supervisor::{RelayState, ReloadOutcome, SupervisorError, SupervisorHandle};
use tempfile::TempDir;

use common::*;

#[tokio::test]
async fn test_start_then_graceful_stop() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(LONG_RUNNING, &dir.path().join("config.toml")));

    let pid = handle.start().await.unwrap();
    let status = handle.status();
    assert_eq!(status.state, RelayState::Running);
    assert_eq!(status.pid, Some(pid));
    assert!(status.uptime_secs.is_some());

    let outcome = handle.stop(Duration::from_secs(2)).await.unwrap();
    assert!(!outcome.forced);
    assert_eq!(outcome.exit.and_then(|e| e.signal), Some(15));

    let status = handle.status();
    assert_eq!(status.state, RelayState::Stopped);
    assert_eq!(status.pid, None);
    assert_eq!(status.forced_kills, 0);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(LONG_RUNNING, &dir.path().join("config.toml")));

    let pid = handle.start().await.unwrap();
    let err = handle.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning { state: RelayState::Running }));
    assert_eq!(handle.status().pid, Some(pid));

    handle.stop(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_to_kill_after_timeout() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(IGNORES_TERM, &dir.path().join("config.toml")));
    handle.start().await.unwrap();

    let timeout = Duration::from_millis(300);
    let outcome = handle.stop(timeout).await.unwrap();

    assert!(outcome.forced);
    assert!(outcome.elapsed >= timeout);
    assert_eq!(outcome.exit.and_then(|e| e.signal), Some(9));

    let status = handle.status();
    assert_eq!(status.state, RelayState::Stopped);
    assert_eq!(status.forced_kills, 1);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn test_stop_when_stopped_is_not_running() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(LONG_RUNNING, &dir.path().join("config.toml")));

    let err = handle.stop(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotRunning { state: RelayState::Stopped }));
}

#[tokio::test]
async fn test_exit_during_grace_is_a_launch_error() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(EXITS_EARLY, &dir.path().join("config.toml")));

    let err = handle.start().await.unwrap_err();
    match err {
        SupervisorError::Launch { exit, .. } => assert_eq!(exit.and_then(|e| e.code), Some(3)),
        other => panic!("expected launch error, got {other:?}"),
    }

    let status = handle.status();
    assert_eq!(status.state, RelayState::Crashed);
    assert_eq!(status.last_exit_code, Some(3));
    assert!(status.last_error.is_some());

    // Launch failures are not retried automatically.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.status().restart_attempts, 0);
}

#[tokio::test]
async fn test_missing_binary_is_a_launch_error() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(LONG_RUNNING, &dir.path().join("config.toml"));
    s.launch.binary = dir.path().join("no-such-relay");
    let handle = SupervisorHandle::spawn(s);

    let err = handle.start().await.unwrap_err();
    assert!(matches!(err, SupervisorError::Launch { exit: None, .. }));
    assert_eq!(handle.status().state, RelayState::Crashed);
}

#[tokio::test]
async fn test_crash_loop_gives_up_and_raises_alert() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(CRASHES_LATER, &dir.path().join("config.toml")));
    handle.start().await.unwrap();

    let status = handle
        .wait_for(|s| s.alert.is_some(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(status.state, RelayState::Crashed);
    assert_eq!(status.restart_attempts, 3);
    assert_eq!(status.last_exit_code, Some(7));

    // A manual start clears the alert and the attempt counter.
    handle.start().await.unwrap();
    let status = handle.status();
    assert_eq!(status.alert, None);
    assert_eq!(status.restart_attempts, 0);
    let _ = handle.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_stop_while_crashed_cancels_restart() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(CRASHES_LATER, &dir.path().join("config.toml"));
    s.restart.base_delay = Duration::from_secs(2);
    s.restart.max_delay = Duration::from_secs(2);
    let handle = SupervisorHandle::spawn(s);
    handle.start().await.unwrap();

    handle
        .wait_for(|s| s.state == RelayState::Crashed, Duration::from_secs(5))
        .await
        .unwrap();

    let err = handle.stop(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotRunning { state: RelayState::Crashed }));
    assert_eq!(handle.status().state, RelayState::Stopped);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let status = handle.status();
    assert_eq!(status.state, RelayState::Stopped);
    assert_eq!(status.pid, None);
}

#[tokio::test]
async fn test_reload_when_stopped_is_not_running() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(HANDLES_HUP, &dir.path().join("config.toml")));

    let err = handle.reload().await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotRunning { state: RelayState::Stopped }));
}

#[tokio::test]
async fn test_reloads_during_settle_coalesce_into_one() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(HANDLES_HUP, &dir.path().join("config.toml")));
    let pid = handle.start().await.unwrap();

    assert_eq!(handle.reload().await.unwrap(), ReloadOutcome::Dispatched);
    for _ in 0..3 {
        assert_eq!(handle.reload().await.unwrap(), ReloadOutcome::Coalesced);
    }

    let status = handle
        .wait_for(|s| s.state == RelayState::Running, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(status.reloads_dispatched, 2);
    assert_eq!(status.pid, Some(pid));

    handle.stop(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_reload_and_wait_returns_once_settled() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(HANDLES_HUP, &dir.path().join("config.toml")));
    handle.start().await.unwrap();

    handle.reload_and_wait(Duration::from_secs(5)).await.unwrap();
    let status = handle.status();
    assert_eq!(status.state, RelayState::Running);
    assert_eq!(status.reloads_dispatched, 1);

    handle.stop(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_status_does_not_wait_for_stop() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(IGNORES_TERM, &dir.path().join("config.toml")));
    handle.start().await.unwrap();

    let stopper = handle.clone();
    let stop = tokio::spawn(async move { stopper.stop(Duration::from_millis(500)).await });

    handle
        .wait_for(|s| s.state == RelayState::Stopping, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(handle.status().state, RelayState::Stopping);

    let outcome = stop.await.unwrap().unwrap();
    assert!(outcome.forced);
}

#[tokio::test]
async fn test_stop_accepts_maximum_timeout() {
    let dir = TempDir::new().unwrap();
    let handle = SupervisorHandle::spawn(settings(LONG_RUNNING, &dir.path().join("config.toml")));

    let err = handle.stop(Duration::MAX).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotRunning { state: RelayState::Stopped }));

    handle.start().await.unwrap();
    let outcome = handle.stop(Duration::MAX).await.unwrap();
    assert!(!outcome.forced);
    assert_eq!(handle.status().state, RelayState::Stopped);
}
