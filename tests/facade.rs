//! End-to-end behavior of the facade: config bootstrap, access lists and
//! relay lifecycle together.

mod common;

use std::sync::Arc;
use std::time::Duration;

use relay_manager::access::{AccessListStore, AccessMode, ListKind};
use relay_manager::supervisor::RelayState;
use relay_manager::{FacadeError, SupervisorFacade};
use tempfile::TempDir;

use common::*;

#[tokio::test]
async fn test_initialize_creates_default_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    let facade = SupervisorFacade::initialize(settings(LONG_RUNNING, &config_path), memory_store(), false)
        .await
        .unwrap();

    assert!(config_path.exists());
    let doc = facade.relay_config().unwrap();
    assert_eq!(doc.access_mode(), AccessMode::Open);
    assert!(doc.whitelist().is_empty());
    assert_eq!(facade.get_status().state, RelayState::Stopped);
}

#[tokio::test]
async fn test_initialize_reconciles_existing_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!("[authorization]\npubkey_whitelist = [\"{}\"]\n", pubkey('e')),
    )
    .unwrap();

    let store = memory_store();
    store
        .replace_list(
            ListKind::Whitelist,
            relay_manager::access::entry::validate_entries(&[pubkey('a').as_str().into()]).unwrap(),
        )
        .unwrap();

    let facade = SupervisorFacade::initialize(settings(LONG_RUNNING, &config_path), store, false)
        .await
        .unwrap();

    assert_eq!(facade.relay_config().unwrap().whitelist(), &[pubkey('a')]);
}

#[tokio::test]
async fn test_shutdown_without_start_is_ok() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(LONG_RUNNING, &dir.path().join("config.toml")),
        memory_store(),
        false,
    )
    .await
    .unwrap();

    facade.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(facade.get_status().state, RelayState::Stopped);
}

#[tokio::test]
async fn test_failed_auto_start_does_not_fail_initialize() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(EXITS_EARLY, &dir.path().join("config.toml")),
        memory_store(),
        true,
    )
    .await
    .unwrap();

    let status = facade.get_status();
    assert_eq!(status.state, RelayState::Crashed);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn test_auto_start_then_shutdown() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(LONG_RUNNING, &dir.path().join("config.toml")),
        memory_store(),
        true,
    )
    .await
    .unwrap();
    assert_eq!(facade.get_status().state, RelayState::Running);

    let err = facade.start_relay().await.unwrap_err();
    assert!(matches!(err, FacadeError::AlreadyRunning { .. }));

    facade.shutdown(Duration::from_secs(2)).await.unwrap();
    assert_eq!(facade.get_status().state, RelayState::Stopped);
}

#[tokio::test]
async fn test_whitelist_change_reloads_running_relay() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(HANDLES_HUP, &dir.path().join("config.toml")),
        memory_store(),
        true,
    )
    .await
    .unwrap();

    facade.set_whitelist(&[pubkey('b').as_str().into()]).unwrap();

    let status = facade
        .supervisor()
        .wait_for(|s| s.reloads_dispatched >= 1, Duration::from_secs(3))
        .await
        .unwrap();
    assert!(status.state.is_live());
    assert_eq!(facade.get_whitelist().unwrap()[0].pubkey, pubkey('b'));

    facade.shutdown(Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_partial_sync_surfaces_through_facade() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    let store = memory_store();
    let facade = SupervisorFacade::initialize(settings(LONG_RUNNING, &config_path), store.clone(), false)
        .await
        .unwrap();

    let saved = break_file(&config_path);
    let err = facade.set_blacklist(&[pubkey('d').as_str().into()]).unwrap_err();
    assert!(matches!(err, FacadeError::PartialSync { .. }));
    assert_eq!(store.snapshot().unwrap().pubkeys(ListKind::Blacklist), vec![pubkey('d')]);

    repair_file(&config_path, &saved);
    assert!(facade.reconcile().unwrap() > 0);
    assert_eq!(facade.relay_config().unwrap().blacklist(), &[pubkey('d')]);
}

#[tokio::test]
async fn test_update_relay_config_keeps_access_fields() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(LONG_RUNNING, &dir.path().join("config.toml")),
        memory_store(),
        false,
    )
    .await
    .unwrap();
    facade.set_whitelist(&[pubkey('a').as_str().into()]).unwrap();

    let doc = facade
        .update_relay_config(|doc| {
            doc.info.name = Some("renamed".to_string());
            doc.authorization.pubkey_whitelist = Some(vec![]);
        })
        .unwrap();

    assert_eq!(doc.info.name.as_deref(), Some("renamed"));
    assert_eq!(doc.whitelist(), &[pubkey('a')]);
    assert_eq!(facade.reconcile().unwrap(), 0);
}

#[tokio::test]
async fn test_stop_relay_with_largest_timeout_secs() {
    let dir = TempDir::new().unwrap();
    let facade = SupervisorFacade::initialize(
        settings(LONG_RUNNING, &dir.path().join("config.toml")),
        memory_store(),
        true,
    )
    .await
    .unwrap();

    let outcome = facade.stop_relay(u64::MAX).await.unwrap();
    assert!(!outcome.forced);
    assert_eq!(facade.get_status().state, RelayState::Stopped);
}

#[tokio::test]
async fn test_shutdown_with_huge_configured_timeout() {
    let dir = TempDir::new().unwrap();
    let mut s = settings(LONG_RUNNING, &dir.path().join("config.toml"));
    s.default_stop_timeout = Duration::from_secs(u64::MAX);
    let facade = SupervisorFacade::initialize(s, memory_store(), true).await.unwrap();

    facade.shutdown(facade.default_stop_timeout()).await.unwrap();
    assert_eq!(facade.get_status().state, RelayState::Stopped);
}
