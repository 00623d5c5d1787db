//! 通过公开 API 驱动同步引擎，远程使用内存假实现

use std::fs;
use syncdeploy_lib::config::DEFAULT_STATE_NAME;
use syncdeploy_lib::core::{state, Entry, Inventory};
use syncdeploy_lib::storage::MockClient;
use syncdeploy_lib::{Phase, SyncConfig, SyncEngine, SyncError};

fn engine(root: &std::path::Path) -> SyncEngine {
    SyncEngine::new(SyncConfig {
        local_dir: root.to_path_buf(),
        max_concurrent_hashes: 1,
        ..Default::default()
    })
}

#[tokio::test]
async fn previous_state_drives_deletes_even_if_remote_changed() {
    let local = tempfile::tempdir().unwrap();
    fs::write(local.path().join("a.txt"), b"a").unwrap();

    // 上次状态里有 b.txt，但有人已经手动删掉了它
    let previous = Inventory::new(vec![
        Entry::file("a.txt", 1, blake3::hash(b"a").to_hex().to_string()),
        Entry::file("b.txt", 1, "deadbeef"),
    ]);
    let client = MockClient::new();
    client.put_file(DEFAULT_STATE_NAME, &state::encode(&previous).unwrap());
    client.put_file("a.txt", b"a");

    let mut session = client.clone();
    let report = engine(local.path()).run(&mut session).await.unwrap();

    assert_eq!(report.summary.files_to_delete, 1);
    assert_eq!(report.applied.files_deleted, 0);
    assert_eq!(report.applied.already_absent, 1);
    assert!(report.applied.state_written);
    assert_eq!(client.files(), vec![DEFAULT_STATE_NAME.to_string(), "a.txt".to_string()]);
}

#[tokio::test]
async fn failed_state_upload_is_reported_as_write_state() {
    let local = tempfile::tempdir().unwrap();
    fs::write(local.path().join("a.txt"), b"a").unwrap();

    let mut client = MockClient::new();
    client.fail_on("put", DEFAULT_STATE_NAME, "552 quota exceeded");

    let err = engine(local.path()).run(&mut client).await.unwrap_err();
    match err {
        SyncError::Transfer { phase, path, .. } => {
            assert_eq!(phase, Phase::WriteState);
            assert_eq!(path, DEFAULT_STATE_NAME);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.file("a.txt"), Some(b"a".to_vec()));
    assert!(client.file(DEFAULT_STATE_NAME).is_none());
}

#[tokio::test]
async fn unreadable_state_falls_back_to_full_upload() {
    let local = tempfile::tempdir().unwrap();
    fs::write(local.path().join("a.txt"), b"a").unwrap();

    let mut client = MockClient::new();
    client.put_file(DEFAULT_STATE_NAME, b"ignored");
    client.fail_on("get", DEFAULT_STATE_NAME, "425 can't open data connection");

    let report = engine(local.path()).run(&mut client).await.unwrap();
    assert!(report.bootstrap);
    assert_eq!(report.applied.files_uploaded, 1);
}
