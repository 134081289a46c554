//! POSIX backend tests against the real shadow-utils tools.
//!
//! These tests mutate the host's account database and therefore require
//! root and a throwaway machine or container.
//!
//! Run with:
//!   sudo -E cargo test --test posix_system -- --ignored

#![cfg(all(feature = "posix", unix))]

use usermux::{AccountEngine, AccountSpec, BackendKind, Config, Credential, StepKind, UsermuxError};

const TEST_USER: &str = "usermux-systest";

fn init_library() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(usermux::init);
}

async fn setup_engine(home_base: &std::path::Path) -> AccountEngine {
    init_library();

    let config = Config::new(BackendKind::Posix).with_home_base(home_base);
    let engine = AccountEngine::from_config(config).expect("failed to create posix backend");
    engine.probe().await.expect("shadow-utils not available");
    engine
}

#[tokio::test]
#[ignore] // Requires root; mutates the system account database
async fn test_posix_create_password_delete_roundtrip() {
    let home_base = tempfile::tempdir().unwrap();
    let mut engine = setup_engine(home_base.path()).await;

    let outcome = engine
        .create(
            AccountSpec::new(TEST_USER)
                .with_credential("initial-s3cr3t")
                .with_comment("usermux system test"),
        )
        .await;
    assert!(outcome.success, "create failed: {:?}", outcome.error);
    assert_eq!(
        outcome.applied,
        vec![
            StepKind::EnsurePresent,
            StepKind::CreateHome,
            StepKind::SetCredential
        ]
    );

    let listing = engine.list(Some(TEST_USER)).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].username, TEST_USER);
    assert_eq!(
        listing[0].home_dir.as_deref(),
        Some(home_base.path().join(TEST_USER).as_path())
    );
    assert!(home_base.path().join(TEST_USER).is_dir());

    let outcome = engine
        .set_password(TEST_USER, Credential::new("rotated-s3cr3t"))
        .await;
    assert!(outcome.success, "set_password failed: {:?}", outcome.error);

    let outcome = engine.delete(TEST_USER, true).await;
    assert!(outcome.success, "delete failed: {:?}", outcome.error);
    assert!(engine.list(Some(TEST_USER)).await.unwrap().is_empty());
    assert!(!home_base.path().join(TEST_USER).exists());
}

#[tokio::test]
#[ignore] // Requires root; mutates the system account database
async fn test_posix_duplicate_create_rejected() {
    let home_base = tempfile::tempdir().unwrap();
    let mut engine = setup_engine(home_base.path()).await;

    let first = engine.create(AccountSpec::new(TEST_USER)).await;
    assert!(first.success, "create failed: {:?}", first.error);

    let second = engine.create(AccountSpec::new(TEST_USER)).await;
    assert!(!second.success);
    assert!(matches!(second.error, Some(UsermuxError::AlreadyExists(_))));

    let cleanup = engine.delete(TEST_USER, true).await;
    assert!(cleanup.success, "cleanup failed: {:?}", cleanup.error);
}

#[tokio::test]
#[ignore] // Requires root; mutates the system account database
async fn test_posix_failed_home_creation_rolls_back_entry() {
    let home_base = tempfile::tempdir().unwrap();
    let mut engine = setup_engine(home_base.path()).await;

    // Occupy the home path so the CreateHome step must fail after the
    // entry was created.
    let home = home_base.path().join(TEST_USER);
    tokio::fs::create_dir_all(&home).await.unwrap();

    let outcome = engine
        .create(AccountSpec::new(TEST_USER).with_credential("pw"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failed_step, Some(StepKind::CreateHome));
    assert!(matches!(outcome.error, Some(UsermuxError::PathConflict(_))));
    // The compensation removed the entry again.
    assert!(engine.list(Some(TEST_USER)).await.unwrap().is_empty());
}
