use std::path::PathBuf;

use uuid::Uuid;

use super::{LegacyMigrator, LegacySlot, MigrationStatus, META_IMPORT_COUNT, META_IMPORT_SHA256};
use crate::domain::{Position, Spot};
use crate::store::SpotStore;

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("spots-legacy-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("workspace should be creatable");
    root
}

async fn fixture(raw_snapshot: Option<&str>) -> (PathBuf, SpotStore, LegacySlot) {
    let root = unique_workspace();
    let store = SpotStore::open_or_create(root.join("spots.sqlite"))
        .await
        .expect("store should open");
    let slot = LegacySlot::new(root.join("legacy/spots.json"));
    if let Some(raw) = raw_snapshot {
        std::fs::create_dir_all(root.join("legacy")).expect("legacy dir");
        std::fs::write(slot.path(), raw).expect("snapshot should be writable");
    }
    (root, store, slot)
}

#[tokio::test]
async fn migrates_snapshot_into_empty_store_and_deletes_it() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"x","lat":1,"lng":2,"title":"A","images":[],"coverIndex":0,"createdAt":100}]"#,
    ))
    .await;

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.imported_count, 1);
    assert!(summary.snapshot_deleted);

    let mut expected = Spot::new("x", Position::new(1.0, 2.0), 100);
    expected.title = "A".to_string();
    expected.description = String::new();
    assert_eq!(store.get_all().await, vec![expected]);
    assert!(!slot.path().exists());
    assert_eq!(
        store.meta(META_IMPORT_COUNT).await.expect("meta").as_deref(),
        Some("1")
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn malformed_snapshot_aborts_and_is_left_untouched() {
    let raw = r#"[{"id":"x","lat":"north"}]"#;
    let (root, store, slot) = fixture(Some(raw)).await;

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Failed);
    assert!(summary.last_error.is_some());
    assert_eq!(store.count().await.expect("count"), 0);
    assert_eq!(
        std::fs::read_to_string(slot.path()).expect("snapshot should remain"),
        raw
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn skips_when_store_already_has_records() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"legacy","lat":1,"lng":2,"createdAt":5}]"#,
    ))
    .await;
    store
        .put(Spot::new("S-existing", Position::new(0.0, 0.0), 1))
        .await
        .expect("seed");

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::StoreNotEmpty);
    assert!(slot.path().exists());
    assert!(store.get("legacy").await.expect("get").is_none());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn missing_snapshot_is_a_no_op() {
    let (root, store, slot) = fixture(None).await;
    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::NoSnapshot);
    assert_eq!(store.count().await.expect("count"), 0);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn empty_array_snapshot_completes_and_is_removed() {
    let (root, store, slot) = fixture(Some("[]")).await;
    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.imported_count, 0);
    assert!(!slot.path().exists());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn reimport_of_same_snapshot_does_not_resurrect_deleted_spots() {
    let raw = r#"[{"id":"x","lat":1,"lng":2,"createdAt":100}]"#;
    let (root, store, slot) = fixture(Some(raw)).await;
    LegacyMigrator::new(&store, &slot).run().await;
    store.remove("x").await.expect("remove");

    std::fs::write(slot.path(), raw).expect("snapshot restored");
    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::AlreadyImported);
    assert_eq!(store.count().await.expect("count"), 0);
    assert!(!slot.path().exists());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn records_with_blank_ids_are_counted_as_errors() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"","lat":1,"lng":2,"createdAt":1},{"id":"ok","lat":3,"lng":4,"createdAt":2}]"#,
    ))
    .await;

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Partial);
    assert_eq!(summary.imported_count, 1);
    assert_eq!(summary.error_count, 1);
    assert!(slot.path().exists());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn stale_cover_index_is_normalized_on_import() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"c","lat":1,"lng":2,"images":["data:image/png;base64,AA"],"coverIndex":7,"createdAt":1}]"#,
    ))
    .await;

    LegacyMigrator::new(&store, &slot).run().await;
    let spot = store.get("c").await.expect("get").expect("spot");
    assert_eq!(spot.cover_index, 0);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn duplicate_ids_count_once() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"x","lat":1,"lng":2,"title":"first","createdAt":1},{"id":"x","lat":3,"lng":4,"title":"second","createdAt":2},{"id":"y","lat":5,"lng":6,"createdAt":3}]"#,
    ))
    .await;

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.processed_count, 3);
    assert_eq!(summary.imported_count, 2);
    assert_eq!(summary.duplicate_count, 1);
    assert_eq!(store.count().await.expect("count"), 2);
    assert_eq!(
        store.meta(META_IMPORT_COUNT).await.expect("meta").as_deref(),
        Some("2")
    );

    let stored = store.get("x").await.expect("get").expect("row");
    assert_eq!(stored.title, "second");

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn bookkeeping_failure_still_completes_and_deletes_snapshot() {
    let (root, store, slot) = fixture(Some(
        r#"[{"id":"x","lat":1,"lng":2,"createdAt":1}]"#,
    ))
    .await;
    let blocker =
        rusqlite::Connection::open(root.join("spots.sqlite")).expect("second connection");
    blocker
        .execute_batch(
            "CREATE TRIGGER meta_frozen BEFORE INSERT ON meta
             BEGIN SELECT RAISE(ABORT, 'meta is frozen'); END;",
        )
        .expect("trigger should be created");
    drop(blocker);

    let summary = LegacyMigrator::new(&store, &slot).run().await;
    assert_eq!(summary.status, MigrationStatus::Completed);
    assert_eq!(summary.imported_count, 1);
    assert!(summary.snapshot_deleted);
    assert!(!slot.path().exists());
    assert_eq!(store.count().await.expect("count"), 1);
    assert!(store
        .meta(META_IMPORT_SHA256)
        .await
        .expect("meta read")
        .is_none());

    let _ = std::fs::remove_dir_all(root);
}
