use std::path::PathBuf;

use uuid::Uuid;

use super::{SpotStore, StoreError};
use crate::domain::{EncodedImage, Position, Spot};

fn unique_workspace() -> PathBuf {
    let root = std::env::temp_dir().join(format!("spots-store-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("workspace should be creatable");
    root
}

fn spot(id: &str, created_at: i64) -> Spot {
    let mut spot = Spot::new(id, Position::new(48.85, 2.35), created_at);
    spot.images = vec![EncodedImage::new("data:image/jpeg;base64,QQ==")];
    spot
}

#[tokio::test]
async fn put_then_get_all_round_trips() {
    let root = unique_workspace();
    let store = SpotStore::open_or_create(root.join("db/spots.sqlite"))
        .await
        .expect("store should open");

    let original = spot("S-1", 100);
    store.put(original.clone()).await.expect("put should work");

    let all = store.get_all().await;
    assert_eq!(all, vec![original]);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn open_is_idempotent_and_keeps_records() {
    let root = unique_workspace();
    let path = root.join("spots.sqlite");
    let first = SpotStore::open_or_create(&path).await.expect("first open");
    first.put(spot("S-1", 1)).await.expect("put");
    drop(first);

    let second = SpotStore::open_or_create(&path).await.expect("second open");
    assert_eq!(second.count().await.expect("count"), 1);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn remove_is_silent_for_missing_ids() {
    let root = unique_workspace();
    let store = SpotStore::open_or_create(root.join("spots.sqlite"))
        .await
        .expect("store should open");
    store.put(spot("S-1", 1)).await.expect("put");

    assert!(store.remove("S-1").await.expect("remove existing"));
    assert!(!store.remove("S-1").await.expect("remove missing"));
    assert!(store.get("S-1").await.expect("get").is_none());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn open_fails_with_unavailable_when_path_is_blocked() {
    let root = unique_workspace();
    let blocker = root.join("not-a-dir");
    std::fs::write(&blocker, "file").expect("blocker should be writable");

    let result = SpotStore::open_or_create(blocker.join("spots.sqlite")).await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn get_all_skips_corrupt_rows() {
    let root = unique_workspace();
    let path = root.join("spots.sqlite");
    let store = SpotStore::open_or_create(&path).await.expect("store");
    store.put(spot("S-good", 1)).await.expect("put");

    let conn = crate::db::open_connection(path.to_str().expect("utf8 path")).expect("raw conn");
    conn.execute(
        "INSERT INTO spots (id, lat, lng, images_json, created_at) VALUES ('S-bad', 0, 0, '{', 2)",
        [],
    )
    .expect("raw insert");
    drop(conn);

    let ids = store
        .get_all()
        .await
        .into_iter()
        .map(|spot| spot.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["S-good".to_string()]);
    assert!(matches!(
        store.get("S-bad").await,
        Err(StoreError::Corrupt { .. })
    ));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn meta_round_trips() {
    let root = unique_workspace();
    let store = SpotStore::open_or_create(root.join("spots.sqlite"))
        .await
        .expect("store");
    store.set_meta("legacy_import_count", "3").await.expect("set");
    assert_eq!(
        store.meta("legacy_import_count").await.expect("get").as_deref(),
        Some("3")
    );

    let _ = std::fs::remove_dir_all(root);
}
