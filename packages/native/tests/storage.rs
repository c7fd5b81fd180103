use skiff_core::{ErrorKind, StorageProvider};
use skiff_native::FsStorage;

fn storage() -> (tempfile::TempDir, FsStorage) {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let storage = FsStorage::new(dir.path().join("storage")).expect("storage root should create");
    (dir, storage)
}

#[tokio::test]
async fn put_then_head_reports_the_object() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    storage
        .put_object("b", "k", &[72, 105], 2, Some("text/plain"))
        .await
        .expect("put should succeed");

    let info = storage.head_object("b", "k").await.expect("head should succeed");
    assert_eq!(info.key, "k");
    assert_eq!(info.size, 2);
    assert_eq!(info.content_type.as_deref(), Some("text/plain"));
    assert!(info.etag.is_some());
    assert!(info.last_modified.is_some());

    let bytes = storage.get_object("b", "k").await.expect("get should succeed");
    assert_eq!(bytes, [72, 105]);
}

#[tokio::test]
async fn size_mismatch_is_an_encoding_error() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    let err = storage
        .put_object("b", "k", &[1, 2, 3], 2, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
}

#[tokio::test]
async fn bucket_lifecycle() {
    let (_dir, storage) = storage();
    assert!(!storage.bucket_exists("b").await.unwrap());

    storage.create_bucket("b").await.expect("bucket should create");
    assert!(storage.bucket_exists("b").await.unwrap());

    storage.delete_bucket("b").await.expect("bucket should delete");
    assert!(!storage.bucket_exists("b").await.unwrap());
}

#[tokio::test]
async fn list_objects_filters_by_prefix_and_sorts() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    for key in ["logs/b.txt", "logs/a.txt", "data/c.bin"] {
        storage
            .put_object("b", key, b"x", 1, None)
            .await
            .expect("put should succeed");
    }

    let all = storage.list_objects("b", None).await.expect("list should succeed");
    let keys = all.iter().map(|info| info.key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, ["data/c.bin", "logs/a.txt", "logs/b.txt"]);

    let logs = storage
        .list_objects("b", Some("logs/"))
        .await
        .expect("list should succeed");
    let keys = logs.iter().map(|info| info.key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, ["logs/a.txt", "logs/b.txt"]);
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    for err in [
        storage.get_object("b", "missing").await.unwrap_err(),
        storage.head_object("b", "missing").await.unwrap_err(),
        storage.delete_object("b", "missing").await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let err = storage.get_object("nope", "k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_object_removes_it() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");
    storage
        .put_object("b", "k", b"data", 4, None)
        .await
        .expect("put should succeed");

    storage.delete_object("b", "k").await.expect("delete should succeed");
    let err = storage.head_object("b", "k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn traversal_keys_are_rejected() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    for key in ["../escape", "a/../../b", "/absolute", "a//b", ""] {
        let err = storage.put_object("b", key, b"x", 1, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding, "key {key:?} should be rejected");
    }
}

#[tokio::test]
async fn presigned_url_is_stably_unsupported() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    let first = storage.presigned_url("b", "k", 60).await.unwrap_err();
    let second = storage.presigned_url("b", "k", 60).await.unwrap_err();
    assert_eq!(first.kind(), ErrorKind::Unsupported);
    assert_eq!(first, second);
}

#[tokio::test]
async fn overwrite_updates_content_and_etag() {
    let (_dir, storage) = storage();
    storage.create_bucket("b").await.expect("bucket should create");

    storage
        .put_object("b", "k", b"one", 3, Some("text/plain"))
        .await
        .expect("first put should succeed");
    let first = storage.head_object("b", "k").await.unwrap();

    storage
        .put_object("b", "k", b"two!", 4, Some("text/plain"))
        .await
        .expect("second put should succeed");
    let second = storage.head_object("b", "k").await.unwrap();

    assert_eq!(second.size, 4);
    assert_ne!(first.etag, second.etag);
}
