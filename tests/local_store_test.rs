use std::io;

use bytes::Bytes;
use futures::stream;

use wortschatz::application::ports::{MediaStore, MediaStoreError};
use wortschatz::domain::StoragePath;
use wortschatz::infrastructure::storage::LocalMediaStore;

fn create_test_store() -> (tempfile::TempDir, LocalMediaStore) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = LocalMediaStore::new(dir.path().to_path_buf()).unwrap();
    (dir, store)
}

#[tokio::test]
async fn given_valid_stream_when_storing_then_file_is_persisted() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("uploads", "lesson.wav");

    let chunks = vec![Ok(Bytes::from("audio ")), Ok(Bytes::from("bytes"))];
    let byte_stream = Box::pin(stream::iter(chunks));

    let size = store.store(&path, byte_stream, None).await.unwrap();
    assert_eq!(size, 11);
}

#[tokio::test]
async fn given_stored_file_when_fetching_then_bytes_match_original() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("audios", "lesson.wav");

    let content = b"test content";
    let byte_stream = Box::pin(stream::iter(vec![Ok(Bytes::from(&content[..]))]));
    store.store(&path, byte_stream, None).await.unwrap();

    let fetched = store.fetch(&path).await.unwrap();
    assert_eq!(fetched, content);
}

#[tokio::test]
async fn given_stored_file_when_renaming_then_old_path_is_gone() {
    let (dir, store) = create_test_store();
    let from = StoragePath::join("uploads", "lesson.wav");
    let to = StoragePath::join("audios", "lesson.wav");

    let byte_stream = Box::pin(stream::iter(vec![Ok(Bytes::from("data"))]));
    store.store(&from, byte_stream, None).await.unwrap();

    store.rename(&from, &to).await.unwrap();

    assert!(dir.path().join("audios/lesson.wav").is_file());
    assert!(!dir.path().join("uploads/lesson.wav").exists());
    assert_eq!(store.head(&to).await.unwrap(), 4);
}

#[tokio::test]
async fn given_missing_source_when_renaming_then_returns_not_found() {
    let (_dir, store) = create_test_store();
    let from = StoragePath::join("uploads", "ghost.wav");
    let to = StoragePath::join("audios", "ghost.wav");

    let result = store.rename(&from, &to).await;
    assert!(matches!(result, Err(MediaStoreError::NotFound(_))));
}

#[tokio::test]
async fn given_stored_file_when_deleting_then_fetch_returns_not_found() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("audios", "lesson.wav");

    let byte_stream = Box::pin(stream::iter(vec![Ok(Bytes::from("data"))]));
    store.store(&path, byte_stream, None).await.unwrap();

    store.delete(&path).await.unwrap();

    let result = store.fetch(&path).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn given_stream_error_when_storing_then_returns_error() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("uploads", "lesson.wav");

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from("partial")),
        Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "network drop",
        )),
    ];
    let byte_stream = Box::pin(stream::iter(chunks));

    let result = store.store(&path, byte_stream, None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn given_stored_file_when_head_then_returns_size() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("audios", "lesson.wav");

    let content = b"hello world";
    let byte_stream = Box::pin(stream::iter(vec![Ok(Bytes::from(&content[..]))]));
    store.store(&path, byte_stream, None).await.unwrap();

    let size = store.head(&path).await.unwrap();
    assert_eq!(size, 11);
}

#[tokio::test]
async fn given_nonexistent_path_when_head_then_returns_error() {
    let (_dir, store) = create_test_store();
    let path = StoragePath::join("audios", "nonexistent.wav");

    let result = store.head(&path).await;
    assert!(matches!(result, Err(MediaStoreError::NotFound(_))));
}
