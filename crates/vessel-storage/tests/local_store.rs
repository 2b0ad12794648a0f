//! Integration tests for LocalStore

use std::sync::Arc;

use tempfile::TempDir;
use vessel_core::config::StoreSettings;
use vessel_storage::{ContainerStore, InMemoryStore, LocalStore, StorageError, open_store};

#[tokio::test]
async fn test_local_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path()).await.unwrap();

    store.put("movie.smsg", b"Local store test").await.unwrap();
    assert_eq!(store.get("movie.smsg").await.unwrap(), b"Local store test");
    assert!(store.exists("movie.smsg").await.unwrap());
}

#[tokio::test]
async fn test_local_persistence() {
    let temp = TempDir::new().unwrap();

    {
        let store = LocalStore::new(temp.path()).await.unwrap();
        store.put("kept", b"Persistent data").await.unwrap();
    }

    {
        let store = LocalStore::new(temp.path()).await.unwrap();
        assert_eq!(store.get("kept").await.unwrap(), b"Persistent data");
    }
}

#[tokio::test]
async fn test_local_list_skips_temp_files() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path()).await.unwrap();

    for name in ["c", "a", "b"] {
        store.put(name, name.as_bytes()).await.unwrap();
    }
    std::fs::write(temp.path().join("containers/.a.123.0.tmp"), b"partial").unwrap();

    assert_eq!(store.list().await.unwrap(), ["a", "b", "c"]);
}

#[tokio::test]
async fn test_local_not_found_and_delete() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path()).await.unwrap();

    assert!(matches!(store.get("missing").await, Err(StorageError::NotFound(_))));
    store.delete("missing").await.unwrap();

    store.put("gone", b"x").await.unwrap();
    store.delete("gone").await.unwrap();
    assert!(!store.exists("gone").await.unwrap());
}

#[tokio::test]
async fn test_local_rejects_escaping_names() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path()).await.unwrap();

    for name in ["../outside", "a/b", ".hidden", ""] {
        assert!(matches!(
            store.put(name, b"x").await,
            Err(StorageError::InvalidName(_))
        ));
    }
    assert!(!temp.path().join("outside").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_same_name_never_tear() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::new(temp.path()).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let data = vec![i; 64 * 1024];
            store.put("shared", &data).await.unwrap();
            let read = store.get("shared").await.unwrap();
            // Whatever writer won, the file is one writer's bytes in full
            assert_eq!(read.len(), 64 * 1024);
            assert!(read.iter().all(|b| *b == read[0]));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.list().await.unwrap(), ["shared"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_names() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(LocalStore::new(temp.path()).await.unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put(&format!("item-{i}"), &[i as u8; 100]).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.list().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_open_store_from_settings() {
    let temp = TempDir::new().unwrap();

    let memory = open_store(&StoreSettings::default()).await.unwrap();
    memory.put("m", b"1").await.unwrap();
    assert_eq!(memory.get("m").await.unwrap(), b"1");

    let local = open_store(&StoreSettings {
        backend: "local".into(),
        local_path: Some(temp.path().to_path_buf()),
    })
    .await
    .unwrap();
    local.put("l", b"2").await.unwrap();
    assert!(temp.path().join("containers/l").exists());

    let missing_path = open_store(&StoreSettings {
        backend: "local".into(),
        local_path: None,
    })
    .await;
    assert!(matches!(missing_path, Err(StorageError::Backend(_))));

    let unknown = open_store(&StoreSettings {
        backend: "s3".into(),
        local_path: None,
    })
    .await;
    assert!(matches!(unknown, Err(StorageError::Backend(_))));
}

#[tokio::test]
async fn test_boxed_store_is_a_store() {
    async fn roundtrip<S: ContainerStore>(store: S) {
        store.put("x", b"y").await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), b"y");
    }
    let boxed: Box<dyn ContainerStore> = Box::new(InMemoryStore::new());
    roundtrip(boxed).await;
}
