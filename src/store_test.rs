use super::*;
use std::path::Path;
use std::sync::Arc;

use crate::session::{SessionGuard, Token};

fn scratch_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("plant-client-store-{}", Uuid::new_v4().simple()))
        .join("storage.json")
}

async fn cleanup(path: &Path) {
    if let Some(dir) = path.parent() {
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[tokio::test]
async fn memory_store_starts_empty() {
    let store = MemoryStore::new();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn memory_store_set_replaces_prior_value() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "first").await.unwrap();
    store.set(TOKEN_KEY, "second").await.unwrap();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("second"));
}

#[tokio::test]
async fn memory_store_delete_is_idempotent() {
    let store = MemoryStore::with_entry(TOKEN_KEY, "abc");
    store.delete(TOKEN_KEY).await.unwrap();
    store.delete(TOKEN_KEY).await.unwrap();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
}

// =============================================================================
// FileStore
// =============================================================================

#[tokio::test]
async fn file_store_missing_file_reads_as_empty() {
    let path = scratch_path();
    let store = FileStore::new(&path);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert!(!path.exists());
}

#[tokio::test]
async fn file_store_set_creates_parent_and_persists() {
    let path = scratch_path();
    let store = FileStore::new(&path);
    store.set(TOKEN_KEY, "a.b.c").await.unwrap();

    let reopened = FileStore::new(&path);
    assert_eq!(reopened.get(TOKEN_KEY).await.unwrap().as_deref(), Some("a.b.c"));

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["userToken"], "a.b.c");

    cleanup(&path).await;
}

#[tokio::test]
async fn file_store_keeps_other_keys() {
    let path = scratch_path();
    let store = FileStore::new(&path);
    store.set("theme", "dark").await.unwrap();
    store.set(TOKEN_KEY, "tok").await.unwrap();
    store.delete(TOKEN_KEY).await.unwrap();

    assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);

    cleanup(&path).await;
}

#[tokio::test]
async fn file_store_delete_without_file_succeeds() {
    let path = scratch_path();
    let store = FileStore::new(&path);
    store.delete(TOKEN_KEY).await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn file_store_leaves_no_temp_files() {
    let path = scratch_path();
    let store = FileStore::new(&path);
    store.set(TOKEN_KEY, "one").await.unwrap();
    store.set(TOKEN_KEY, "two").await.unwrap();

    let dir = path.parent().unwrap();
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert_eq!(names, vec!["storage.json".to_owned()]);

    cleanup(&path).await;
}

#[tokio::test]
async fn file_store_blank_file_reads_as_empty() {
    let path = scratch_path();
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(&path, "  \n").await.unwrap();

    let store = FileStore::new(&path);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);

    cleanup(&path).await;
}

async fn write_raw(path: &Path, contents: &str) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, contents).await.unwrap();
}

async fn read_json(path: &Path) -> serde_json::Value {
    let raw = tokio::fs::read_to_string(path).await.unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn file_store_unparsable_file_reads_as_empty() {
    let path = scratch_path();
    write_raw(&path, "not json").await;

    let store = FileStore::new(&path);
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);

    cleanup(&path).await;
}

#[tokio::test]
async fn file_store_delete_rewrites_unparsable_file() {
    let path = scratch_path();
    write_raw(&path, r#"{"userToken": 42}"#).await;

    let store = FileStore::new(&path);
    store.delete(TOKEN_KEY).await.unwrap();

    let json = read_json(&path).await;
    assert_eq!(json, serde_json::json!({}));

    cleanup(&path).await;
}

#[tokio::test]
async fn file_store_set_replaces_unparsable_file() {
    let path = scratch_path();
    write_raw(&path, "[1, 2").await;

    let store = FileStore::new(&path);
    store.set(TOKEN_KEY, "a.b.c").await.unwrap();

    assert_eq!(read_json(&path).await["userToken"], "a.b.c");

    cleanup(&path).await;
}

#[tokio::test]
async fn session_recovers_from_unparsable_file() {
    let path = scratch_path();
    write_raw(&path, r#"{"userToken": 42}"#).await;

    let guard = SessionGuard::new(Arc::new(FileStore::new(&path)));
    assert!(!guard.ensure_valid_or_clear().await.unwrap());
    guard.clear().await.unwrap();
    guard.store(&Token::new("a.b.c")).await.unwrap();
    assert_eq!(guard.get_token().await.unwrap(), Some(Token::new("a.b.c")));

    cleanup(&path).await;
}
