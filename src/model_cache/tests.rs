use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::artifact::{ArtifactStore, LocalArtifactStore, MemoryArtifactStore};
use crate::embedding::EncoderConfig;

const PREFIX: &str = "models/answer-scoring-model";

fn seeded_store() -> Arc<MemoryArtifactStore> {
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert(format!("{PREFIX}/"), Vec::new());
    store.insert(format!("{PREFIX}/config.json"), b"{}".to_vec());
    store.insert(format!("{PREFIX}/tokenizer.json"), b"{}".to_vec());
    store.insert(format!("{PREFIX}/model.safetensors"), vec![7u8; 64]);
    store.insert(
        format!("{PREFIX}/1_Pooling/config.json"),
        br#"{"pooling_mode_mean_tokens": true}"#.to_vec(),
    );
    store
}

fn stub_cache(store: Arc<MemoryArtifactStore>, tmp: &TempDir) -> ModelCache {
    let config = ModelCacheConfig::stub(PREFIX, tmp.path().join("model"));
    ModelCache::new(config, store)
}

fn leftover_entries(tmp: &TempDir) -> Vec<String> {
    std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}

#[tokio::test]
async fn test_ensure_ready_materializes_bundle() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    let cache = stub_cache(store.clone(), &tmp);
    assert_eq!(cache.status(), ModelStatus::Cold);
    assert!(cache.get().is_none());

    let encoder = cache.ensure_ready().await.unwrap();
    assert!(encoder.is_stub());
    assert_eq!(cache.status(), ModelStatus::Ready);

    let target = tmp.path().join("model");
    assert!(target.join("config.json").is_file());
    assert!(target.join("tokenizer.json").is_file());
    assert!(target.join("model.safetensors").is_file());
    assert!(target.join("1_Pooling/config.json").is_file());

    let manifest = cache.manifest().unwrap();
    assert_eq!(manifest.files.len(), 4);
    assert_eq!(manifest.total_bytes, 2 + 2 + 64 + 34);
    assert_eq!(manifest.digest.len(), 64);
    // Directory marker is skipped.
    assert_eq!(store.download_calls(), 4);
}

#[tokio::test]
async fn test_ensure_ready_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    let cache = stub_cache(store.clone(), &tmp);

    let first = cache.ensure_ready().await.unwrap();
    let second = cache.ensure_ready().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.materialization_count(), 1);
    assert_eq!(store.list_calls(), 1);
    assert_eq!(store.download_calls(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_start_single_flight() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.set_latency(Duration::from_millis(20));
    let cache = stub_cache(store.clone(), &tmp);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.ensure_ready().await }));
    }

    let mut encoders = Vec::new();
    for handle in handles {
        encoders.push(handle.await.unwrap().unwrap());
    }

    assert!(encoders.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.materialization_count(), 1);
    assert_eq!(store.list_calls(), 1);
    assert_eq!(store.download_calls(), 4);
}

#[tokio::test]
async fn test_empty_prefix_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert("models/other-model/config.json", b"{}".to_vec());
    let cache = stub_cache(store, &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(err, ModelCacheError::EmptyPrefix { .. }));
    assert_eq!(cache.status(), ModelStatus::Cold);
}

#[tokio::test]
async fn test_sibling_prefix_is_not_part_of_bundle() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert(format!("{PREFIX}-v2/config.json"), b"{}".to_vec());
    let cache = stub_cache(store, &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(err, ModelCacheError::EmptyPrefix { .. }));
}

#[tokio::test]
async fn test_missing_tokenizer_leaves_no_partial_bundle() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.remove(&format!("{PREFIX}/tokenizer.json"));
    let cache = stub_cache(store.clone(), &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(
        err,
        ModelCacheError::MissingFile {
            family: "tokenizer"
        }
    ));
    assert!(!tmp.path().join("model").exists());
    assert!(leftover_entries(&tmp).is_empty());
    assert_eq!(store.download_calls(), 0);
}

#[tokio::test]
async fn test_missing_weights_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.remove(&format!("{PREFIX}/model.safetensors"));
    let cache = stub_cache(store, &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(
        err,
        ModelCacheError::MissingFile { family: "weights" }
    ));
}

#[tokio::test]
async fn test_pytorch_weights_are_accepted() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.remove(&format!("{PREFIX}/model.safetensors"));
    store.insert(format!("{PREFIX}/pytorch_model.bin"), vec![1u8; 8]);
    let cache = stub_cache(store, &tmp);

    cache.ensure_ready().await.unwrap();
    assert!(tmp.path().join("model/pytorch_model.bin").is_file());
}

#[tokio::test]
async fn test_failed_download_cleans_staging_and_retries() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.fail_downloads_of(format!("{PREFIX}/model.safetensors"));
    let cache = stub_cache(store.clone(), &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(err, ModelCacheError::Store(_)));
    assert!(leftover_entries(&tmp).is_empty());
    assert_eq!(cache.status(), ModelStatus::Cold);

    store.clear_failures();
    cache.ensure_ready().await.unwrap();
    assert_eq!(cache.materialization_count(), 2);
    assert_eq!(cache.status(), ModelStatus::Ready);
    assert_eq!(leftover_entries(&tmp), vec!["model".to_string()]);
}

#[tokio::test]
async fn test_stale_target_is_replaced() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("stale.bin"), b"old").unwrap();

    let cache = stub_cache(seeded_store(), &tmp);
    cache.ensure_ready().await.unwrap();

    assert!(!target.join("stale.bin").exists());
    assert!(target.join("config.json").is_file());
}

#[tokio::test]
async fn test_traversal_object_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.insert(format!("{PREFIX}/../escape.txt"), b"x".to_vec());
    let cache = stub_cache(store, &tmp);

    let err = cache.ensure_ready().await.unwrap_err();
    assert!(matches!(err, ModelCacheError::CorruptBundle { .. }));
    assert!(!tmp.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_fallback_bundle_used_when_store_is_empty() {
    let tmp = TempDir::new().unwrap();
    let fallback = tmp.path().join("fallback");
    std::fs::create_dir_all(&fallback).unwrap();

    let mut config = ModelCacheConfig::stub(PREFIX, tmp.path().join("model"));
    config.fallback_dir = Some(fallback.clone());
    let cache = ModelCache::new(config, Arc::new(MemoryArtifactStore::new()));

    let encoder = cache.ensure_ready().await.unwrap();
    assert_eq!(encoder.source(), fallback.as_path());
    assert!(cache.manifest().is_none());
}

#[tokio::test]
async fn test_fallback_tried_when_materialized_bundle_fails_to_load() {
    let tmp = TempDir::new().unwrap();
    let fallback = tmp.path().join("fallback");
    std::fs::create_dir_all(&fallback).unwrap();

    // Real mode: the seeded `{}` config.json materializes but is not a BERT config.
    let config = ModelCacheConfig {
        bundle_prefix: PREFIX.to_string(),
        local_dir: tmp.path().join("model"),
        fallback_dir: Some(fallback.clone()),
        encoder: EncoderConfig::default(),
    };
    let cache = ModelCache::new(config, seeded_store());

    let err = cache.ensure_ready().await.unwrap_err();
    let ModelCacheError::Load(message) = &err else {
        panic!("expected a load error, got {err:?}");
    };
    assert!(
        message.contains(&fallback.display().to_string()),
        "fallback was not attempted: {message}"
    );
    assert!(tmp.path().join("model/config.json").is_file());
    assert_eq!(cache.materialization_count(), 1);
    assert!(cache.manifest().is_none());
    assert_eq!(cache.status(), ModelStatus::Cold);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_aborted_caller_does_not_cancel_materialization() {
    let tmp = TempDir::new().unwrap();
    let store = seeded_store();
    store.set_latency(Duration::from_millis(50));
    let cache = stub_cache(store.clone(), &tmp);

    let caller = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.ensure_ready().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    cache.ensure_ready().await.unwrap();
    assert_eq!(cache.materialization_count(), 1);
    assert_eq!(store.download_calls(), 4);
    assert_eq!(leftover_entries(&tmp), vec!["model".to_string()]);
}

#[tokio::test]
async fn test_second_process_reuses_identical_target() {
    let tmp = TempDir::new().unwrap();
    let first = stub_cache(seeded_store(), &tmp);
    let second = stub_cache(seeded_store(), &tmp);

    first.ensure_ready().await.unwrap();
    // Survives only if the promoted directory is left in place.
    let marker = tmp.path().join("model/.in-use");
    std::fs::write(&marker, b"").unwrap();

    second.ensure_ready().await.unwrap();

    assert!(marker.exists());
    assert_eq!(
        first.manifest().unwrap().digest,
        second.manifest().unwrap().digest
    );
    assert_eq!(leftover_entries(&tmp), vec!["model".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_processes_share_target_dir() {
    let tmp = TempDir::new().unwrap();
    let first_store = seeded_store();
    let second_store = seeded_store();
    first_store.set_latency(Duration::from_millis(10));
    second_store.set_latency(Duration::from_millis(10));
    let first = stub_cache(first_store, &tmp);
    let second = stub_cache(second_store, &tmp);

    let (a, b) = tokio::join!(
        tokio::spawn({
            let first = first.clone();
            async move { first.ensure_ready().await }
        }),
        tokio::spawn({
            let second = second.clone();
            async move { second.ensure_ready().await }
        }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    let target = tmp.path().join("model");
    assert!(target.join("config.json").is_file());
    assert!(target.join("model.safetensors").is_file());
    assert_eq!(leftover_entries(&tmp), vec!["model".to_string()]);
}

#[tokio::test]
async fn test_different_bundle_in_target_is_replaced() {
    let tmp = TempDir::new().unwrap();
    let first = stub_cache(seeded_store(), &tmp);
    first.ensure_ready().await.unwrap();

    let updated = seeded_store();
    updated.insert(format!("{PREFIX}/model.safetensors"), vec![9u8; 32]);
    let second = stub_cache(updated, &tmp);
    second.ensure_ready().await.unwrap();

    let weights = std::fs::read(tmp.path().join("model/model.safetensors")).unwrap();
    assert_eq!(weights, vec![9u8; 32]);
    assert_ne!(
        first.manifest().unwrap().digest,
        second.manifest().unwrap().digest
    );
}

#[tokio::test]
async fn test_materializes_from_local_store() {
    let tmp = TempDir::new().unwrap();
    let bucket = tmp.path().join("bucket");
    let bundle = bucket.join(PREFIX);
    std::fs::create_dir_all(bundle.join("1_Pooling")).unwrap();
    std::fs::write(bundle.join("config.json"), b"{}").unwrap();
    std::fs::write(bundle.join("tokenizer.json"), b"{}").unwrap();
    std::fs::write(bundle.join("model.safetensors"), b"weights").unwrap();
    std::fs::write(bundle.join("1_Pooling/config.json"), b"{}").unwrap();

    let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(&bucket));
    let config = ModelCacheConfig::stub(PREFIX, tmp.path().join("model"));
    let cache = ModelCache::new(config, store);

    cache.ensure_ready().await.unwrap();
    let manifest = cache.manifest().unwrap();
    let paths: Vec<_> = manifest.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "1_Pooling/config.json",
            "config.json",
            "model.safetensors",
            "tokenizer.json"
        ]
    );
}

#[test]
fn test_bundle_relative_path() {
    let dir = format!("{PREFIX}/");
    assert_eq!(
        bundle::bundle_relative_path(&dir, &format!("{PREFIX}/config.json")).unwrap(),
        Some("config.json".to_string())
    );
    assert_eq!(
        bundle::bundle_relative_path(&dir, &format!("{PREFIX}/1_Pooling/")).unwrap(),
        None
    );
    assert_eq!(
        bundle::bundle_relative_path(&dir, "elsewhere/config.json").unwrap(),
        None
    );
    assert!(bundle::bundle_relative_path(&dir, &format!("{PREFIX}//etc/passwd")).is_err());
    assert!(bundle::bundle_relative_path(&dir, &format!("{PREFIX}/a/../../b")).is_err());
}

#[test]
fn test_config_prefix_is_normalized() {
    let config = ModelCacheConfig::stub("/models/answer-scoring-model/", "/tmp/x");
    assert_eq!(config.bundle_prefix, PREFIX);
    assert!(config.validate().is_ok());
}
