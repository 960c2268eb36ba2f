#![allow(dead_code)]

pub mod harness;

use std::sync::Arc;

use semgrade::MemoryArtifactStore;

pub const MODEL_PREFIX: &str = "models/answer-scoring-model";

/// Store holding a minimal bundle (enough for the stub encoder).
pub fn stub_bundle_store() -> Arc<MemoryArtifactStore> {
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert(format!("{MODEL_PREFIX}/"), Vec::new());
    store.insert(format!("{MODEL_PREFIX}/config.json"), b"{}".to_vec());
    store.insert(format!("{MODEL_PREFIX}/tokenizer.json"), b"{}".to_vec());
    store.insert(format!("{MODEL_PREFIX}/model.safetensors"), vec![0u8; 32]);
    store.insert(
        format!("{MODEL_PREFIX}/sentence_bert_config.json"),
        br#"{"max_seq_length": 128}"#.to_vec(),
    );
    store
}

pub fn answer(id: &str, key: &str, student: &str, max_score: f64) -> serde_json::Value {
    serde_json::json!({
        "question_id": id,
        "key_answer": key,
        "student_answer": student,
        "max_score": max_score,
    })
}
