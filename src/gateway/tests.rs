//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{AppState, SEMGRADE_STATUS_HEADER, create_router};
use crate::artifact::MemoryArtifactStore;
use crate::config::Config;
use crate::grading::BatchScorer;
use crate::model_cache::{ModelCache, ModelCacheConfig};
use crate::scoring::SimilarityScorer;

const PREFIX: &str = "models/answer-scoring-model";

fn bundle_store() -> Arc<MemoryArtifactStore> {
    let store = Arc::new(MemoryArtifactStore::new());
    store.insert(format!("{PREFIX}/config.json"), b"{}".to_vec());
    store.insert(format!("{PREFIX}/tokenizer.json"), b"{}".to_vec());
    store.insert(format!("{PREFIX}/model.safetensors"), vec![0u8; 16]);
    store
}

fn router(store: Arc<MemoryArtifactStore>, tmp: &TempDir, max_batch_size: usize) -> Router {
    let cache = ModelCache::new(
        ModelCacheConfig::stub(PREFIX, tmp.path().join("model")),
        store,
    );
    let scorer = BatchScorer::new(cache, SimilarityScorer::default(), 2);
    let config = Config {
        max_batch_size,
        ..Config::default()
    };
    create_router(AppState::new(scorer, config.max_batch_size), &config)
}

fn post_json(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/score_exam")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn exam(answers: Value) -> String {
    json!({ "answers": answers }).to_string()
}

#[tokio::test]
async fn test_healthz() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SEMGRADE_STATUS_HEADER], "healthy");
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_ready_reflects_model_state() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let cold = app
        .clone()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(cold.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(cold).await["model"], "cold");

    let scored = app
        .clone()
        .oneshot(post_json(exam(json!([
            {"question_id": 1, "key_answer": "a b c", "student_answer": "a b", "max_score": 1}
        ]))))
        .await
        .unwrap();
    assert_eq!(scored.status(), StatusCode::OK);

    let ready = app
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    let body = body_json(ready).await;
    assert_eq!(body["model"], "ready");
    assert_eq!(body["stub"], true);
}

#[tokio::test]
async fn test_score_exam_success() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let response = app
        .oneshot(post_json(exam(json!([
            {"question_id": "q1", "key_answer": "Light travels fast", "student_answer": "Light travels fast", "max_score": 4},
            {"question_id": "q2", "key_answer": "Sound needs a medium", "student_answer": "", "max_score": 2}
        ]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SEMGRADE_STATUS_HEADER], "success");
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["results"][0]["question_id"], "q1");
    assert_eq!(body["results"][0]["final_score"], 4.0);
    assert_eq!(body["results"][1]["final_score"], 0.0);
    assert_eq!(body["total_score"], 4.0);
    assert_eq!(body["total_max_score"], 6.0);
}

#[tokio::test]
async fn test_score_exam_partial_is_ok() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let response = app
        .oneshot(post_json(exam(json!([
            {"question_id": 1, "key_answer": "x y", "student_answer": "x y", "max_score": 1},
            {"question_id": 2, "key_answer": "x y", "student_answer": "x y", "max_score": -3}
        ]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "partial");
    assert!(body["results"][1]["error"].is_string());
}

#[tokio::test]
async fn test_missing_answers_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let response = app
        .oneshot(post_json(json!({"responses": []}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("answers"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = router(bundle_store(), &tmp, 10);

    let response = app.oneshot(post_json("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = bundle_store();
    let app = router(store.clone(), &tmp, 2);

    let item = json!({"question_id": 1, "key_answer": "k", "student_answer": "s", "max_score": 1});
    let response = app
        .oneshot(post_json(exam(json!([item.clone(), item.clone(), item]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("exceeds"));
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test]
async fn test_missing_model_is_service_unavailable() {
    let tmp = TempDir::new().unwrap();
    let app = router(Arc::new(MemoryArtifactStore::new()), &tmp, 10);

    let response = app
        .oneshot(post_json(exam(json!([
            {"question_id": 1, "key_answer": "k", "student_answer": "s", "max_score": 1}
        ]))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()[SEMGRADE_STATUS_HEADER], "error");
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["results"], json!([]));
    assert!(body["error"].is_string());
}
