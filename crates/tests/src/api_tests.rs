use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use batchscribe_api::build_router;
use serde_json::Value;
use tower::ServiceExt;

use crate::fixtures::harness::Harness;
use crate::fixtures::transcripts::wav_bytes;

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let h = Harness::new();
    let app = build_router(h.app_state(vec![]));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn scan_endpoint_submits_unclaimed_audio() {
    let h = Harness::new();
    h.upload("a.wav", &wav_bytes(1, 8000, 1)).await;
    h.upload("b.wav", &wav_bytes(1, 8000, 1)).await;
    let app = build_router(h.app_state(vec![]));

    let response = app
        .oneshot(Request::post("/api/scan").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["submitted_jobs"], 1);
    assert_eq!(json["submitted_files"], 2);
    assert_eq!(h.speech.created().len(), 1);
}

#[tokio::test]
async fn upload_endpoint_rejects_blank_urls() {
    let h = Harness::new();
    let app = build_router(h.app_state(vec![]));

    let response = app
        .oneshot(
            Request::post("/api/audio")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"fileUrl":"  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "bad_request");
    assert!(h.queue.is_empty(&h.settings.queue.start_name));
}

#[tokio::test]
async fn upload_endpoint_queues_a_start_event() {
    let h = Harness::new();
    let app = build_router(h.app_state(vec![]));

    let response = app
        .oneshot(
            Request::post("/api/audio")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"fileUrl":"file:///data/audio-input/a.wav"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(h.queue.len(&h.settings.queue.start_name), 1);
}
