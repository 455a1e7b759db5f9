//! Handler tests for the verses domain
//!
//! These tests verify that HTTP handlers work correctly:
//! - Request deserialization (JSON → Rust structs)
//! - Response serialization (Rust structs → JSON)
//! - HTTP status codes
//! - Error responses
//!
//! They run against the in-memory repository, so they exercise the full
//! handler → service → repository path without a database.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain_verses::*;
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt; // For oneshot()

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn app() -> axum::Router {
    handlers::router(VerseService::new(InMemoryVerseRepository::new()))
}

/// Deterministic provider so ingestion tests cover the embedded path.
struct StubEmbedding;

#[async_trait]
impl EmbeddingProvider for StubEmbedding {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn embed(&self, _text: &str) -> VerseResult<Vec<f32>> {
        Ok(vec![0.1; EMBEDDING_DIM])
    }
}

fn upsert_request(chapter: i32, verse: i32, text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/verses")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "chapter": chapter,
                "verse": verse,
                "text": text
            }))
            .unwrap(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_upsert_verse_handler_returns_201() {
    let app = app();

    let response = app
        .oneshot(upsert_request(3, 5, "Trust in the Lord with all your heart"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let verse: Verse = json_body(response.into_body()).await;
    assert_eq!(verse.chapter, 3);
    assert_eq!(verse.verse, 5);
    assert!(!verse.has_vector);
}

#[tokio::test]
async fn test_upsert_verse_handler_validates_input() {
    let app = app();

    // Chapter 32 is out of range
    let response = app
        .oneshot(upsert_request(32, 1, "no such chapter"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_verse_handler_returns_404_for_missing() {
    let app = app();

    let missing_id = uuid::Uuid::new_v4();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/verses/{}", missing_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_verse_handler_returns_400_for_bad_uuid() {
    let app = app();

    let request = Request::builder()
        .method("GET")
        .uri("/verses/not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_verse_handler_round_trips() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    let created = service
        .upsert_verse(UpsertVerse {
            chapter: 1,
            verse: 7,
            text: "The fear of the Lord is the beginning of knowledge".to_string(),
            vector: None,
        })
        .await
        .unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/verses/{}", created.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let verse: Verse = json_body(response.into_body()).await;
    assert_eq!(verse.id, created.id);
    assert_eq!(verse.text, created.text);
}

#[tokio::test]
async fn test_search_handler_matches_case_insensitively() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    for (verse, text) in [(1, "Wisdom calls aloud"), (2, "A fool despises instruction")] {
        service
            .upsert_verse(UpsertVerse {
                chapter: 1,
                verse,
                text: text.to_string(),
                vector: None,
            })
            .await
            .unwrap();
    }

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/verses/search?q=WISDOM")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let verses: Vec<Verse> = json_body(response.into_body()).await;
    assert_eq!(verses.len(), 1);
    assert_eq!(verses[0].verse, 1);
}

#[tokio::test]
async fn test_similar_handler_rejects_wrong_dimension() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/verses/search/similar")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "vector": vec![0.1; EMBEDDING_DIM - 1] })).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_similar_handler_orders_by_score() {
    let service = VerseService::new(InMemoryVerseRepository::new());

    // Two vectors at different angles from the query
    let mut close = vec![0.0f32; EMBEDDING_DIM];
    close[0] = 1.0;
    close[1] = 0.1;
    let mut far = vec![0.0f32; EMBEDDING_DIM];
    far[1] = 1.0;

    for (verse, vector) in [(1, close), (2, far)] {
        service
            .upsert_verse(UpsertVerse {
                chapter: 1,
                verse,
                text: format!("verse {}", verse),
                vector: Some(vector),
            })
            .await
            .unwrap();
    }

    let app = handlers::router(service);

    let mut query = vec![0.0f32; EMBEDDING_DIM];
    query[0] = 1.0;

    let request = Request::builder()
        .method("POST")
        .uri("/verses/search/similar")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "vector": query, "k": 2 })).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let hits: Vec<ScoredVerse> = json_body(response.into_body()).await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].verse.verse, 1);
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn test_bulk_vector_handler_is_atomic() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    let created = service
        .upsert_verse(UpsertVerse {
            chapter: 2,
            verse: 1,
            text: "My son, if you accept my words".to_string(),
            vector: None,
        })
        .await
        .unwrap();

    // Clones share the same underlying store
    let app = handlers::router(service.clone());

    // One known ID plus one unknown: the whole batch must fail
    let request = Request::builder()
        .method("POST")
        .uri("/verses/vectors")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "updates": [
                    { "id": created.id, "vector": vec![0.1; EMBEDDING_DIM] },
                    { "id": uuid::Uuid::new_v4(), "vector": vec![0.2; EMBEDDING_DIM] }
                ]
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The known verse must be untouched
    let verse = service.get_verse(created.id, false).await.unwrap();
    assert!(!verse.has_vector);
}

#[tokio::test]
async fn test_set_vector_handler_returns_204() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    let created = service
        .upsert_verse(UpsertVerse {
            chapter: 2,
            verse: 2,
            text: "turning your ear to wisdom".to_string(),
            vector: None,
        })
        .await
        .unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/verses/{}/vector", created.id))
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "vector": vec![0.3; EMBEDDING_DIM] })).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_ingest_handler_reports_skipped_lines() {
    let service = VerseService::with_embedding(
        InMemoryVerseRepository::new(),
        Arc::new(StubEmbedding),
    );
    let app = handlers::router(service);

    let request = Request::builder()
        .method("POST")
        .uri("/chapters/4/ingest")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "text": "Listen, my sons\n\nto a father's instruction\npay attention"
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let report: BatchReport = json_body(response.into_body()).await;
    assert_eq!(report.total_lines, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.embedded, 3);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_ingest_handler_rejects_bad_chapter() {
    let app = app();

    let request = Request::builder()
        .method("POST")
        .uri("/chapters/0/ingest")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "text": "some text" })).unwrap(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_chapters_handler() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    for chapter in [3, 1] {
        service
            .upsert_verse(UpsertVerse {
                chapter,
                verse: 1,
                text: format!("chapter {} opening", chapter),
                vector: None,
            })
            .await
            .unwrap();
    }

    let app = handlers::router(service);

    let request = Request::builder()
        .method("GET")
        .uri("/chapters")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let chapters: Vec<i32> = json_body(response.into_body()).await;
    assert_eq!(chapters, vec![1, 3]);
}

#[tokio::test]
async fn test_delete_verse_handler_returns_204() {
    let service = VerseService::new(InMemoryVerseRepository::new());
    let created = service
        .upsert_verse(UpsertVerse {
            chapter: 5,
            verse: 1,
            text: "My son, pay attention to my wisdom".to_string(),
            vector: None,
        })
        .await
        .unwrap();

    let app = handlers::router(service);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/verses/{}", created.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
