//! HTTP handlers for the Proverbs verses API

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_helpers::{
    UuidPath, ValidatedJson,
    audit::{AuditEvent, AuditOutcome, extract_ip_from_headers, extract_user_agent},
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, InternalServerErrorResponse,
        NotFoundResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::VerseResult;
use crate::models::{
    BatchReport, BulkVectorResult, BulkVectorUpdate, FailedLine, GetVerseParams, IngestRequest,
    ScoredVerse, SearchParams, SimilarRequest, UpsertVerse, Verse, VerseFilter, VectorUpdate,
    VectorWrite,
};
use crate::repository::VerseRepository;
use crate::service::VerseService;

/// OpenAPI documentation for the Proverbs verses API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_verses,
        upsert_verse,
        get_verse,
        delete_verse,
        search_text,
        search_similar,
        set_vector,
        set_vectors_bulk,
        list_chapters,
        ingest_chapter,
    ),
    components(
        schemas(
            Verse, UpsertVerse, VerseFilter, SearchParams, SimilarRequest,
            ScoredVerse, VectorUpdate, VectorWrite, BulkVectorUpdate,
            BulkVectorResult, IngestRequest, BatchReport, FailedLine
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Verses", description = "Verse storage and retrieval endpoints"),
        (name = "Chapters", description = "Chapter listing and ingestion endpoints")
    )
)]
pub struct ApiDoc;

/// Create the verses router with all HTTP endpoints
pub fn router<R: VerseRepository + 'static>(service: VerseService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/verses", get(list_verses).post(upsert_verse))
        .route("/verses/search", get(search_text))
        .route("/verses/search/similar", post(search_similar))
        .route("/verses/vectors", post(set_vectors_bulk))
        .route("/verses/{id}", get(get_verse).delete(delete_verse))
        .route("/verses/{id}/vector", put(set_vector))
        .route("/chapters", get(list_chapters))
        .route("/chapters/{chapter}/ingest", post(ingest_chapter))
        .with_state(shared_service)
}

/// List verses in canonical order, optionally for one chapter
#[utoipa::path(
    get,
    path = "/verses",
    tag = "Verses",
    params(VerseFilter),
    responses(
        (status = 200, description = "List of verses", body = Vec<Verse>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_verses<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    Query(filter): Query<VerseFilter>,
) -> VerseResult<Json<Vec<Verse>>> {
    let verses = service.list_verses(filter).await?;
    Ok(Json(verses))
}

/// Create or replace a verse at its (chapter, verse) position
#[utoipa::path(
    post,
    path = "/verses",
    tag = "Verses",
    request_body = UpsertVerse,
    responses(
        (status = 201, description = "Verse stored", body = Verse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn upsert_verse<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<UpsertVerse>,
) -> VerseResult<impl IntoResponse> {
    let verse = service.upsert_verse(input).await?;

    AuditEvent::new(
        None, // TODO: Add user_id when authentication is implemented
        "verse.upsert",
        Some(format!("verse:{}", verse.id)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .with_details(json!({
        "chapter": verse.chapter,
        "verse": verse.verse,
        "has_vector": verse.has_vector,
    }))
    .log();

    Ok((StatusCode::CREATED, Json(verse)))
}

/// Get a verse by ID
#[utoipa::path(
    get,
    path = "/verses/{id}",
    tag = "Verses",
    params(
        ("id" = Uuid, Path, description = "Verse ID"),
        GetVerseParams
    ),
    responses(
        (status = 200, description = "Verse found", body = Verse),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_verse<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    UuidPath(id): UuidPath,
    Query(params): Query<GetVerseParams>,
) -> VerseResult<Json<Verse>> {
    let verse = service.get_verse(id, params.with_vector).await?;
    Ok(Json(verse))
}

/// Delete a verse
#[utoipa::path(
    delete,
    path = "/verses/{id}",
    tag = "Verses",
    params(
        ("id" = Uuid, Path, description = "Verse ID")
    ),
    responses(
        (status = 204, description = "Verse deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_verse<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> VerseResult<impl IntoResponse> {
    service.delete_verse(id).await?;

    AuditEvent::new(
        None, // TODO: Add user_id when authentication is implemented
        "verse.delete",
        Some(format!("verse:{}", id)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .log();

    Ok(StatusCode::NO_CONTENT)
}

/// Case-insensitive substring search over verse text
#[utoipa::path(
    get,
    path = "/verses/search",
    tag = "Verses",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching verses in canonical order", body = Vec<Verse>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn search_text<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    Query(params): Query<SearchParams>,
) -> VerseResult<Json<Vec<Verse>>> {
    let verses = service.search_text(&params.q, params.limit).await?;
    Ok(Json(verses))
}

/// Nearest neighbours of a query embedding by cosine similarity
#[utoipa::path(
    post,
    path = "/verses/search/similar",
    tag = "Verses",
    request_body = SimilarRequest,
    responses(
        (status = 200, description = "Scored verses, best match first", body = Vec<ScoredVerse>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn search_similar<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    Json(request): Json<SimilarRequest>,
) -> VerseResult<Json<Vec<ScoredVerse>>> {
    let hits = service.search_similar(&request.vector, request.k).await?;
    Ok(Json(hits))
}

/// Replace one verse's embedding
#[utoipa::path(
    put,
    path = "/verses/{id}/vector",
    tag = "Verses",
    params(
        ("id" = Uuid, Path, description = "Verse ID")
    ),
    request_body = VectorUpdate,
    responses(
        (status = 204, description = "Embedding replaced"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn set_vector<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<VectorUpdate>,
) -> VerseResult<impl IntoResponse> {
    service.set_vector(id, &input.vector).await?;

    AuditEvent::new(
        None, // TODO: Add user_id when authentication is implemented
        "verse.vector_update",
        Some(format!("verse:{}", id)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .log();

    Ok(StatusCode::NO_CONTENT)
}

/// Replace embeddings for many verses in one atomic batch
#[utoipa::path(
    post,
    path = "/verses/vectors",
    tag = "Verses",
    request_body = BulkVectorUpdate,
    responses(
        (status = 200, description = "All embeddings replaced", body = BulkVectorResult),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn set_vectors_bulk<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<BulkVectorUpdate>,
) -> VerseResult<Json<BulkVectorResult>> {
    let updated = service.set_vectors_bulk(&input.updates).await?;

    AuditEvent::new(
        None, // TODO: Add user_id when authentication is implemented
        "verse.vector_bulk_update",
        None,
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .with_details(json!({ "updated": updated }))
    .log();

    Ok(Json(BulkVectorResult { updated }))
}

/// List chapters that contain at least one verse
#[utoipa::path(
    get,
    path = "/chapters",
    tag = "Chapters",
    responses(
        (status = 200, description = "Chapter numbers in ascending order", body = Vec<i32>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_chapters<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
) -> VerseResult<Json<Vec<i32>>> {
    let chapters = service.list_chapters().await?;
    Ok(Json(chapters))
}

/// Ingest one chapter from raw text, one verse per line
#[utoipa::path(
    post,
    path = "/chapters/{chapter}/ingest",
    tag = "Chapters",
    params(
        ("chapter" = i32, Path, description = "Chapter number (1-31)")
    ),
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Ingestion report", body = BatchReport),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn ingest_chapter<R: VerseRepository>(
    State(service): State<Arc<VerseService<R>>>,
    headers: HeaderMap,
    Path(chapter): Path<i32>,
    ValidatedJson(input): ValidatedJson<IngestRequest>,
) -> VerseResult<Json<BatchReport>> {
    let report = service.ingest_chapter(chapter, &input.text).await?;

    AuditEvent::new(
        None, // TODO: Add user_id when authentication is implemented
        "chapter.ingest",
        Some(format!("chapter:{}", chapter)),
        AuditOutcome::Success,
    )
    .with_ip(extract_ip_from_headers(&headers))
    .with_user_agent(extract_user_agent(&headers))
    .with_details(json!({
        "total_lines": report.total_lines,
        "embedded": report.embedded,
        "degraded": report.degraded,
        "failed": report.failed,
    }))
    .log();

    Ok(Json(report))
}
