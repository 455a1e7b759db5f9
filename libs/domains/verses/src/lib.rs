//! Proverbs Verses Domain
//!
//! Storage and retrieval for the book of Proverbs, one row per verse,
//! with optional pgvector embeddings for similarity search.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Business logic, ingestion, dimension checks
//! └──────┬──────┘
//!        │
//! ┌──────▼─────────────┐
//! │ Repository         │  ← Data access (trait + in-memory + Postgres)
//! │ EmbeddingProvider  │  ← Embedding generation (trait + OpenAI)
//! └──────┬─────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_verses::{handlers, postgres::PgVerseRepository, service::VerseService};
//!
//! # async fn example(db: sea_orm::DatabaseConnection) {
//! let repository = PgVerseRepository::new(db);
//! let service = VerseService::new(repository);
//! let router = handlers::router(service);
//! # }
//! ```

pub mod embedding;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use embedding::{EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use error::{VerseError, VerseResult};
pub use handlers::ApiDoc;
pub use models::{
    BatchReport, BulkVectorResult, BulkVectorUpdate, EMBEDDING_DIM, FailedLine, IngestRequest,
    ScoredVerse, SearchParams, SimilarRequest, UpsertVerse, Verse, VerseFilter, VectorUpdate,
    VectorWrite,
};
pub use postgres::PgVerseRepository;
pub use repository::{InMemoryVerseRepository, VerseRepository};
pub use service::VerseService;
