use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::embedding::EmbeddingProvider;
use crate::error::{VerseError, VerseResult};
use crate::models::{
    BatchReport, DEFAULT_SEARCH_LIMIT, DEFAULT_SIMILAR_LIMIT, EMBEDDING_DIM, FailedLine,
    MAX_CHAPTER, MAX_LIMIT, ScoredVerse, UpsertVerse, Verse, VerseFilter, VectorWrite,
    effective_limit,
};
use crate::repository::VerseRepository;

/// Service layer for verse business logic.
///
/// The embedding provider is optional: without one, ingestion still
/// stores every verse, just without embeddings.
#[derive(Clone)]
pub struct VerseService<R: VerseRepository> {
    repository: Arc<R>,
    embedding: Option<Arc<dyn EmbeddingProvider>>,
}

fn check_dimension(vector: &[f32]) -> VerseResult<()> {
    if vector.len() != EMBEDDING_DIM {
        return Err(VerseError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: vector.len(),
        });
    }
    Ok(())
}

fn check_chapter(chapter: i32) -> VerseResult<()> {
    if !(1..=MAX_CHAPTER).contains(&chapter) {
        return Err(VerseError::Validation(format!(
            "Chapter must be between 1 and {}, got {}",
            MAX_CHAPTER, chapter
        )));
    }
    Ok(())
}

impl<R: VerseRepository> VerseService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
            embedding: None,
        }
    }

    pub fn with_embedding(repository: R, embedding: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            repository: Arc::new(repository),
            embedding: Some(embedding),
        }
    }

    /// Create or replace the verse at its (chapter, verse) position
    pub async fn upsert_verse(&self, input: UpsertVerse) -> VerseResult<Verse> {
        input
            .validate()
            .map_err(|e| VerseError::Validation(e.to_string()))?;

        if let Some(ref vector) = input.vector {
            check_dimension(vector)?;
        }

        self.repository.upsert(input).await
    }

    /// Get a verse by ID
    pub async fn get_verse(&self, id: Uuid, with_vector: bool) -> VerseResult<Verse> {
        self.repository
            .get_by_id(id, with_vector)
            .await?
            .ok_or(VerseError::NotFound(id))
    }

    /// List verses, optionally restricted to one chapter
    pub async fn list_verses(&self, mut filter: VerseFilter) -> VerseResult<Vec<Verse>> {
        if let Some(chapter) = filter.chapter {
            check_chapter(chapter)?;
        }
        filter.limit = filter.limit.min(MAX_LIMIT);

        self.repository.list(filter).await
    }

    /// Distinct chapters with at least one verse
    pub async fn list_chapters(&self) -> VerseResult<Vec<i32>> {
        self.repository.list_chapters().await
    }

    /// Delete a verse
    pub async fn delete_verse(&self, id: Uuid) -> VerseResult<()> {
        let deleted = self.repository.delete(id).await?;

        if !deleted {
            return Err(VerseError::NotFound(id));
        }

        Ok(())
    }

    /// Case-insensitive substring search.
    ///
    /// A blank query returns no results without touching the store.
    pub async fn search_text(&self, query: &str, limit: Option<u64>) -> VerseResult<Vec<Verse>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let limit = effective_limit(limit, DEFAULT_SEARCH_LIMIT);
        self.repository.search_text(query, limit).await
    }

    /// Nearest neighbours by cosine similarity, best match first.
    ///
    /// Scores are 1 minus the cosine distance reported by the store.
    pub async fn search_similar(
        &self,
        vector: &[f32],
        k: Option<u64>,
    ) -> VerseResult<Vec<ScoredVerse>> {
        check_dimension(vector)?;

        let k = effective_limit(k, DEFAULT_SIMILAR_LIMIT);
        let hits = self.repository.search_similar(vector, k).await?;

        Ok(hits
            .into_iter()
            .map(|(verse, distance)| ScoredVerse {
                verse,
                score: (1.0 - distance) as f32,
            })
            .collect())
    }

    /// Replace one verse's embedding
    pub async fn set_vector(&self, id: Uuid, vector: &[f32]) -> VerseResult<()> {
        check_dimension(vector)?;

        let updated = self.repository.set_vector(id, vector).await?;
        if !updated {
            return Err(VerseError::NotFound(id));
        }

        Ok(())
    }

    /// Replace embeddings for many verses atomically.
    ///
    /// Every vector is dimension-checked before the store is touched;
    /// an unknown ID fails the whole batch.
    pub async fn set_vectors_bulk(&self, updates: &[VectorWrite]) -> VerseResult<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        for update in updates {
            check_dimension(&update.vector)?;
        }

        self.repository.set_vectors(updates).await
    }

    /// Ingest one chapter from raw text, one verse per line.
    ///
    /// Line numbers become verse numbers, so blank lines are skipped but
    /// still consume an ordinal. An embedding failure downgrades the
    /// line to a vector-less insert; only a store failure marks the line
    /// as failed. Neither aborts the batch.
    pub async fn ingest_chapter(&self, chapter: i32, text: &str) -> VerseResult<BatchReport> {
        check_chapter(chapter)?;

        let mut report = BatchReport::default();

        for (idx, line) in text.lines().enumerate() {
            let ordinal = (idx + 1) as i32;
            report.total_lines += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                report.skipped += 1;
                continue;
            }

            let vector = match &self.embedding {
                Some(provider) => match provider.embed(trimmed).await {
                    Ok(v) if v.len() == EMBEDDING_DIM => Some(v),
                    Ok(v) => {
                        tracing::warn!(
                            chapter,
                            ordinal,
                            dimension = v.len(),
                            "Embedding has wrong dimension, storing verse without it"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!(
                            chapter,
                            ordinal,
                            error = %e,
                            "Embedding failed, storing verse without it"
                        );
                        None
                    }
                },
                None => None,
            };

            let degraded = vector.is_none();
            let input = UpsertVerse {
                chapter,
                verse: ordinal,
                text: trimmed.to_string(),
                vector,
            };

            match self.repository.upsert(input).await {
                Ok(_) => {
                    if degraded {
                        report.degraded += 1;
                    } else {
                        report.embedded += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(chapter, ordinal, error = %e, "Failed to store verse");
                    report.failed += 1;
                    report.failures.push(FailedLine {
                        ordinal,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            chapter,
            total = report.total_lines,
            embedded = report.embedded,
            degraded = report.degraded,
            failed = report.failed,
            "Chapter ingestion finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::repository::MockVerseRepository;
    use chrono::Utc;
    use std::sync::Mutex;

    fn verse_from(input: &UpsertVerse) -> Verse {
        Verse {
            id: Uuid::now_v7(),
            chapter: input.chapter,
            verse: input.verse,
            text: input.text.clone(),
            has_vector: input.vector.is_some(),
            vector: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn blank_lines_keep_ordinals_stable() {
        let mut repo = MockVerseRepository::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        repo.expect_upsert().times(3).returning(move |input| {
            seen_clone.lock().unwrap().push(input.verse);
            Ok(verse_from(&input))
        });

        let service = VerseService::new(repo);
        let report = service.ingest_chapter(1, "alpha\n\nbeta\ngamma").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 3, 4]);
        assert_eq!(report.total_lines, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rows_written(), 3);
    }

    #[tokio::test]
    async fn reingesting_the_same_block_leaves_the_stored_set_unchanged() {
        let mut provider = MockEmbeddingProvider::new();
        provider
            .expect_embed()
            .returning(|_| Ok(vec![0.2; EMBEDDING_DIM]));

        let service = VerseService::with_embedding(
            crate::repository::InMemoryVerseRepository::new(),
            Arc::new(provider),
        );

        let block = "first line\n\nthird line";
        service.ingest_chapter(7, block).await.unwrap();
        let first = service.list_verses(VerseFilter::default()).await.unwrap();

        let report = service.ingest_chapter(7, block).await.unwrap();
        let second = service.list_verses(VerseFilter::default()).await.unwrap();

        assert_eq!(report.rows_written(), 2);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), first.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!((a.chapter, a.verse), (b.chapter, b.verse));
            assert_eq!(a.text, b.text);
            assert!(b.has_vector);
        }

        let ordinals: Vec<i32> = second.iter().map(|v| v.verse).collect();
        assert_eq!(ordinals, vec![1, 3]);
    }

    #[tokio::test]
    async fn embedding_failure_degrades_the_line_but_not_the_batch() {
        let mut repo = MockVerseRepository::new();
        repo.expect_upsert()
            .times(5)
            .returning(|input| Ok(verse_from(&input)));

        let mut provider = MockEmbeddingProvider::new();
        provider.expect_embed().returning(|text| {
            if text == "line three" {
                Err(VerseError::Embedding("rate limited".to_string()))
            } else {
                Ok(vec![0.1; EMBEDDING_DIM])
            }
        });

        let service = VerseService::with_embedding(repo, Arc::new(provider));
        let report = service
            .ingest_chapter(2, "line one\nline two\nline three\nline four\nline five")
            .await
            .unwrap();

        assert_eq!(report.embedded, 4);
        assert_eq!(report.degraded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.rows_written(), 5);
    }

    #[tokio::test]
    async fn store_failure_is_recorded_and_the_batch_continues() {
        let mut repo = MockVerseRepository::new();
        repo.expect_upsert().times(3).returning(|input| {
            if input.verse == 2 {
                Err(VerseError::Internal("connection reset".to_string()))
            } else {
                Ok(verse_from(&input))
            }
        });

        let service = VerseService::new(repo);
        let report = service.ingest_chapter(3, "one\ntwo\nthree").await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ordinal, 2);
        assert_eq!(report.rows_written(), 2);
    }

    #[tokio::test]
    async fn wrong_dimension_embedding_degrades_the_line() {
        let mut repo = MockVerseRepository::new();
        repo.expect_upsert()
            .withf(|input| input.vector.is_none())
            .times(1)
            .returning(|input| Ok(verse_from(&input)));

        let mut provider = MockEmbeddingProvider::new();
        provider
            .expect_embed()
            .returning(|_| Ok(vec![0.1; EMBEDDING_DIM - 1]));

        let service = VerseService::with_embedding(repo, Arc::new(provider));
        let report = service.ingest_chapter(1, "only line").await.unwrap();

        assert_eq!(report.degraded, 1);
        assert_eq!(report.embedded, 0);
    }

    #[tokio::test]
    async fn ingest_rejects_out_of_range_chapters() {
        let repo = MockVerseRepository::new();
        let service = VerseService::new(repo);

        assert!(matches!(
            service.ingest_chapter(0, "text").await,
            Err(VerseError::Validation(_))
        ));
        assert!(matches!(
            service.ingest_chapter(32, "text").await,
            Err(VerseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn blank_search_query_short_circuits() {
        // No expectation set: touching the repository would panic
        let repo = MockVerseRepository::new();
        let service = VerseService::new(repo);

        let hits = service.search_text("   ", None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_limit_is_defaulted_and_capped() {
        let mut repo = MockVerseRepository::new();
        repo.expect_search_text()
            .withf(|_, limit| *limit == DEFAULT_SEARCH_LIMIT)
            .times(1)
            .returning(|_, _| Ok(vec![]));
        repo.expect_search_text()
            .withf(|_, limit| *limit == MAX_LIMIT)
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let service = VerseService::new(repo);
        service.search_text("wisdom", None).await.unwrap();
        service.search_text("wisdom", Some(1000)).await.unwrap();
    }

    #[tokio::test]
    async fn similarity_scores_invert_distance() {
        let mut repo = MockVerseRepository::new();
        repo.expect_search_similar().returning(|_, _| {
            let make = |n: i32| Verse {
                id: Uuid::now_v7(),
                chapter: 1,
                verse: n,
                text: format!("verse {}", n),
                has_vector: true,
                vector: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            Ok(vec![(make(1), 0.05), (make(2), 0.1), (make(3), 0.3)])
        });

        let service = VerseService::new(repo);
        let hits = service
            .search_similar(&vec![0.1; EMBEDDING_DIM], Some(3))
            .await
            .unwrap();

        assert_eq!(hits.len(), 3);
        assert!((hits[0].score - 0.95).abs() < 1e-6);
        assert!((hits[1].score - 0.9).abs() < 1e-6);
        assert!((hits[2].score - 0.7).abs() < 1e-6);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected_before_the_store() {
        // No repository expectations: any call would panic
        let repo = MockVerseRepository::new();
        let service = VerseService::new(repo);

        let short = vec![0.1; EMBEDDING_DIM - 1];

        let err = service.search_similar(&short, None).await.unwrap_err();
        assert!(matches!(
            err,
            VerseError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual
            } if actual == EMBEDDING_DIM - 1
        ));

        let err = service.set_vector(Uuid::now_v7(), &short).await.unwrap_err();
        assert!(matches!(err, VerseError::DimensionMismatch { .. }));

        let updates = vec![VectorWrite {
            id: Uuid::now_v7(),
            vector: short,
        }];
        let err = service.set_vectors_bulk(&updates).await.unwrap_err();
        assert!(matches!(err, VerseError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_bulk_update_is_a_no_op() {
        let repo = MockVerseRepository::new();
        let service = VerseService::new(repo);

        assert_eq!(service.set_vectors_bulk(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_missing_verse_is_not_found() {
        let mut repo = MockVerseRepository::new();
        repo.expect_delete().returning(|_| Ok(false));

        let service = VerseService::new(repo);
        let err = service.delete_verse(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, VerseError::NotFound(_)));
    }
}
