use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{VerseError, VerseResult};
use crate::models::{UpsertVerse, Verse, VerseFilter, VectorWrite};

/// Repository trait for Verse persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerseRepository: Send + Sync {
    /// Insert a verse, or replace the one at its (chapter, verse) position.
    ///
    /// When the input carries no vector, an existing stored vector is kept.
    async fn upsert(&self, input: UpsertVerse) -> VerseResult<Verse>;

    /// Get a verse by ID, optionally including the stored embedding
    async fn get_by_id(&self, id: Uuid, with_vector: bool) -> VerseResult<Option<Verse>>;

    /// List verses in canonical (chapter, verse) order
    async fn list(&self, filter: VerseFilter) -> VerseResult<Vec<Verse>>;

    /// Distinct chapters that have at least one verse, ascending
    async fn list_chapters(&self) -> VerseResult<Vec<i32>>;

    /// Delete a verse by ID, returning whether it existed
    async fn delete(&self, id: Uuid) -> VerseResult<bool>;

    /// Case-insensitive substring search in canonical order
    async fn search_text(&self, query: &str, limit: u64) -> VerseResult<Vec<Verse>>;

    /// Nearest neighbours by cosine distance, closest first.
    ///
    /// Returns (verse, distance) pairs; verses without a stored vector
    /// never appear.
    async fn search_similar(&self, vector: &[f32], k: u64) -> VerseResult<Vec<(Verse, f64)>>;

    /// Replace one verse's embedding, returning whether the verse existed
    async fn set_vector(&self, id: Uuid, vector: &[f32]) -> VerseResult<bool>;

    /// Replace embeddings for many verses in a single transaction.
    ///
    /// All-or-nothing: an unknown ID fails the whole batch and no row
    /// is changed. Returns the number of rows updated.
    async fn set_vectors(&self, updates: &[VectorWrite]) -> VerseResult<u64>;
}

/// Cosine distance between two vectors of equal dimension.
///
/// Zero-magnitude vectors are treated as maximally distant (1.0) rather
/// than dividing by zero.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// In-memory implementation of VerseRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryVerseRepository {
    verses: Arc<RwLock<HashMap<Uuid, Verse>>>,
}

impl InMemoryVerseRepository {
    pub fn new() -> Self {
        Self {
            verses: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn without_vector(mut verse: Verse) -> Verse {
    verse.vector = None;
    verse
}

fn canonical_order(a: &Verse, b: &Verse) -> std::cmp::Ordering {
    (a.chapter, a.verse).cmp(&(b.chapter, b.verse))
}

#[async_trait]
impl VerseRepository for InMemoryVerseRepository {
    async fn upsert(&self, input: UpsertVerse) -> VerseResult<Verse> {
        let mut verses = self.verses.write().await;
        let now = Utc::now();

        let existing_id = verses
            .values()
            .find(|v| v.chapter == input.chapter && v.verse == input.verse)
            .map(|v| v.id);

        let verse = match existing_id {
            Some(id) => {
                let entry = verses
                    .get_mut(&id)
                    .ok_or_else(|| VerseError::Internal("verse vanished during upsert".into()))?;
                entry.text = input.text;
                if input.vector.is_some() {
                    entry.vector = input.vector;
                }
                entry.has_vector = entry.vector.is_some();
                entry.updated_at = now;
                entry.clone()
            }
            None => {
                let verse = Verse {
                    id: Uuid::now_v7(),
                    chapter: input.chapter,
                    verse: input.verse,
                    text: input.text,
                    has_vector: input.vector.is_some(),
                    vector: input.vector,
                    created_at: now,
                    updated_at: now,
                };
                verses.insert(verse.id, verse.clone());
                verse
            }
        };

        tracing::info!(verse_id = %verse.id, chapter = verse.chapter, verse = verse.verse, "Upserted verse");
        Ok(without_vector(verse))
    }

    async fn get_by_id(&self, id: Uuid, with_vector: bool) -> VerseResult<Option<Verse>> {
        let verses = self.verses.read().await;
        Ok(verses.get(&id).cloned().map(|v| {
            if with_vector {
                v
            } else {
                without_vector(v)
            }
        }))
    }

    async fn list(&self, filter: VerseFilter) -> VerseResult<Vec<Verse>> {
        let verses = self.verses.read().await;

        let mut result: Vec<Verse> = verses
            .values()
            .filter(|v| filter.chapter.is_none_or(|c| v.chapter == c))
            .cloned()
            .map(without_vector)
            .collect();

        result.sort_by(canonical_order);

        Ok(result
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn list_chapters(&self) -> VerseResult<Vec<i32>> {
        let verses = self.verses.read().await;
        let mut chapters: Vec<i32> = verses.values().map(|v| v.chapter).collect();
        chapters.sort_unstable();
        chapters.dedup();
        Ok(chapters)
    }

    async fn delete(&self, id: Uuid) -> VerseResult<bool> {
        let mut verses = self.verses.write().await;

        if verses.remove(&id).is_some() {
            tracing::info!(verse_id = %id, "Deleted verse");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn search_text(&self, query: &str, limit: u64) -> VerseResult<Vec<Verse>> {
        let verses = self.verses.read().await;
        let needle = query.to_lowercase();

        let mut result: Vec<Verse> = verses
            .values()
            .filter(|v| v.text.to_lowercase().contains(&needle))
            .cloned()
            .map(without_vector)
            .collect();

        result.sort_by(canonical_order);
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn search_similar(&self, vector: &[f32], k: u64) -> VerseResult<Vec<(Verse, f64)>> {
        let verses = self.verses.read().await;

        let mut scored: Vec<(Verse, f64)> = verses
            .values()
            .filter_map(|v| {
                v.vector
                    .as_ref()
                    .map(|stored| (v.clone(), cosine_distance(vector, stored)))
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k as usize);
        Ok(scored
            .into_iter()
            .map(|(v, d)| (without_vector(v), d))
            .collect())
    }

    async fn set_vector(&self, id: Uuid, vector: &[f32]) -> VerseResult<bool> {
        let mut verses = self.verses.write().await;

        match verses.get_mut(&id) {
            Some(verse) => {
                verse.vector = Some(vector.to_vec());
                verse.has_vector = true;
                verse.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_vectors(&self, updates: &[VectorWrite]) -> VerseResult<u64> {
        let mut verses = self.verses.write().await;

        // Validate every ID before touching anything, so a bad batch
        // leaves the store untouched
        for update in updates {
            if !verses.contains_key(&update.id) {
                return Err(VerseError::NotFound(update.id));
            }
        }

        let now = Utc::now();
        for update in updates {
            if let Some(verse) = verses.get_mut(&update.id) {
                verse.vector = Some(update.vector.clone());
                verse.has_vector = true;
                verse.updated_at = now;
            }
        }

        tracing::info!(count = updates.len(), "Bulk vector update applied");
        Ok(updates.len() as u64)
    }
}
