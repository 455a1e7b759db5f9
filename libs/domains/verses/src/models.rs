use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Dimension of the embedding vectors stored alongside verses.
pub const EMBEDDING_DIM: usize = 1536;

/// Highest chapter number in the book of Proverbs.
pub const MAX_CHAPTER: i32 = 31;

/// Default number of results for text search.
pub const DEFAULT_SEARCH_LIMIT: u64 = 20;

/// Default number of neighbours for similarity search.
pub const DEFAULT_SIMILAR_LIMIT: u64 = 10;

/// Upper bound on any caller-supplied result limit.
pub const MAX_LIMIT: u64 = 100;

/// A verse with its optional embedding.
///
/// `vector` is only populated when explicitly requested; `has_vector`
/// always reports whether an embedding is stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Verse {
    /// Unique identifier
    pub id: Uuid,
    /// Chapter number (1-31)
    pub chapter: i32,
    /// Verse number within the chapter
    pub verse: i32,
    /// Verse text
    pub text: String,
    /// Whether an embedding is stored for this verse
    pub has_vector: bool,
    /// The embedding itself, included only when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating or replacing a verse at its (chapter, verse) position
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpsertVerse {
    #[validate(range(min = 1, max = 31))]
    pub chapter: i32,
    #[validate(range(min = 1))]
    pub verse: i32,
    #[validate(length(min = 1))]
    pub text: String,
    /// Optional embedding; dimension is checked by the service
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
}

/// Query filters for listing verses
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct VerseFilter {
    /// Restrict to a single chapter
    pub chapter: Option<i32>,
    #[serde(default = "default_list_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_list_limit() -> u64 {
    MAX_LIMIT
}

impl Default for VerseFilter {
    fn default() -> Self {
        Self {
            chapter: None,
            limit: default_list_limit(),
            offset: 0,
        }
    }
}

/// Query parameters for substring text search
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct SearchParams {
    /// Substring to look for, matched case-insensitively
    pub q: String,
    /// Maximum number of results (default 20, capped at 100)
    pub limit: Option<u64>,
}

/// Query parameter for fetching a single verse
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct GetVerseParams {
    /// Include the stored embedding in the response
    #[serde(default)]
    pub with_vector: bool,
}

/// Request body for similarity search
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SimilarRequest {
    /// Query embedding, must have dimension 1536
    pub vector: Vec<f32>,
    /// Number of neighbours to return (default 10, capped at 100)
    pub k: Option<u64>,
}

/// A verse with its similarity score against a query vector.
///
/// Score is 1 minus the cosine distance, so 1.0 is an exact match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoredVerse {
    #[serde(flatten)]
    pub verse: Verse,
    pub score: f32,
}

/// Request body for replacing a single verse's embedding
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VectorUpdate {
    #[validate(length(min = 1))]
    pub vector: Vec<f32>,
}

/// One (verse id, embedding) pair in a bulk vector write
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VectorWrite {
    pub id: Uuid,
    pub vector: Vec<f32>,
}

/// Request body for the atomic bulk vector write
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BulkVectorUpdate {
    #[validate(length(min = 1))]
    pub updates: Vec<VectorWrite>,
}

/// Response for the bulk vector write
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkVectorResult {
    /// Number of rows updated
    pub updated: u64,
}

/// Request body for chapter ingestion: the raw chapter text, one verse
/// per line
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IngestRequest {
    #[validate(length(min = 1))]
    pub text: String,
}

/// A line that could not be stored during ingestion
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailedLine {
    /// 1-based line number in the submitted text
    pub ordinal: i32,
    pub reason: String,
}

/// Outcome of one chapter ingestion run.
///
/// Every non-blank line lands in exactly one of `embedded`, `degraded`
/// or `failures`; blank lines are counted in `skipped` and keep their
/// ordinal so verse numbers stay stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchReport {
    /// Lines seen in the input, blank or not
    pub total_lines: u64,
    /// Blank lines that were skipped
    pub skipped: u64,
    /// Verses stored with an embedding
    pub embedded: u64,
    /// Verses stored without an embedding after an embedding failure
    pub degraded: u64,
    /// Lines whose verse could not be stored at all
    pub failed: u64,
    pub failures: Vec<FailedLine>,
}

impl BatchReport {
    /// Number of verses actually written to the store.
    pub fn rows_written(&self) -> u64 {
        self.embedded + self.degraded
    }
}

/// Clamp an optional caller-supplied limit to `MAX_LIMIT`, falling back
/// to `default` when absent.
///
/// An explicit 0 is honoured and yields no results.
pub fn effective_limit(requested: Option<u64>, default: u64) -> u64 {
    match requested {
        None => default,
        Some(n) => n.min(MAX_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_defaults_and_caps() {
        assert_eq!(effective_limit(None, DEFAULT_SEARCH_LIMIT), 20);
        assert_eq!(effective_limit(Some(5), DEFAULT_SEARCH_LIMIT), 5);
        assert_eq!(effective_limit(Some(500), DEFAULT_SEARCH_LIMIT), MAX_LIMIT);
    }

    #[test]
    fn effective_limit_honours_an_explicit_zero() {
        assert_eq!(effective_limit(Some(0), DEFAULT_SEARCH_LIMIT), 0);
        assert_eq!(effective_limit(Some(0), DEFAULT_SIMILAR_LIMIT), 0);
    }

    #[test]
    fn batch_report_rows_written_sums_both_outcomes() {
        let report = BatchReport {
            total_lines: 6,
            skipped: 1,
            embedded: 3,
            degraded: 1,
            failed: 1,
            failures: vec![FailedLine {
                ordinal: 6,
                reason: "store unavailable".to_string(),
            }],
        };
        assert_eq!(report.rows_written(), 4);
    }

    #[test]
    fn verse_without_vector_omits_the_field() {
        let verse = Verse {
            id: Uuid::now_v7(),
            chapter: 3,
            verse: 5,
            text: "Trust in the Lord with all your heart".to_string(),
            has_vector: false,
            vector: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&verse).unwrap();
        assert!(json.get("vector").is_none());
        assert_eq!(json["has_vector"], false);
    }
}
