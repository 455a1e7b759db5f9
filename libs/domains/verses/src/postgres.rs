use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, QueryOrder, QuerySelect,
    QueryResult, Statement, TransactionTrait, Value,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{VerseError, VerseResult},
    models::{UpsertVerse, Verse, VerseFilter, VectorWrite},
    repository::VerseRepository,
};

/// Columns shared by every verse query. The embedding itself is only
/// selected on demand; `has_vector` is always derived in SQL.
const VERSE_COLUMNS: &str =
    "id, chapter, verse, text, (vector IS NOT NULL) AS has_vector, created_at, updated_at";

/// PostgreSQL repository backed by pgvector.
///
/// Everything touching the vector column goes through raw SQL because
/// SeaORM has no pgvector type: embeddings are written as `[a,b,c]`
/// literals cast with `::vector` and read back via `vector::text`.
pub struct PgVerseRepository {
    db: DatabaseConnection,
}

impl PgVerseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Encode an embedding as a pgvector input literal.
fn encode_vector(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 10 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

/// Decode pgvector's text representation back into an embedding.
fn decode_vector(text: &str) -> VerseResult<Vec<f32>> {
    let inner = text
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| VerseError::Internal(format!("Malformed vector literal: {}", text)))?;

    if inner.trim().is_empty() {
        return Ok(vec![]);
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| VerseError::Internal(format!("Malformed vector component: {}", e)))
        })
        .collect()
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn internal(e: sea_orm::DbErr) -> VerseError {
    VerseError::Internal(format!("Database error: {}", e))
}

fn verse_from_row(row: &QueryResult, with_vector: bool) -> VerseResult<Verse> {
    let vector = if with_vector {
        row.try_get::<Option<String>>("", "vector_text")
            .map_err(internal)?
            .map(|text| decode_vector(&text))
            .transpose()?
    } else {
        None
    };

    Ok(Verse {
        id: row.try_get("", "id").map_err(internal)?,
        chapter: row.try_get("", "chapter").map_err(internal)?,
        verse: row.try_get("", "verse").map_err(internal)?,
        text: row.try_get("", "text").map_err(internal)?,
        has_vector: row.try_get("", "has_vector").map_err(internal)?,
        vector,
        created_at: row
            .try_get::<DateTime<Utc>>("", "created_at")
            .map_err(internal)?,
        updated_at: row
            .try_get::<DateTime<Utc>>("", "updated_at")
            .map_err(internal)?,
    })
}

fn stmt(sql: String, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, values)
}

#[async_trait]
impl VerseRepository for PgVerseRepository {
    async fn upsert(&self, input: UpsertVerse) -> VerseResult<Verse> {
        let vector_literal = input.vector.as_deref().map(encode_vector);

        let sql = format!(
            r#"
            INSERT INTO verses (id, chapter, verse, text, vector)
            VALUES ($1, $2, $3, $4, $5::vector)
            ON CONFLICT (chapter, verse) DO UPDATE
                SET text = EXCLUDED.text,
                    vector = COALESCE(EXCLUDED.vector, verses.vector),
                    updated_at = now()
            RETURNING {VERSE_COLUMNS}
            "#
        );

        let row = self
            .db
            .query_one(stmt(
                sql,
                vec![
                    Uuid::now_v7().into(),
                    input.chapter.into(),
                    input.verse.into(),
                    input.text.into(),
                    vector_literal.into(),
                ],
            ))
            .await
            .map_err(internal)?
            .ok_or_else(|| VerseError::Internal("Upsert returned no row".to_string()))?;

        let verse = verse_from_row(&row, false)?;
        tracing::info!(verse_id = %verse.id, chapter = verse.chapter, verse = verse.verse, "Upserted verse");
        Ok(verse)
    }

    async fn get_by_id(&self, id: Uuid, with_vector: bool) -> VerseResult<Option<Verse>> {
        let sql = if with_vector {
            format!(
                "SELECT {VERSE_COLUMNS}, vector::text AS vector_text FROM verses WHERE id = $1"
            )
        } else {
            format!("SELECT {VERSE_COLUMNS} FROM verses WHERE id = $1")
        };

        let row = self
            .db
            .query_one(stmt(sql, vec![id.into()]))
            .await
            .map_err(internal)?;

        row.map(|r| verse_from_row(&r, with_vector)).transpose()
    }

    async fn list(&self, filter: VerseFilter) -> VerseResult<Vec<Verse>> {
        let (sql, values) = match filter.chapter {
            Some(chapter) => (
                format!(
                    "SELECT {VERSE_COLUMNS} FROM verses WHERE chapter = $1 \
                     ORDER BY chapter, verse LIMIT $2 OFFSET $3"
                ),
                vec![
                    chapter.into(),
                    (filter.limit as i64).into(),
                    (filter.offset as i64).into(),
                ],
            ),
            None => (
                format!(
                    "SELECT {VERSE_COLUMNS} FROM verses \
                     ORDER BY chapter, verse LIMIT $1 OFFSET $2"
                ),
                vec![(filter.limit as i64).into(), (filter.offset as i64).into()],
            ),
        };

        let rows = self
            .db
            .query_all(stmt(sql, values))
            .await
            .map_err(internal)?;

        rows.iter().map(|r| verse_from_row(r, false)).collect()
    }

    async fn list_chapters(&self) -> VerseResult<Vec<i32>> {
        entity::Entity::find()
            .select_only()
            .column(entity::Column::Chapter)
            .distinct()
            .order_by_asc(entity::Column::Chapter)
            .into_tuple::<i32>()
            .all(&self.db)
            .await
            .map_err(internal)
    }

    async fn delete(&self, id: Uuid) -> VerseResult<bool> {
        let result = entity::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(internal)?;

        if result.rows_affected > 0 {
            tracing::info!(verse_id = %id, "Deleted verse");
        }
        Ok(result.rows_affected > 0)
    }

    async fn search_text(&self, query: &str, limit: u64) -> VerseResult<Vec<Verse>> {
        let pattern = format!("%{}%", escape_like(query));
        let sql = format!(
            "SELECT {VERSE_COLUMNS} FROM verses WHERE text ILIKE $1 \
             ORDER BY chapter, verse LIMIT $2"
        );

        let rows = self
            .db
            .query_all(stmt(sql, vec![pattern.into(), (limit as i64).into()]))
            .await
            .map_err(internal)?;

        rows.iter().map(|r| verse_from_row(r, false)).collect()
    }

    async fn search_similar(&self, vector: &[f32], k: u64) -> VerseResult<Vec<(Verse, f64)>> {
        let literal = encode_vector(vector);
        let sql = format!(
            "SELECT {VERSE_COLUMNS}, (vector <=> $1::vector)::float8 AS distance \
             FROM verses WHERE vector IS NOT NULL \
             ORDER BY vector <=> $1::vector LIMIT $2"
        );

        let rows = self
            .db
            .query_all(stmt(sql, vec![literal.into(), (k as i64).into()]))
            .await
            .map_err(internal)?;

        rows.iter()
            .map(|row| {
                let verse = verse_from_row(row, false)?;
                let distance: f64 = row.try_get("", "distance").map_err(internal)?;
                Ok((verse, distance))
            })
            .collect()
    }

    async fn set_vector(&self, id: Uuid, vector: &[f32]) -> VerseResult<bool> {
        let literal = encode_vector(vector);
        let result = self
            .db
            .execute(stmt(
                "UPDATE verses SET vector = $2::vector, updated_at = now() WHERE id = $1"
                    .to_string(),
                vec![id.into(), literal.into()],
            ))
            .await
            .map_err(internal)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_vectors(&self, updates: &[VectorWrite]) -> VerseResult<u64> {
        let txn = self.db.begin().await.map_err(internal)?;

        let mut updated = 0u64;
        for update in updates {
            let literal = encode_vector(&update.vector);
            let result = txn
                .execute(stmt(
                    "UPDATE verses SET vector = $2::vector, updated_at = now() WHERE id = $1"
                        .to_string(),
                    vec![update.id.into(), literal.into()],
                ))
                .await
                .map_err(internal)?;

            if result.rows_affected() == 0 {
                txn.rollback().await.map_err(internal)?;
                return Err(VerseError::NotFound(update.id));
            }
            updated += result.rows_affected();
        }

        txn.commit().await.map_err(internal)?;
        tracing::info!(count = updated, "Bulk vector update committed");
        Ok(updated)
    }
}
