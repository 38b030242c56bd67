//! Product catalog operations
//!
//! The catalog maps a normalized item name to its category. Lookups and
//! usage increments are batched: one statement per request, never one per
//! item.

use crate::error::StoreError;
use crate::models::Suggestion;
use crate::taxonomy::Taxonomy;
use balss_common::db::{CatalogEntry, Source};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

/// Upper bound for suggestion queries
pub const MAX_SUGGESTIONS: i64 = 100;

/// Classification about to be written
#[derive(Debug, Clone)]
pub struct NewClassification<'a> {
    pub raw_name: &'a str,
    pub normalized_key: &'a str,
    /// Must already be an official slug
    pub category: &'a str,
    /// Ignored for manual writes (always 1.0)
    pub confidence: f64,
    pub source: Source,
}

const ENTRY_COLUMNS: &str = "id, name, normalized_name, category, confidence, source, \
                             usage_count, created_at, updated_at";

fn entry_from_row(row: &SqliteRow) -> Result<CatalogEntry, StoreError> {
    let source: String = row.try_get("source")?;
    let source = source.parse::<Source>().map_err(StoreError::CorruptRow)?;

    Ok(CatalogEntry {
        id: row.try_get("id")?,
        raw_name: row.try_get("name")?,
        normalized_key: row.try_get("normalized_name")?,
        category_slug: row.try_get("category")?,
        confidence: row.try_get("confidence")?,
        source,
        usage_count: row.try_get("usage_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Look up many normalized keys with a single query
///
/// Keys without a row are absent from the returned map.
pub async fn batch_lookup(
    pool: &SqlitePool,
    keys: &[String],
) -> Result<HashMap<String, CatalogEntry>, StoreError> {
    if keys.is_empty() {
        return Ok(HashMap::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM products WHERE normalized_name IN (",
        ENTRY_COLUMNS
    ));
    let mut separated = builder.separated(", ");
    for key in keys {
        separated.push_bind(key.as_str());
    }
    separated.push_unseparated(")");

    let rows = builder.build().fetch_all(pool).await?;

    let mut found = HashMap::with_capacity(rows.len());
    for row in &rows {
        let entry = entry_from_row(row)?;
        found.insert(entry.normalized_key.clone(), entry);
    }

    tracing::debug!(requested = keys.len(), found = found.len(), "Catalog batch lookup");

    Ok(found)
}

/// Load one entry by normalized key
pub async fn find_by_key(pool: &SqlitePool, key: &str) -> Result<Option<CatalogEntry>, StoreError> {
    let sql = format!("SELECT {} FROM products WHERE normalized_name = ?", ENTRY_COLUMNS);
    let row = sqlx::query(&sql).bind(key).fetch_optional(pool).await?;

    row.as_ref().map(entry_from_row).transpose()
}

/// Increment usage for all given row ids in one statement
pub async fn batch_increment_usage(pool: &SqlitePool, ids: &[i64]) -> Result<u64, StoreError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "UPDATE products SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP \
         WHERE id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Increment usage addressed by normalized key
///
/// Used when a cached response is served and row ids are not at hand.
pub async fn batch_increment_usage_by_keys(
    pool: &SqlitePool,
    keys: &[String],
) -> Result<u64, StoreError> {
    if keys.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "UPDATE products SET usage_count = usage_count + 1, updated_at = CURRENT_TIMESTAMP \
         WHERE normalized_name IN (",
    );
    let mut separated = builder.separated(", ");
    for key in keys {
        separated.push_bind(key.as_str());
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Insert or update a classification
///
/// - AI-sourced writes are insert-only: an existing row for the key (or the
///   raw name) is left untouched.
/// - Manual writes always win: category, confidence 1.0, source and
///   updated_at are overwritten on conflict.
///
/// Returns `true` when a row was inserted or updated.
pub async fn upsert_classification<'e, E>(
    executor: E,
    entry: &NewClassification<'_>,
) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if !Taxonomy::builtin().is_official(entry.category) {
        return Err(StoreError::UnvalidatedCategory(entry.category.to_string()));
    }

    let result = match entry.source {
        Source::Ai => {
            sqlx::query(
                r#"
                INSERT INTO products (name, normalized_name, category, confidence, source)
                VALUES (?, ?, ?, ?, 'ai')
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(entry.raw_name)
            .bind(entry.normalized_key)
            .bind(entry.category)
            .bind(entry.confidence.clamp(0.0, 1.0))
            .execute(executor)
            .await?
        }
        Source::Manual => {
            sqlx::query(
                r#"
                INSERT INTO products (name, normalized_name, category, confidence, source)
                VALUES (?, ?, ?, 1.0, 'manual')
                ON CONFLICT(normalized_name) DO UPDATE SET
                    category = excluded.category,
                    confidence = 1.0,
                    source = 'manual',
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(entry.raw_name)
            .bind(entry.normalized_key)
            .bind(entry.category)
            .execute(executor)
            .await?
        }
    };

    Ok(result.rows_affected() > 0)
}

/// Most used products, optionally filtered by a substring
///
/// The query matches the raw name as typed and the normalized name in
/// canonical form. Ordered by usage descending, then name.
pub async fn list_suggestions(
    pool: &SqlitePool,
    taxonomy: &Taxonomy,
    query: Option<&str>,
    limit: i64,
) -> Result<Vec<Suggestion>, StoreError> {
    let limit = limit.clamp(1, MAX_SUGGESTIONS);
    let query = query.map(str::trim).filter(|q| !q.is_empty());

    let rows = match query {
        Some(q) => {
            let normalized = crate::normalizer::normalize(q);
            sqlx::query(
                r#"
                SELECT name, category, usage_count
                FROM products
                WHERE usage_count > 0
                  AND (name LIKE ? OR normalized_name LIKE ?)
                ORDER BY usage_count DESC, name ASC
                LIMIT ?
                "#,
            )
            .bind(format!("%{}%", q))
            .bind(format!("%{}%", normalized))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT name, category, usage_count
                FROM products
                WHERE usage_count > 0
                ORDER BY usage_count DESC, name ASC
                LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter()
        .map(|row| -> Result<Suggestion, StoreError> {
            let category: String = row.try_get("category")?;
            Ok(Suggestion {
                name: row.try_get("name")?,
                category: taxonomy.validate_and_map(&category).to_string(),
                usage_count: row.try_get("usage_count")?,
            })
        })
        .collect()
}
