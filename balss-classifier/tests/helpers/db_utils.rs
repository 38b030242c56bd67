//! Database Test Utilities
//!
//! Temporary catalog databases and service construction for tests

use anyhow::Result;
use balss_classifier::services::{ClassifierService, ManualClock, ServiceSettings};
use balss_classifier::ProductClassifier;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// Column information from PRAGMA table_info
#[derive(Debug, sqlx::FromRow)]
pub struct ColumnInfo {
    pub cid: i32,
    pub name: String,
    pub r#type: String,
    pub notnull: i32,
    pub dflt_value: Option<String>,
    pub pk: i32,
}

/// Create temporary catalog database with schema and categories
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_products.db");

    let pool = balss_classifier::db::init_database_pool(&db_path).await?;

    Ok((temp_dir, pool))
}

/// Build a service around `classifier` with a hand-driven cache clock
pub fn create_test_service(
    pool: SqlitePool,
    classifier: Arc<dyn ProductClassifier>,
) -> (ClassifierService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let service = ClassifierService::with_clock(
        pool,
        classifier,
        ServiceSettings::default(),
        clock.clone(),
    );
    (service, clock)
}

/// Get table schema information
pub async fn get_table_columns(pool: &SqlitePool, table_name: &str) -> Result<Vec<ColumnInfo>> {
    let query = format!("PRAGMA table_info({})", table_name);
    let columns = sqlx::query_as::<_, ColumnInfo>(&query)
        .fetch_all(pool)
        .await?;
    Ok(columns)
}

/// Get all table names in database
pub async fn get_table_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

/// Number of catalog rows
pub async fn product_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Usage count stored for a normalized key
pub async fn usage_count(pool: &SqlitePool, normalized_key: &str) -> Option<i64> {
    sqlx::query_scalar("SELECT usage_count FROM products WHERE normalized_name = ?")
        .bind(normalized_key)
        .fetch_optional(pool)
        .await
        .unwrap()
}
