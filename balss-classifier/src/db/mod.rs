//! Database access for balss-classifier
//!
//! Shared SQLite database (`products.db` in the root folder)

pub mod catalog;
pub mod categories;

use balss_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the file, the schema and the category seed when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    balss_common::db::init_database(db_path).await
}
