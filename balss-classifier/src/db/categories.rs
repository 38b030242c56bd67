//! Category reference table

use crate::error::StoreError;
use balss_common::db::CategoryEntry;
use sqlx::{Row, SqlitePool};

/// All categories in aisle order
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<CategoryEntry>, StoreError> {
    let rows = sqlx::query(
        "SELECT slug, name, icon, aisle_order FROM categories ORDER BY aisle_order ASC, slug ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<CategoryEntry, StoreError> {
            Ok(CategoryEntry {
                slug: row.try_get("slug")?,
                display_name: row.try_get("name")?,
                icon: row.try_get("icon")?,
                aisle_order: row.try_get("aisle_order")?,
            })
        })
        .collect()
}
