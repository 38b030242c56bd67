//! Database initialization
//!
//! Opens (or creates) the product database, creates the schema and seeds the
//! category reference table. Every step is idempotent.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Built-in shopping categories: (slug, display name, icon, aisle order)
///
/// This is the fixed taxonomy. `other` is the catch-all.
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str, i64)] = &[
    ("vegetables", "Dārzeņi", "🥕", 10),
    ("fruits", "Augļi", "🍎", 20),
    ("meat", "Gaļa", "🥩", 30),
    ("fish", "Zivis", "🐟", 40),
    ("dairy", "Piena produkti", "🧀", 50),
    ("eggs", "Olas", "🥚", 55),
    ("bakery", "Maize", "🍞", 60),
    ("grains", "Graudi", "🌾", 70),
    ("condiments", "Garšvielas", "🧂", 75),
    ("snacks", "Uzkodas", "🍫", 80),
    ("ready_meals", "Gatavie ēdieni", "🧊", 90),
    ("beverages", "Dzērieni", "🥤", 100),
    ("alcohol", "Alkohols", "🍷", 105),
    ("household", "Mājsaimniecība", "🧴", 200),
    ("hygiene", "Higiēna", "🧼", 210),
    ("pet", "Mājdzīvniekiem", "🐾", 220),
    ("international", "Starptautiskie", "🌍", 230),
    ("construction", "Būvniecība", "🧱", 240),
    ("other", "Citi", "📦", 999),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL allows concurrent readers alongside the single writer
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and seed categories on an already open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_products_table(pool).await?;
    create_categories_table(pool).await?;
    seed_categories(pool).await?;
    Ok(())
}

async fn create_products_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            normalized_name TEXT UNIQUE NOT NULL,
            category TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 1.0 CHECK (confidence >= 0.0 AND confidence <= 1.0),
            source TEXT NOT NULL DEFAULT 'ai' CHECK (source IN ('ai', 'manual')),
            usage_count INTEGER NOT NULL DEFAULT 1 CHECK (usage_count >= 1),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_usage ON products(usage_count DESC, name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_categories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            aisle_order INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert any missing built-in categories
async fn seed_categories(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (slug, name, icon, aisle_order) in DEFAULT_CATEGORIES {
        sqlx::query(
            "INSERT OR IGNORE INTO categories (name, icon, slug, aisle_order) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(icon)
        .bind(slug)
        .bind(aisle_order)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}
