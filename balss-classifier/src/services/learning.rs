//! Manual corrections
//!
//! A learned category always overwrites whatever the AI stored for the same
//! normalized key. The response cache is left alone; stale cached batches
//! expire with the next interval clear.

use crate::db::catalog::{upsert_classification, NewClassification};
use crate::error::{ClassificationError, ClassificationResult};
use crate::models::LearnAck;
use crate::normalizer::normalize;
use crate::taxonomy::Taxonomy;
use balss_common::db::Source;
use sqlx::SqlitePool;
use tracing::info;

pub async fn learn(
    pool: &SqlitePool,
    taxonomy: &Taxonomy,
    raw_name: &str,
    category: &str,
) -> ClassificationResult<LearnAck> {
    let key = normalize(raw_name);
    if key.is_empty() {
        return Err(ClassificationError::InvalidInput(format!(
            "product name '{}' is empty after normalization",
            raw_name
        )));
    }

    let slug = taxonomy.validate_and_map(category);
    let product = raw_name.trim();

    upsert_classification(
        pool,
        &NewClassification {
            raw_name: product,
            normalized_key: &key,
            category: slug,
            confidence: 1.0,
            source: Source::Manual,
        },
    )
    .await?;

    info!(product = %product, category = %slug, "Learned manual classification");

    Ok(LearnAck {
        success: true,
        product: product.to_string(),
        category: slug.to_string(),
    })
}
