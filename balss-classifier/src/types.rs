//! Core types and the AI classifier trait
//!
//! The orchestrator only depends on [`ProductClassifier`], so the HTTP
//! client can be swapped for a scripted implementation in tests.

use crate::error::AiError;
use serde::{Deserialize, Serialize};

/// One `{product, category}` pair as returned by the AI service
///
/// `category` is untrusted until it has gone through the taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiClassification {
    pub product: String,
    pub category: String,
}

impl AiClassification {
    pub fn new(product: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            category: category.into(),
        }
    }
}

/// External classification service
///
/// # Contract
/// - `classify` returns one pair per input, or an error. Each pair names the
///   product it answers for; reply order is only a fallback for pairs whose
///   product cannot be matched. It never substitutes a default category for
///   a failed item.
/// - `correct_names` returns exactly one name per input, in input order.
#[async_trait::async_trait]
pub trait ProductClassifier: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Classify items that have no catalog entry
    async fn classify(&self, items: &[String]) -> Result<Vec<AiClassification>, AiError>;

    /// Fix spelling of item names, keeping brands and qualifiers
    async fn correct_names(&self, items: &[String]) -> Result<Vec<String>, AiError>;
}
