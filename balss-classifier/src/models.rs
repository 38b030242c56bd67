//! Request/response payloads exposed to the boundary layer

use balss_common::db::Source;
use serde::{Deserialize, Serialize};

/// One resolved item, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Item text exactly as the caller sent it
    pub product: String,
    pub category: String,
    pub confidence: f64,
    pub source: Source,
}

/// Result of `classify_products`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResponse {
    pub classifications: Vec<Classification>,
    /// Served from the response cache
    pub cached: bool,
    /// The AI classifier was called for this request
    pub ai_used: bool,
}

impl ClassificationResponse {
    pub fn empty() -> Self {
        Self {
            classifications: Vec::new(),
            cached: false,
            ai_used: false,
        }
    }
}

/// Result of `correct_names`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectedNames {
    pub corrected_names: Vec<String>,
}

/// Acknowledgement of a manual correction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnAck {
    pub success: bool,
    pub product: String,
    /// Slug actually stored, after alias mapping
    pub category: String,
}

/// Autocomplete suggestion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub name: String,
    pub category: String,
    pub usage_count: i64,
}
