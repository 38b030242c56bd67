//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provenance of a stored classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Produced by the AI classifier
    Ai,
    /// Confirmed by a user correction
    Manual,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ai => "ai",
            Source::Manual => "manual",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(Source::Ai),
            "manual" => Ok(Source::Manual),
            other => Err(format!("unknown classification source '{}'", other)),
        }
    }
}

/// Row of the `products` table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: i64,
    pub raw_name: String,
    pub normalized_key: String,
    pub category_slug: String,
    /// 1.0 for manual rows
    pub confidence: f64,
    pub source: Source,
    pub usage_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Row of the `categories` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEntry {
    pub slug: String,
    pub display_name: String,
    pub icon: String,
    pub aisle_order: i64,
}
