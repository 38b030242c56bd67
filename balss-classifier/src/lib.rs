//! balss-classifier library interface
//!
//! Classifies Latvian shopping-list items into store categories. Known items
//! come from the product catalog; unknown ones go to the AI classifier and
//! are remembered for next time.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod services;
pub mod taxonomy;
pub mod types;

pub use crate::config::ClassifierConfig;
pub use crate::error::{AiError, ClassificationError, ClassificationResult, StoreError};
pub use crate::models::{
    Classification, ClassificationResponse, CorrectedNames, LearnAck, Suggestion,
};
pub use crate::normalizer::normalize;
pub use crate::services::{ClassifierService, ServiceSettings};
pub use crate::taxonomy::{validate_and_map_category, Taxonomy};
pub use crate::types::{AiClassification, ProductClassifier};
