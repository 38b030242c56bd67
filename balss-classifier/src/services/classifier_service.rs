//! Classification orchestrator
//!
//! State progression for `classify_products`:
//! NORMALIZE → CACHE_CHECK → CATALOG_LOOKUP → (ALL_KNOWN | NEED_AI) →
//! AI_RESOLVE → VALIDATE_MERGE → PERSIST → CACHE_STORE → RESPOND
//!
//! Any store or AI failure aborts the whole batch. Usage increments are
//! only dispatched once the batch has succeeded.

use crate::config::ClassifierConfig;
use crate::db::catalog::{self, NewClassification};
use crate::db::categories;
use crate::error::{AiError, ClassificationError, ClassificationResult};
use crate::models::{
    Classification, ClassificationResponse, CorrectedNames, LearnAck, Suggestion,
};
use crate::normalizer::normalize;
use crate::services::inflight::{InFlight, PendingItem};
use crate::services::learning;
use crate::services::openai_client::OpenAiClient;
use crate::services::response_cache::{self, Clock, ResponseCache, SystemClock};
use crate::taxonomy::Taxonomy;
use crate::types::{AiClassification, ProductClassifier};
use balss_common::db::{CatalogEntry, CategoryEntry, Source};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Default number of suggestions returned
pub const DEFAULT_SUGGESTION_LIMIT: i64 = 10;

/// Tunables for the service, independent of the AI client
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub cache_capacity: usize,
    pub cache_clear_interval: Duration,
    pub ai_confidence: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_capacity: crate::config::DEFAULT_CACHE_CAPACITY,
            cache_clear_interval: Duration::from_secs(
                crate::config::DEFAULT_CACHE_CLEAR_INTERVAL_SECS,
            ),
            ai_confidence: crate::config::DEFAULT_AI_CONFIDENCE,
        }
    }
}

impl From<&ClassifierConfig> for ServiceSettings {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            cache_capacity: config.cache_capacity,
            cache_clear_interval: config.cache_clear_interval,
            ai_confidence: config.ai_confidence,
        }
    }
}

/// Shopping-list classification service
pub struct ClassifierService {
    pool: SqlitePool,
    classifier: Arc<dyn ProductClassifier>,
    taxonomy: &'static Taxonomy,
    cache: ResponseCache,
    inflight: InFlight,
    background: TaskTracker,
    flush_lock: tokio::sync::Mutex<()>,
    ai_confidence: f64,
}

impl ClassifierService {
    pub fn new(
        pool: SqlitePool,
        classifier: Arc<dyn ProductClassifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self::with_clock(pool, classifier, settings, Arc::new(SystemClock))
    }

    /// Build with an explicit clock for the response cache
    pub fn with_clock(
        pool: SqlitePool,
        classifier: Arc<dyn ProductClassifier>,
        settings: ServiceSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            classifier = classifier.name(),
            cache_capacity = settings.cache_capacity,
            cache_clear_secs = settings.cache_clear_interval.as_secs(),
            "Classifier service initialized"
        );

        Self {
            pool,
            classifier,
            taxonomy: Taxonomy::builtin(),
            cache: ResponseCache::with_clock(
                settings.cache_capacity,
                settings.cache_clear_interval,
                clock,
            ),
            inflight: InFlight::new(),
            background: TaskTracker::new(),
            flush_lock: tokio::sync::Mutex::new(()),
            ai_confidence: settings.ai_confidence,
        }
    }

    /// Build with the OpenAI client described by `config`
    pub fn from_config(pool: SqlitePool, config: &ClassifierConfig) -> Result<Self, AiError> {
        let client = OpenAiClient::new(config.ai.clone())?;
        Ok(Self::new(pool, Arc::new(client), ServiceSettings::from(config)))
    }

    /// Load configuration, open the catalog in the root folder and build the
    /// production service
    pub async fn open(
        config_path: Option<&Path>,
        root_folder: Option<&str>,
    ) -> balss_common::Result<Self> {
        let toml_config = balss_common::config::load_toml_config(config_path)?;
        if !balss_common::logging::init_tracing(&toml_config.logging) {
            debug!("Tracing subscriber already installed");
        }
        let root = balss_common::config::resolve_root_folder(root_folder, &toml_config);
        std::fs::create_dir_all(&root)?;

        let config = ClassifierConfig::resolve(&toml_config)?;
        let pool = crate::db::init_database_pool(&balss_common::config::database_path(&root)).await?;

        Self::from_config(pool, &config).map_err(|e| balss_common::Error::Config(e.to_string()))
    }

    /// Classify a shopping list, preserving input order
    pub async fn classify_products(
        &self,
        items: &[String],
    ) -> ClassificationResult<ClassificationResponse> {
        if items.is_empty() {
            return Ok(ClassificationResponse::empty());
        }

        // NORMALIZE
        let keys: Vec<String> = items.iter().map(|item| normalize(item)).collect();
        if let Some(pos) = keys.iter().position(String::is_empty) {
            return Err(ClassificationError::InvalidInput(format!(
                "item '{}' is empty after normalization",
                items[pos]
            )));
        }
        let unique_keys = unique_in_order(&keys);

        // CACHE_CHECK
        let signature = response_cache::signature(items);
        if let Some(cached) = self
            .cache
            .get(&signature)
            .and_then(|cached| reorder_for(cached, items))
        {
            debug!(item_count = items.len(), "Response cache hit");
            self.spawn_usage_by_keys(unique_keys);
            return Ok(cached);
        }

        // CATALOG_LOOKUP
        let mut known = catalog::batch_lookup(&self.pool, &unique_keys).await?;

        let unknown: Vec<PendingItem> = unique_keys
            .iter()
            .filter(|key| !known.contains_key(*key))
            .map(|key| {
                let pos = keys.iter().position(|k| k == key).unwrap_or(0);
                PendingItem {
                    key: key.clone(),
                    raw_name: items[pos].trim().to_string(),
                }
            })
            .collect();

        debug!(
            item_count = items.len(),
            known = known.len(),
            unknown = unknown.len(),
            "Catalog lookup complete"
        );

        // AI_RESOLVE + PERSIST
        let ai_used = !unknown.is_empty();
        let resolved = if ai_used {
            let resolved = self
                .inflight
                .resolve(Arc::clone(&self.classifier), unknown.clone())
                .await?;
            let mut validated = self.validate_ai_results(resolved);
            let superseded = self.persist_ai_results(&unknown, &validated).await?;

            // Rows written by someone else while the AI call ran take precedence
            if !superseded.is_empty() {
                let stored = catalog::batch_lookup(&self.pool, &superseded).await?;
                debug!(
                    superseded = stored.len(),
                    "Using stored rows in place of AI results"
                );
                for (key, entry) in stored {
                    validated.remove(&key);
                    known.insert(key, entry);
                }
            }
            validated
        } else {
            HashMap::new()
        };

        // VALIDATE_MERGE
        let classifications = items
            .iter()
            .zip(&keys)
            .map(|(item, key)| self.merge_one(item, key, &known, &resolved))
            .collect::<ClassificationResult<Vec<_>>>()?;

        let response = ClassificationResponse {
            classifications,
            cached: false,
            ai_used,
        };

        // Batch succeeded, usage can be recorded now
        let hit_ids: Vec<i64> = known.values().map(|entry| entry.id).collect();
        self.spawn_usage_by_ids(hit_ids);

        // CACHE_STORE
        self.cache.put(signature, response.clone());

        info!(
            item_count = items.len(),
            known = known.len(),
            ai_classified = resolved.len(),
            ai_used,
            "Classified products"
        );

        Ok(response)
    }

    /// Map AI categories onto the taxonomy, keyed by normalized key
    fn validate_ai_results(
        &self,
        resolved: HashMap<String, AiClassification>,
    ) -> HashMap<String, String> {
        resolved
            .into_iter()
            .map(|(key, pair)| {
                let slug = self.taxonomy.validate_and_map(&pair.category).to_string();
                (key, slug)
            })
            .collect()
    }

    /// Store every AI result of this request in one transaction
    ///
    /// Returns the keys that already had a row, which was left untouched.
    async fn persist_ai_results(
        &self,
        unknown: &[PendingItem],
        validated: &HashMap<String, String>,
    ) -> ClassificationResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;
        let mut superseded = Vec::new();

        for item in unknown {
            let Some(slug) = validated.get(&item.key) else {
                continue;
            };
            let written = catalog::upsert_classification(
                &mut *tx,
                &NewClassification {
                    raw_name: &item.raw_name,
                    normalized_key: &item.key,
                    category: slug,
                    confidence: self.ai_confidence,
                    source: Source::Ai,
                },
            )
            .await?;
            if written {
                inserted += 1;
            } else {
                superseded.push(item.key.clone());
            }
        }

        tx.commit().await?;
        debug!(inserted, "Stored AI classifications");
        Ok(superseded)
    }

    fn merge_one(
        &self,
        item: &str,
        key: &str,
        known: &HashMap<String, CatalogEntry>,
        resolved: &HashMap<String, String>,
    ) -> ClassificationResult<Classification> {
        if let Some(entry) = known.get(key) {
            return Ok(Classification {
                product: item.to_string(),
                category: self.taxonomy.validate_and_map(&entry.category_slug).to_string(),
                confidence: entry.confidence,
                source: entry.source,
            });
        }

        match resolved.get(key) {
            Some(slug) => Ok(Classification {
                product: item.to_string(),
                category: slug.clone(),
                confidence: self.ai_confidence,
                source: Source::Ai,
            }),
            None => Err(AiError::Incomplete {
                expected: resolved.len() + 1,
                got: resolved.len(),
            }
            .into()),
        }
    }

    fn spawn_usage_by_ids(&self, ids: Vec<i64>) {
        if ids.is_empty() {
            return;
        }
        let pool = self.pool.clone();
        self.background.spawn(async move {
            match catalog::batch_increment_usage(&pool, &ids).await {
                Ok(updated) => debug!(updated, "Usage counts incremented"),
                Err(e) => error!(error = %e, "Failed to increment usage counts"),
            }
        });
    }

    fn spawn_usage_by_keys(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        let pool = self.pool.clone();
        self.background.spawn(async move {
            match catalog::batch_increment_usage_by_keys(&pool, &keys).await {
                Ok(updated) => debug!(updated, "Usage counts incremented"),
                Err(e) => error!(error = %e, "Failed to increment usage counts"),
            }
        });
    }

    /// Wait for all background usage increments dispatched so far
    ///
    /// Concurrent callers are serialized so one caller's reopen cannot
    /// strand another caller's wait.
    pub async fn flush_usage(&self) {
        let _flushing = self.flush_lock.lock().await;
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Fix spelling of item names
    ///
    /// Does not touch the catalog or the response cache.
    pub async fn correct_names(&self, items: &[String]) -> ClassificationResult<CorrectedNames> {
        if items.is_empty() {
            return Ok(CorrectedNames {
                corrected_names: Vec::new(),
            });
        }

        let corrected_names = self.classifier.correct_names(items).await?;
        debug!(item_count = items.len(), "Corrected product names");
        Ok(CorrectedNames { corrected_names })
    }

    /// Record a manual classification
    pub async fn learn(&self, raw_name: &str, category: &str) -> ClassificationResult<LearnAck> {
        learning::learn(&self.pool, self.taxonomy, raw_name, category).await
    }

    /// Most used products, optionally filtered
    pub async fn list_suggestions(
        &self,
        query: Option<&str>,
        limit: Option<i64>,
    ) -> ClassificationResult<Vec<Suggestion>> {
        let limit = limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
        Ok(catalog::list_suggestions(&self.pool, self.taxonomy, query, limit).await?)
    }

    /// All categories in aisle order
    pub async fn list_categories(&self) -> ClassificationResult<Vec<CategoryEntry>> {
        Ok(categories::list_categories(&self.pool).await?)
    }
}

/// Lay a cached response out in the order of `items`
///
/// The signature ignores order, so a permuted request hits the same entry.
fn reorder_for(cached: ClassificationResponse, items: &[String]) -> Option<ClassificationResponse> {
    let by_product: HashMap<&str, &Classification> = cached
        .classifications
        .iter()
        .map(|c| (c.product.as_str(), c))
        .collect();

    let classifications = items
        .iter()
        .map(|item| by_product.get(item.as_str()).map(|c| (*c).clone()))
        .collect::<Option<Vec<_>>>()?;

    Some(ClassificationResponse {
        classifications,
        cached: true,
        ai_used: false,
    })
}

fn unique_in_order(keys: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_in_order() {
        let keys: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_in_order(&keys), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_reorder_for_permuted_request() {
        let entry = |product: &str, category: &str| Classification {
            product: product.to_string(),
            category: category.to_string(),
            confidence: 0.8,
            source: Source::Ai,
        };
        let cached = ClassificationResponse {
            classifications: vec![entry("piens", "dairy"), entry("maize", "bakery")],
            cached: false,
            ai_used: true,
        };
        let items = vec!["maize".to_string(), "piens".to_string()];

        let reordered = reorder_for(cached.clone(), &items).unwrap();
        assert!(reordered.cached);
        assert!(!reordered.ai_used);
        assert_eq!(reordered.classifications[0].product, "maize");
        assert_eq!(reordered.classifications[1].category, "dairy");

        assert!(reorder_for(cached, &["alus".to_string()]).is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = ClassifierConfig {
            ai: crate::config::AiClientConfig {
                api_key: "k".to_string(),
                base_url: "http://localhost".to_string(),
                model: "m".to_string(),
                request_timeout: Duration::from_secs(1),
            },
            cache_capacity: 5,
            cache_clear_interval: Duration::from_secs(10),
            ai_confidence: 0.7,
        };

        let settings = ServiceSettings::from(&config);
        assert_eq!(settings.cache_capacity, 5);
        assert_eq!(settings.cache_clear_interval, Duration::from_secs(10));
        assert_eq!(settings.ai_confidence, 0.7);
    }
}
