//! In-flight de-duplication of AI calls
//!
//! Maps a normalized key to the pending AI batch that will classify it. A
//! request whose unknown items are already being classified awaits the
//! existing batch instead of issuing a second call. Entries are removed when
//! the batch that created them finishes (or is dropped).

use crate::error::AiError;
use crate::normalizer::normalize;
use crate::types::{AiClassification, ProductClassifier};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

type BatchResult = Result<Arc<HashMap<String, AiClassification>>, AiError>;
type PendingBatch = Shared<BoxFuture<'static, BatchResult>>;

/// Item still needing an AI classification
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub key: String,
    pub raw_name: String,
}

#[derive(Default)]
pub struct InFlight {
    pending: Mutex<HashMap<String, PendingBatch>>,
}

/// Removes the leader's entries when its batch completes or is cancelled
struct LeaderGuard<'a> {
    table: &'a InFlight,
    keys: Vec<String>,
    batch: PendingBatch,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.table.lock();
        for key in &self.keys {
            if pending
                .get(key)
                .is_some_and(|batch| batch.ptr_eq(&self.batch))
            {
                pending.remove(key);
            }
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingBatch>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of keys currently being classified
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classify `items`, joining batches already in flight
    ///
    /// Items must be unique by key. Keys not already pending are sent to
    /// `classifier` as one batch and matched to the reply by product name.
    pub async fn resolve(
        &self,
        classifier: Arc<dyn ProductClassifier>,
        items: Vec<PendingItem>,
    ) -> Result<HashMap<String, AiClassification>, AiError> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }

        let requested: Vec<String> = items.iter().map(|item| item.key.clone()).collect();
        let mut joined: Vec<PendingBatch> = Vec::new();
        let mut leading: Vec<PendingItem> = Vec::new();

        // Table lock is released before any await
        let guard = {
            let mut pending = self.lock();
            for item in items {
                match pending.get(&item.key) {
                    Some(batch) => {
                        if !joined.iter().any(|b| b.ptr_eq(batch)) {
                            joined.push(batch.clone());
                        }
                    }
                    None => leading.push(item),
                }
            }

            if leading.is_empty() {
                None
            } else {
                let keys: Vec<String> = leading.iter().map(|item| item.key.clone()).collect();
                let batch = classify_batch(classifier, leading).boxed().shared();
                for key in &keys {
                    pending.insert(key.clone(), batch.clone());
                }
                Some(LeaderGuard {
                    table: self,
                    keys,
                    batch,
                })
            }
        };

        if !joined.is_empty() {
            debug!(
                batches = joined.len(),
                "Joining AI classification already in flight"
            );
        }

        let mut merged: HashMap<String, AiClassification> = HashMap::new();

        if let Some(leader) = &guard {
            let result = leader.batch.clone().await?;
            merged.extend(result.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        drop(guard);

        for batch in joined {
            let result = batch.await?;
            for key in &requested {
                if let Some(classification) = result.get(key) {
                    merged.insert(key.clone(), classification.clone());
                }
            }
        }

        let missing = requested.iter().filter(|key| !merged.contains_key(*key)).count();
        if missing > 0 {
            return Err(AiError::Incomplete {
                expected: requested.len(),
                got: requested.len() - missing,
            });
        }

        merged.retain(|key, _| requested.contains(key));
        Ok(merged)
    }
}

async fn classify_batch(
    classifier: Arc<dyn ProductClassifier>,
    items: Vec<PendingItem>,
) -> BatchResult {
    let raw_names: Vec<String> = items.iter().map(|item| item.raw_name.clone()).collect();

    debug!(
        classifier = classifier.name(),
        item_count = raw_names.len(),
        "Calling AI classifier"
    );
    let pairs = classifier.classify(&raw_names).await?;

    match_pairs(items, pairs).map(Arc::new)
}

/// Assign AI pairs to pending items
///
/// A pair belongs to the item whose key equals the normalized `product` it
/// names. Pairs naming no pending key fall back to their position. Repeated
/// pairs for an already assigned key are ignored. Any item left without a
/// pair makes the whole batch `Incomplete`.
pub fn match_pairs(
    items: Vec<PendingItem>,
    pairs: Vec<AiClassification>,
) -> Result<HashMap<String, AiClassification>, AiError> {
    let expected = items.len();
    let index: HashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.key.as_str(), i))
        .collect();

    let mut assigned: Vec<Option<AiClassification>> = vec![None; expected];
    let mut unnamed: Vec<(usize, AiClassification)> = Vec::new();

    for (pos, pair) in pairs.into_iter().enumerate() {
        match index.get(normalize(&pair.product).as_str()) {
            Some(&i) if assigned[i].is_none() => assigned[i] = Some(pair),
            Some(_) => debug!(product = %pair.product, "Ignoring repeated AI pair"),
            None => unnamed.push((pos, pair)),
        }
    }

    for (pos, pair) in unnamed {
        match assigned.get_mut(pos) {
            Some(slot) if slot.is_none() => {
                debug!(product = %pair.product, pos, "AI pair matched by position");
                *slot = Some(pair);
            }
            _ => warn!(product = %pair.product, "Ignoring unmatched AI pair"),
        }
    }

    let got = assigned.iter().filter(|slot| slot.is_some()).count();
    if got < expected {
        return Err(AiError::Incomplete { expected, got });
    }

    Ok(items
        .into_iter()
        .zip(assigned)
        .filter_map(|(item, pair)| pair.map(|pair| (item.key, pair)))
        .collect())
}
