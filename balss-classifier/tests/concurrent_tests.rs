//! Integration tests for concurrent access patterns
//!
//! Overlapping requests must not classify the same normalized key twice, and
//! concurrent writers must leave exactly one catalog row per key.

mod helpers;

use helpers::{create_test_db, create_test_service, product_count, usage_count, ScriptedClassifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

fn items(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// In-flight de-duplication
// ============================================================================

#[tokio::test]
async fn test_identical_concurrent_requests_share_ai_call() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let ai = Arc::new(
        ScriptedClassifier::new(&[("piens", "dairy")]).with_delay(Duration::from_millis(100)),
    );
    let (service, _clock) = create_test_service(pool.clone(), ai.clone());

    let input = items(&["piens"]);
    let (first, second) = tokio::join!(
        service.classify_products(&input),
        service.classify_products(&input),
    );

    assert_eq!(first.unwrap().classifications[0].category, "dairy");
    assert_eq!(second.unwrap().classifications[0].category, "dairy");
    assert_eq!(ai.classify_calls(), 1);
    assert_eq!(product_count(&pool).await, 1);
}

#[tokio::test]
async fn test_overlapping_requests_send_shared_key_once() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let ai = Arc::new(
        ScriptedClassifier::new(&[("piens", "dairy"), ("maize", "bakery"), ("alus", "alcohol")])
            .with_delay(Duration::from_millis(100)),
    );
    let (service, _clock) = create_test_service(pool.clone(), ai.clone());

    let first_items = items(&["piens", "maize"]);
    let second_items = items(&["alus", "piens"]);
    let (first, second) = tokio::join!(
        service.classify_products(&first_items),
        service.classify_products(&second_items),
    );

    let second = second.unwrap();
    assert_eq!(first.unwrap().classifications.len(), 2);
    assert_eq!(second.classifications[0].category, "alcohol");
    assert_eq!(second.classifications[1].category, "dairy");

    let sent: Vec<String> = ai.batches().into_iter().flatten().collect();
    assert_eq!(sent.iter().filter(|name| *name == "piens").count(), 1);
    assert_eq!(sent.len(), 3);
    assert_eq!(product_count(&pool).await, 3);
}

// ============================================================================
// Multi-threaded load
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_keep_one_row_per_key() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let ai = Arc::new(
        ScriptedClassifier::new(&[("kafija", "beverages"), ("tēja", "beverages")])
            .with_delay(Duration::from_millis(20)),
    );
    let (service, _clock) = create_test_service(pool.clone(), ai.clone());
    let service = Arc::new(service);

    let mut join_set = JoinSet::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        join_set.spawn(async move {
            // Vary the batch so most requests miss the response cache
            let extra = format!("prece {}", i);
            let input = if i % 2 == 0 {
                items(&["kafija", "tēja"])
            } else {
                items(&["tēja", "kafija", extra.as_str()])
            };
            service.classify_products(&input).await
        });
    }

    while let Some(result) = join_set.join_next().await {
        let response = result.unwrap().unwrap();
        assert!(response
            .classifications
            .iter()
            .take(2)
            .all(|c| c.category == "beverages"));
    }
    service.flush_usage().await;

    // kafija, tēja and five distinct "prece N" items
    assert_eq!(product_count(&pool).await, 7);
    // Every request counts one use per item, whichever path served it
    assert_eq!(usage_count(&pool, "kafija").await, Some(10));
    assert_eq!(usage_count(&pool, "teja").await, Some(10));
    assert_eq!(usage_count(&pool, "prece 3").await, Some(1));
}

// ============================================================================
// Usage flushing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_flushes_wait_for_all_usage() {
    let (_dir, pool) = create_test_db().await.unwrap();
    let ai = Arc::new(ScriptedClassifier::new(&[]));
    let (service, _clock) = create_test_service(pool.clone(), ai);
    let service = Arc::new(service);
    service.learn("piens", "dairy").await.unwrap();

    let mut join_set = JoinSet::new();
    for i in 0..8 {
        let service = Arc::clone(&service);
        join_set.spawn(async move {
            let extra = format!("prece {}", i);
            service
                .classify_products(&items(&["piens", extra.as_str()]))
                .await
                .unwrap();
            service.flush_usage().await;
        });
    }

    let all_done = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(result) = join_set.join_next().await {
            result.unwrap();
        }
    })
    .await;
    assert!(all_done.is_ok(), "flush_usage calls did not complete");

    service.flush_usage().await;
    assert_eq!(usage_count(&pool, "piens").await, Some(9));

    // Tracker still accepts work after overlapping flushes
    service.classify_products(&items(&["piens"])).await.unwrap();
    service.flush_usage().await;
    assert_eq!(usage_count(&pool, "piens").await, Some(10));
}
