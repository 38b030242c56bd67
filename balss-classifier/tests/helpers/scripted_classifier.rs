//! Scripted AI classifier
//!
//! Answers from a fixed product → category table and records every batch it
//! receives, so tests can assert on how often the AI service was called.

use async_trait::async_trait;
use balss_classifier::{AiClassification, AiError, ProductClassifier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the classifier answers
#[derive(Debug, Clone)]
pub enum Script {
    /// Look items up in the table, unknown items get "other"
    Table(HashMap<String, String>),
    /// Every call fails with this error
    Fail(AiError),
    /// Return one pair fewer than requested
    DropLast(HashMap<String, String>),
    /// Answer from the table in reverse item order
    Reversed(HashMap<String, String>),
}

pub struct ScriptedClassifier {
    script: Mutex<Script>,
    delay: Duration,
    classify_calls: AtomicUsize,
    correct_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<String>>>,
    corrections: Mutex<HashMap<String, String>>,
}

impl ScriptedClassifier {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self::with_script(Script::Table(table(pairs)))
    }

    pub fn failing(error: AiError) -> Self {
        Self::with_script(Script::Fail(error))
    }

    pub fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            delay: Duration::ZERO,
            classify_calls: AtomicUsize::new(0),
            correct_calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            corrections: Mutex::new(HashMap::new()),
        }
    }

    /// Sleep before answering, to keep calls in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_corrections(self, pairs: &[(&str, &str)]) -> Self {
        *self.corrections.lock().unwrap() = table(pairs);
        self
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn correct_calls(&self) -> usize {
        self.correct_calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

/// Product → category map for building scripts
pub fn table(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(product, category)| (product.to_string(), category.to_string()))
        .collect()
}

fn answer(table: &HashMap<String, String>, items: &[String]) -> Vec<AiClassification> {
    items
        .iter()
        .map(|item| {
            let category = table.get(item).map(String::as_str).unwrap_or("other");
            AiClassification::new(item.clone(), category)
        })
        .collect()
}

#[async_trait]
impl ProductClassifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn classify(&self, items: &[String]) -> Result<Vec<AiClassification>, AiError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(items.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Table(table) => Ok(answer(&table, items)),
            Script::Fail(error) => Err(error),
            Script::DropLast(table) => {
                let mut pairs = answer(&table, items);
                pairs.pop();
                Ok(pairs)
            }
            Script::Reversed(table) => {
                let mut pairs = answer(&table, items);
                pairs.reverse();
                Ok(pairs)
            }
        }
    }

    async fn correct_names(&self, items: &[String]) -> Result<Vec<String>, AiError> {
        self.correct_calls.fetch_add(1, Ordering::SeqCst);

        if let Script::Fail(error) = self.script.lock().unwrap().clone() {
            return Err(error);
        }

        let corrections = self.corrections.lock().unwrap();
        Ok(items
            .iter()
            .map(|item| corrections.get(item).cloned().unwrap_or_else(|| item.clone()))
            .collect())
    }
}
