//! Classification pipeline services
//!
//! The orchestrator drives the catalog, the response cache, the in-flight
//! table and the AI client through one request.

pub mod classifier_service;
pub mod inflight;
pub mod learning;
pub mod openai_client;
pub mod response_cache;

pub use classifier_service::{ClassifierService, ServiceSettings, DEFAULT_SUGGESTION_LIMIT};
pub use inflight::{InFlight, PendingItem};
pub use openai_client::OpenAiClient;
pub use response_cache::{Clock, ManualClock, ResponseCache, SystemClock};
