//! Test Helper Utilities
//!
//! Shared utilities for testing balss-classifier

#![allow(dead_code)]

pub mod db_utils;
pub mod log_capture;
pub mod scripted_classifier;

pub use db_utils::{
    create_test_db, create_test_service, get_table_columns, get_table_names, product_count,
    usage_count,
};
pub use log_capture::{capture_logs, LogCapture};
pub use scripted_classifier::{table, Script, ScriptedClassifier};
