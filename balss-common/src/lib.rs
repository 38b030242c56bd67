//! # Balss Common Library
//!
//! Shared code for the Balss shopping-list services including:
//! - Error type
//! - Bootstrap configuration (TOML, root folder resolution)
//! - Logging initialisation
//! - Database pool, schema and row models

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
