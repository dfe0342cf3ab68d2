//! Configuration
//!
//! Shared types, the error taxonomy, and runner settings loaded from JSON.

pub mod settings;
pub mod types;
