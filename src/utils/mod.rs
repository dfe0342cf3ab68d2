//! Utilities
//!
//! Standalone helpers around test packages.

pub mod convert;
