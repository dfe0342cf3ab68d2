//! testbox: runs contest solutions against many tests and classifies every run
//!
//! # Architecture
//!
//! ## Process Supervision ([`core`])
//! - [`core::supervisor`]: Spawn, stdin/stdout relays, wall-clock deadline, reap
//! - [`core::relay`]: Chunked background copy between a pipe and a buffer
//! - [`core::interpreter`]: File extension to interpreter command mapping
//!
//! ## Verdicts ([`verdict`])
//! - [`verdict::verdict`]: Ordered verdict classification
//! - [`verdict::compare`]: Token-per-line comparison (boolean and first difference)
//! - [`verdict::checker`]: External checker programs
//!
//! ## Execution ([`exec`], [`driver`])
//! - [`exec::runner`]: One test in, one classified result out
//! - [`driver`]: Sequential and pooled scheduling, stop conditions, result sinks
//! - [`driver::console`]: Interactive checking report
//! - [`driver::archive`]: Zip package output
//!
//! ## Test Sources ([`provider`])
//! - [`provider::archive`]: Tests inside a zip archive
//! - [`provider::folder`]: Tests in a directory tree
//! - [`provider::generator`]: Tests produced by a generator program
//! - [`provider::naming`]: Test ordering and input/output pairing
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Verdicts, run results, error taxonomy
//! - [`config::settings`]: JSON runner settings
//!
//! ## Utilities ([`utils`])
//! - [`utils::convert`]: Tar to zip conversion
//!
//! # Design Principles
//!
//! 1. **Outcomes are data** - crashes, timeouts and wrong output are verdicts, not errors
//! 2. **Nothing outlives a run** - every child is reaped and every relay joined
//! 3. **Bad test data stops everything** - a failing generator aborts the whole run

// Process supervision
pub mod core;

// Verdicts
pub mod verdict;

// Execution
pub mod exec;
pub mod driver;

// Test sources
pub mod provider;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring shared by the testbox binaries.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
