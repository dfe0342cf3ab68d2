//! Execution control
//!
//! Binds a candidate program, its comparator and the verdict policy into a
//! [`runner::Runner`] that turns one test into one result.

pub mod runner;
