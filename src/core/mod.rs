//! Process supervision core.
//!
//! Core owns the child-process lifecycle: interpreter resolution, stdin/stdout
//! relays, deadline enforcement and reaping. Verdict policy lives in
//! [`crate::verdict`].

pub mod interpreter;
pub mod relay;
pub mod supervisor;
