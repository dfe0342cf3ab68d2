//! Output checking and verdict classification
//!
//! Verdicts are pure functions over what a run produced; the comparator
//! that decides `OK` versus `WA` is chosen at startup and passed in.

pub mod checker;
pub mod compare;
pub mod verdict;
