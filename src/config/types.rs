/// Core types shared across the testbox engine
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single test execution - STABLE TAXONOMY
///
/// Reporting layers and packaged results depend on the exact string codes,
/// so the set is closed and the serialized names never change.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Output matched the reference
    #[serde(rename = "OK")]
    Ok,
    /// Run finished in time with exit code 0 and output checking was disabled
    #[serde(rename = "IGNORE")]
    Ignore,
    /// Elapsed wall-clock time reached the limit
    #[serde(rename = "TLE")]
    TimeLimit,
    /// Non-zero exit code (or fatal signal)
    #[serde(rename = "RE")]
    RuntimeError,
    /// Program produced no output at all
    #[serde(rename = "NF")]
    NoOutput,
    /// Test has no reference output to compare against
    #[serde(rename = "NOMODEL")]
    NoModel,
    /// Output differs from the reference
    #[serde(rename = "WA")]
    WrongAnswer,
}

impl Verdict {
    pub const ALL: [Verdict; 7] = [
        Verdict::Ok,
        Verdict::Ignore,
        Verdict::TimeLimit,
        Verdict::RuntimeError,
        Verdict::NoOutput,
        Verdict::NoModel,
        Verdict::WrongAnswer,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Verdict::Ok => "OK",
            Verdict::Ignore => "IGNORE",
            Verdict::TimeLimit => "TLE",
            Verdict::RuntimeError => "RE",
            Verdict::NoOutput => "NF",
            Verdict::NoModel => "NOMODEL",
            Verdict::WrongAnswer => "WA",
        }
    }

    /// Anything other than `OK` and `IGNORE` counts against the run.
    pub fn is_failure(self) -> bool {
        !matches!(self, Verdict::Ok | Verdict::Ignore)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Verdict {
    type Err = TestboxError;

    fn from_str(s: &str) -> Result<Self> {
        Verdict::ALL
            .into_iter()
            .find(|verdict| verdict.code() == s)
            .ok_or_else(|| TestboxError::Config(format!("unknown verdict code: {s}")))
    }
}

/// Exit code and wall time of one supervised process
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessOutcome {
    /// Exit code; `-signal` for a child killed by a signal
    pub exit_code: Option<i32>,
    /// Wall-clock time from spawn to the termination decision
    pub elapsed: Duration,
    /// Whether the deadline forced termination
    pub killed: bool,
}

/// Result of running the candidate program on one test
#[derive(Clone, Debug)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub output: Vec<u8>,
    pub verdict: Verdict,
}

impl RunResult {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Custom error types for testbox
#[derive(Error, Debug)]
pub enum TestboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Critical error in test {test}: {reason}")]
    Generation { test: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Test {0} has no model output")]
    MissingModelOutput(String),

    #[error("Checker error: {0}")]
    Checker(String),
}

impl From<zip::result::ZipError> for TestboxError {
    fn from(err: zip::result::ZipError) -> Self {
        TestboxError::Archive(err.to_string())
    }
}

impl From<nix::errno::Errno> for TestboxError {
    fn from(err: nix::errno::Errno) -> Self {
        TestboxError::Process(err.to_string())
    }
}

impl From<walkdir::Error> for TestboxError {
    fn from(err: walkdir::Error) -> Self {
        TestboxError::Setup(err.to_string())
    }
}

/// Result type alias for testbox operations
pub type Result<T> = std::result::Result<T, TestboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_codes_are_stable() {
        let codes: Vec<&str> = Verdict::ALL.iter().map(|v| v.code()).collect();
        assert_eq!(codes, ["OK", "IGNORE", "TLE", "RE", "NF", "NOMODEL", "WA"]);
    }

    #[test]
    fn verdict_serializes_to_code() {
        let json = serde_json::to_string(&Verdict::NoModel).unwrap();
        assert_eq!(json, "\"NOMODEL\"");
        let back: Verdict = serde_json::from_str("\"TLE\"").unwrap();
        assert_eq!(back, Verdict::TimeLimit);
    }

    #[test]
    fn verdict_parses_from_code() {
        assert_eq!("WA".parse::<Verdict>().unwrap(), Verdict::WrongAnswer);
        assert!("AC".parse::<Verdict>().is_err());
    }

    #[test]
    fn only_ok_and_ignore_pass() {
        let passing: Vec<Verdict> = Verdict::ALL
            .into_iter()
            .filter(|v| !v.is_failure())
            .collect();
        assert_eq!(passing, [Verdict::Ok, Verdict::Ignore]);
    }
}
