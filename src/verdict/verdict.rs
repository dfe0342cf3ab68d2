/// Verdict classification
///
/// Pure function over what the supervisor observed, the test, and the
/// configured policy. Checks run in a fixed priority order and the first
/// match wins:
///
/// 1. `TLE`     elapsed >= time limit
/// 2. `RE`      exit code present and non-zero
/// 3. `IGNORE`  output checking disabled
/// 4. `NF`      empty output
/// 5. `NOMODEL` no reference output
/// 6. `WA`      comparator rejects the output
/// 7. `OK`
use crate::config::types::{Result, Verdict};
use crate::provider::Test;
use crate::verdict::compare::Comparator;
use std::time::Duration;

/// What one candidate run produced
#[derive(Debug, Clone, Copy)]
pub struct RunEvidence<'a> {
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub output: &'a [u8],
}

/// Knobs that change classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictPolicy {
    /// `None` never yields `TLE`
    pub time_limit: Option<Duration>,
    pub ignore_output: bool,
}

pub struct VerdictClassifier;

impl VerdictClassifier {
    /// Classify a run. Errors only come from producing the test's own data
    /// (a failing generator or model solution) or from the comparator.
    pub fn classify(
        evidence: &RunEvidence<'_>,
        test: &Test,
        policy: &VerdictPolicy,
        comparator: &dyn Comparator,
    ) -> Result<Verdict> {
        if let Some(verdict) = Self::classify_execution(evidence, policy) {
            return Ok(verdict);
        }

        if !test.has_model_output() {
            return Ok(Verdict::NoModel);
        }

        let input = test.input_data()?;
        let model = test.model_output_data()?;
        if comparator.matches(input, evidence.output, model)? {
            Ok(Verdict::Ok)
        } else {
            Ok(Verdict::WrongAnswer)
        }
    }

    /// The steps that need nothing but the run itself: `TLE`, `RE`,
    /// `IGNORE`, `NF`. `None` means the output has to be judged.
    pub fn classify_execution(
        evidence: &RunEvidence<'_>,
        policy: &VerdictPolicy,
    ) -> Option<Verdict> {
        if policy
            .time_limit
            .map_or(false, |limit| evidence.elapsed >= limit)
        {
            return Some(Verdict::TimeLimit);
        }
        if matches!(evidence.exit_code, Some(code) if code != 0) {
            return Some(Verdict::RuntimeError);
        }
        if policy.ignore_output {
            return Some(Verdict::Ignore);
        }
        if evidence.output.is_empty() {
            return Some(Verdict::NoOutput);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test::TestOrigin;
    use crate::verdict::compare::TokenComparator;
    use std::path::Path;

    const LIMIT: Duration = Duration::from_secs(1);

    fn policy(ignore_output: bool) -> VerdictPolicy {
        VerdictPolicy {
            time_limit: Some(LIMIT),
            ignore_output,
        }
    }

    fn evidence(exit_code: Option<i32>, elapsed: Duration, output: &[u8]) -> RunEvidence<'_> {
        RunEvidence {
            exit_code,
            elapsed,
            output,
        }
    }

    fn make_test(dir: &Path, model: Option<&[u8]>) -> Test {
        let input_path = dir.join("v1.in");
        std::fs::write(&input_path, b"3 4\n").unwrap();
        let output_path = model.map(|data| {
            let path = dir.join("v1.out");
            std::fs::write(&path, data).unwrap();
            path
        });
        Test::new(
            "v1".to_string(),
            TestOrigin::Folder {
                input_path,
                output_path,
            },
        )
    }

    fn classify(ev: RunEvidence<'_>, test: &Test, ignore_output: bool) -> Verdict {
        VerdictClassifier::classify(&ev, test, &policy(ignore_output), &TokenComparator).unwrap()
    }

    #[test]
    fn timeout_beats_everything() {
        let dir = tempfile::tempdir().unwrap();
        let test = make_test(dir.path(), Some(b"7\n"));
        assert_eq!(classify(evidence(Some(1), LIMIT, b"wrong"), &test, false), Verdict::TimeLimit);
        assert_eq!(
            classify(evidence(Some(0), LIMIT * 2, b"7\n"), &test, true),
            Verdict::TimeLimit
        );
    }

    #[test]
    fn runtime_error_beats_ignore_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let test = make_test(dir.path(), Some(b"7\n"));
        let short = Duration::from_millis(10);
        assert_eq!(classify(evidence(Some(2), short, b"7\n"), &test, true), Verdict::RuntimeError);
        assert_eq!(classify(evidence(Some(-11), short, b""), &test, false), Verdict::RuntimeError);
    }

    #[test]
    fn ignore_output_skips_checking() {
        let dir = tempfile::tempdir().unwrap();
        let test = make_test(dir.path(), Some(b"7\n"));
        let short = Duration::from_millis(10);
        for output in [&b""[..], b"garbage", b"7\n"] {
            assert_eq!(classify(evidence(Some(0), short, output), &test, true), Verdict::Ignore);
        }
    }

    #[test]
    fn empty_output_then_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let with_model = make_test(dir.path(), Some(b"7\n"));
        let short = Duration::from_millis(10);
        assert_eq!(classify(evidence(Some(0), short, b""), &with_model, false), Verdict::NoOutput);

        let other = tempfile::tempdir().unwrap();
        let without_model = make_test(other.path(), None);
        assert_eq!(
            classify(evidence(Some(0), short, b"7\n"), &without_model, false),
            Verdict::NoModel
        );
    }

    #[test]
    fn comparison_decides_ok_or_wa() {
        let dir = tempfile::tempdir().unwrap();
        let test = make_test(dir.path(), Some(b"7\n"));
        let short = Duration::from_millis(10);
        assert_eq!(classify(evidence(Some(0), short, b" 7 \n\n"), &test, false), Verdict::Ok);
        assert_eq!(classify(evidence(Some(0), short, b"8\n"), &test, false), Verdict::WrongAnswer);
    }

    #[test]
    fn unknown_exit_code_is_not_a_runtime_error() {
        let ev = evidence(None, Duration::from_millis(1), b"x");
        assert_eq!(VerdictClassifier::classify_execution(&ev, &policy(false)), None);
    }

    #[test]
    fn unbounded_limit_never_times_out() {
        let ev = evidence(Some(0), Duration::from_secs(3600), b"x");
        let unbounded = VerdictPolicy {
            time_limit: None,
            ignore_output: true,
        };
        assert_eq!(
            VerdictClassifier::classify_execution(&ev, &unbounded),
            Some(Verdict::Ignore)
        );
    }
}
