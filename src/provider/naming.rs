//! Test naming conventions: ordering keys and input/output pairing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// Trailing-letters marker of tests that always run after the rest of their set.
pub const RUN_LAST_MARKER: &str = "ocen";

pub const INPUT_EXTENSION: &str = "in";
pub const OUTPUT_EXTENSION: &str = "out";

static TEST_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z_]+)(\d+)([a-zA-Z]*)").expect("test name pattern is valid")
});

/// `(prefix, number, trailing letters)` decomposition of a test name.
///
/// Names that do not start with letters followed by digits sort as
/// `(whole name, 0, "")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestNameKey {
    pub prefix: String,
    pub number: u64,
    pub suffix: String,
}

impl TestNameKey {
    pub fn parse(name: &str) -> Self {
        match TEST_NAME.captures(name) {
            Some(caps) => Self {
                prefix: caps[1].to_string(),
                // Absurdly long digit runs saturate rather than fail.
                number: caps[2].parse().unwrap_or(u64::MAX),
                suffix: caps[3].to_string(),
            },
            None => Self {
                prefix: name.to_string(),
                number: 0,
                suffix: String::new(),
            },
        }
    }

    pub fn runs_last(&self) -> bool {
        self.suffix == RUN_LAST_MARKER
    }
}

/// Final path component, accepting both separator styles.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lowercased extension of the final path component, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    let base = base_name(path);
    match base.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(base[dot + 1..].to_ascii_lowercase()),
    }
}

/// Test name: final path component without its extension.
pub fn test_name_of(path: &str) -> String {
    let base = base_name(path);
    match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_string(),
        _ => base.to_string(),
    }
}

/// Sort input paths into run order.
///
/// Primary order is the [`TestNameKey`] of the file name, so `a2` precedes
/// `a10`. A second stable pass moves every `ocen`-marked test behind the
/// rest while keeping relative order on both sides.
pub fn sort_tests(paths: &mut [String]) {
    paths.sort_by_cached_key(|path| TestNameKey::parse(base_name(path)));
    paths.sort_by(|a, b| match (runs_last(a), runs_last(b)) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => Ordering::Equal,
    });
}

fn runs_last(path: &str) -> bool {
    TestNameKey::parse(base_name(path)).runs_last()
}

/// Where the reference output for `input_path` would live.
///
/// `.in` (any case) becomes `.out`, and every `in` directory segment that is
/// followed by a separator becomes `out`: `in/a1.in` pairs with `out/a1.out`.
pub fn model_output_path(input_path: &str) -> String {
    let mut path = input_path.to_string();
    let ext_len = INPUT_EXTENSION.len() + 1;
    if path.len() >= ext_len
        && path.is_char_boundary(path.len() - ext_len)
        && path[path.len() - ext_len..].eq_ignore_ascii_case(".in")
    {
        path.truncate(path.len() - ext_len);
        path.push_str(".out");
    }

    let mut result = String::with_capacity(path.len() + 4);
    let mut rest = path.as_str();
    while let Some(sep) = rest.find(['/', '\\']) {
        let segment = &rest[..sep];
        result.push_str(if segment == INPUT_EXTENSION {
            OUTPUT_EXTENSION
        } else {
            segment
        });
        result.push_str(&rest[sep..sep + 1]);
        rest = &rest[sep + 1..];
    }
    result.push_str(rest);
    result
}
