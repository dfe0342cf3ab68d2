//! Line-oriented token comparison.
//!
//! Both streams are walked one line at a time; each line is split on ASCII
//! whitespace, so spacing differences and blank-vs-empty lines never matter.
//! Only the token sequence of each line pair is compared.

use crate::config::types::Result;
use std::fmt;
use std::io::{self, BufRead};

/// Where and how a produced output first departs from the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    /// 1-based line number of the first differing line pair
    pub line: usize,
    pub kind: DifferenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DifferenceKind {
    /// Same position, different token
    TokenMismatch { read: String, expected: String },
    /// Produced line ended before the model line did
    MissingToken { expected: String },
    /// Produced line continues past the end of the model line
    ExtraContent,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DifferenceKind::TokenMismatch { read, expected } => {
                write!(f, "Line {}: read {} expected {}", self.line, read, expected)
            }
            DifferenceKind::MissingToken { expected } => {
                write!(f, "Line {}: end of line, expected {}", self.line, expected)
            }
            DifferenceKind::ExtraContent => {
                write!(f, "Line {}: extra content at the end of line", self.line)
            }
        }
    }
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Reads lines and hands back their tokens; `None` once the stream is exhausted.
struct TokenLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> TokenLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    fn next_line(&mut self) -> io::Result<Option<Vec<Vec<u8>>>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(
            self.buf
                .split(|b| is_space(*b))
                .filter(|token| !token.is_empty())
                .map(<[u8]>::to_vec)
                .collect(),
        ))
    }
}

/// Boolean comparison: `true` when every line pair carries the same tokens.
pub fn streams_equal<A: BufRead, B: BufRead>(first: A, second: B) -> io::Result<bool> {
    let mut first = TokenLines::new(first);
    let mut second = TokenLines::new(second);

    loop {
        let (a, b) = (first.next_line()?, second.next_line()?);
        if a.is_none() && b.is_none() {
            return Ok(true);
        }
        if a.unwrap_or_default() != b.unwrap_or_default() {
            return Ok(false);
        }
    }
}

/// Diagnostic comparison: the first discrepancy, or `None` when identical.
pub fn first_difference<A: BufRead, B: BufRead>(
    compared: A,
    model: B,
) -> io::Result<Option<Difference>> {
    let mut compared = TokenLines::new(compared);
    let mut model = TokenLines::new(model);
    let mut line = 1;

    loop {
        let (got, want) = (compared.next_line()?, model.next_line()?);
        if got.is_none() && want.is_none() {
            return Ok(None);
        }
        let (got, want) = (got.unwrap_or_default(), want.unwrap_or_default());

        if let Some(kind) = compare_line(&got, &want) {
            return Ok(Some(Difference { line, kind }));
        }
        line += 1;
    }
}

fn compare_line(got: &[Vec<u8>], want: &[Vec<u8>]) -> Option<DifferenceKind> {
    if let Some((read, expected)) = got.iter().zip(want).find(|(g, w)| g != w) {
        return Some(DifferenceKind::TokenMismatch {
            read: String::from_utf8_lossy(read).into_owned(),
            expected: String::from_utf8_lossy(expected).into_owned(),
        });
    }
    if got.len() < want.len() {
        return Some(DifferenceKind::MissingToken {
            expected: String::from_utf8_lossy(&want[got.len()]).into_owned(),
        });
    }
    if got.len() > want.len() {
        return Some(DifferenceKind::ExtraContent);
    }
    None
}

/// Output checking strategy, selected once at startup.
///
/// `matches` drives the verdict; `explain` produces the human-readable
/// reason shown for a failing test.
pub trait Comparator: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, input: &[u8], output: &[u8], model: &[u8]) -> Result<bool>;

    fn explain(&self, input: &[u8], output: &[u8], model: &[u8]) -> Result<Option<String>>;
}

/// Whitespace-insensitive token comparator
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenComparator;

impl Comparator for TokenComparator {
    fn name(&self) -> &str {
        "tokens"
    }

    fn matches(&self, _input: &[u8], output: &[u8], model: &[u8]) -> Result<bool> {
        Ok(streams_equal(output, model)?)
    }

    fn explain(&self, _input: &[u8], output: &[u8], model: &[u8]) -> Result<Option<String>> {
        Ok(first_difference(output, model)?.map(|diff| diff.to_string()))
    }
}
