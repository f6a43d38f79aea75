//! Scanner for dotted/bracketed reference paths.
//!
//! Address strings such as
//! `module.net["a"].provider["registry.rigging.dev/official/aws"].east`
//! are scanned into a flat [`Traversal`] of attribute and index steps
//! before being interpreted by the address parsers. The scanner is shared
//! by the current and legacy provider-address forms; it knows nothing
//! about providers, it only produces steps with byte-accurate
//! [`SourceRange`]s so diagnostics can point at the offending segment.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

use crate::core::RiggingError;

/// Byte range of a token or segment within a parsed input string.
///
/// Ranges are half-open (`start..end`) offsets into the string handed to
/// [`Traversal::parse`]. They exist purely for diagnostics and never
/// participate in address equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRange {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl SourceRange {
    /// Create a range covering `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest range covering both `self` and `other`.
    pub fn covering(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A bracket-index value.
///
/// The scanner accepts quoted strings and unsigned integers. Which of the
/// two a given address position allows is the interpreting parser's
/// decision: module instance steps take either, provider instance keys
/// take strings only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    /// A quoted string index, unescaped.
    String(String),
    /// An integer index.
    Number(u64),
}

impl IndexValue {
    /// Human-readable name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
        }
    }
}

/// One step of a traversal: `.name` or `[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalStep {
    /// An attribute step, `.name` (or the leading bare name).
    Attr {
        /// The attribute name.
        name: String,
        /// Where the name appears in the input.
        range: SourceRange,
    },
    /// An index step, `["key"]` or `[0]`.
    Index {
        /// The index value.
        value: IndexValue,
        /// Where the whole bracket expression appears in the input.
        range: SourceRange,
    },
}

impl TraversalStep {
    /// The source range of this step.
    pub fn range(&self) -> SourceRange {
        match self {
            Self::Attr { range, .. } | Self::Index { range, .. } => *range,
        }
    }
}

/// A scanned reference path: a leading name followed by attribute and
/// index steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    /// The steps in source order. Never empty for a successfully parsed
    /// traversal; the first step is always an [`TraversalStep::Attr`].
    pub steps: Vec<TraversalStep>,
}

impl Traversal {
    /// Scan `input` into a traversal.
    pub fn parse(input: &str) -> Result<Self, RiggingError> {
        Scanner::new(input).scan()
    }

    /// The leading attribute name, e.g. `provider` or `module`.
    pub fn root_name(&self) -> Option<&str> {
        match self.steps.first() {
            Some(TraversalStep::Attr { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// The range covering `steps[from..]`, or the end of the traversal
    /// when `from` is past the last step.
    pub fn range_from(&self, from: usize) -> SourceRange {
        let steps = &self.steps[from.min(self.steps.len())..];
        match (steps.first(), steps.last()) {
            (Some(first), Some(last)) => first.range().covering(last.range()),
            _ => self
                .steps
                .last()
                .map(|s| {
                    let r = s.range();
                    SourceRange::new(r.end, r.end)
                })
                .unwrap_or(SourceRange::new(0, 0)),
        }
    }
}

/// Whether `s` is a bare identifier: a letter or underscore followed by
/// letters, digits, underscores, or hyphens.
///
/// Identifier keys render in the backward-compatible attribute syntax
/// (`.alias`); anything else renders as a bracket index.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn syntax_error(message: impl Into<String>, start: usize, end: usize) -> RiggingError {
    RiggingError::AddressSyntax {
        message: message.into(),
        range: SourceRange::new(start, end),
    }
}

struct Scanner<'a> {
    input: &'a str,
    iter: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            iter: input.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> (usize, Option<char>) {
        match self.iter.peek() {
            Some(&(i, c)) => (i, Some(c)),
            None => (self.input.len(), None),
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }

    fn skip_whitespace(&mut self) {
        while let (_, Some(c)) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan(mut self) -> Result<Traversal, RiggingError> {
        let mut steps = Vec::new();
        self.skip_whitespace();
        if let (i, None) = self.peek() {
            return Err(syntax_error("empty address", i, i));
        }
        steps.push(self.scan_attr()?);
        loop {
            self.skip_whitespace();
            match self.peek() {
                (_, None) => break,
                (_, Some('.')) => {
                    self.bump();
                    self.skip_whitespace();
                    steps.push(self.scan_attr()?);
                }
                (_, Some('[')) => steps.push(self.scan_index()?),
                (i, Some(c)) => {
                    return Err(syntax_error(
                        format!("unexpected character {c:?} in address"),
                        i,
                        i + c.len_utf8(),
                    ));
                }
            }
        }
        Ok(Traversal { steps })
    }

    fn scan_attr(&mut self) -> Result<TraversalStep, RiggingError> {
        let (start, first) = self.peek();
        match first {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            Some(c) => {
                return Err(syntax_error(
                    format!("expected a name, found {c:?}"),
                    start,
                    start + c.len_utf8(),
                ));
            }
            None => {
                return Err(syntax_error("expected a name at end of address", start, start));
            }
        }
        loop {
            let (i, c) = self.peek();
            match c {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                    self.bump();
                }
                _ => {
                    return Ok(TraversalStep::Attr {
                        name: self.input[start..i].to_string(),
                        range: SourceRange::new(start, i),
                    });
                }
            }
        }
    }

    fn scan_index(&mut self) -> Result<TraversalStep, RiggingError> {
        let (start, _) = self.bump().expect("caller checked for '['");
        self.skip_whitespace();
        let value = match self.peek() {
            (_, Some('"')) => IndexValue::String(self.scan_string()?),
            (_, Some(c)) if c.is_ascii_digit() => IndexValue::Number(self.scan_number()?),
            (i, Some(c)) => {
                return Err(syntax_error(
                    format!("index must be a quoted string or integer, found {c:?}"),
                    i,
                    i + c.len_utf8(),
                ));
            }
            (i, None) => {
                return Err(syntax_error("unterminated index in address", start, i));
            }
        };
        self.skip_whitespace();
        match self.peek() {
            (i, Some(']')) => {
                self.bump();
                Ok(TraversalStep::Index {
                    value,
                    range: SourceRange::new(start, i + 1),
                })
            }
            (i, Some(c)) => Err(syntax_error(
                format!("expected ']', found {c:?}"),
                i,
                i + c.len_utf8(),
            )),
            (i, None) => Err(syntax_error("unterminated index in address", start, i)),
        }
    }

    fn scan_string(&mut self) -> Result<String, RiggingError> {
        let (start, _) = self.bump().expect("caller checked for '\"'");
        let mut out = String::new();
        loop {
            match self.bump() {
                Some((_, '"')) => return Ok(out),
                Some((i, '\\')) => match self.bump() {
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((j, c)) => {
                        return Err(syntax_error(
                            format!("invalid escape sequence \\{c}"),
                            i,
                            j + c.len_utf8(),
                        ));
                    }
                    None => {
                        return Err(syntax_error(
                            "unterminated string in address",
                            start,
                            self.input.len(),
                        ));
                    }
                },
                Some((_, c)) => out.push(c),
                None => {
                    return Err(syntax_error(
                        "unterminated string in address",
                        start,
                        self.input.len(),
                    ));
                }
            }
        }
    }

    fn scan_number(&mut self) -> Result<u64, RiggingError> {
        let (start, _) = self.peek();
        let mut end = start;
        while let (i, Some(c)) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
                end = i + c.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..end]
            .parse::<u64>()
            .map_err(|_| syntax_error("integer index out of range", start, end))
    }
}
