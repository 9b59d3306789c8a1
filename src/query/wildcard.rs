//! Full-text wildcard patterns.
//!
//! A pattern is literal text with these wildcard forms:
//!
//! - `.` exactly one character
//! - `.?` zero or one character
//! - `.*` any number of characters
//! - `.+` at least one character
//! - `.{m,n}` between `m` and `n` characters, both at most 255
//!
//! A backslash makes the next character literal (`\.` matches a dot).
//!
//! Candidates are compared as UTF-8 bytes, so lengths derived here are
//! byte lengths. A wildcard character may span up to four bytes.

use regex::bytes::Regex;
use thiserror::Error;

use crate::index::MAX_TOKEN_LEN_LIMIT;

const MAX_UTF8_WIDTH: usize = 4;

/// Rejected wildcard syntax
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WildcardError {
    #[error("empty wildcard pattern")]
    Empty,

    #[error("pattern ends with an unescaped backslash")]
    DanglingEscape,

    #[error("malformed quantifier at offset {0}")]
    BadQuantifier(usize),

    #[error("quantifier minimum {min} exceeds maximum {max}")]
    InvertedRange { min: usize, max: usize },

    #[error("invalid pattern: {0}")]
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(char),
    /// Any `min..=max` characters; `None` is unbounded
    Any { min: usize, max: Option<usize> },
}

/// A compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    prefix: Vec<u8>,
    min_len: usize,
    max_len: Option<usize>,
    regex: Regex,
}

impl WildcardPattern {
    /// Parse and compile a pattern
    pub fn parse(pattern: &str) -> Result<Self, WildcardError> {
        if pattern.is_empty() {
            return Err(WildcardError::Empty);
        }

        let parts = parse_parts(pattern)?;

        let mut prefix = String::new();
        for part in &parts {
            match part {
                Part::Literal(c) => prefix.push(*c),
                Part::Any { .. } => break,
            }
        }

        let mut min_len = 0usize;
        let mut max_len = Some(0usize);
        let mut source = String::from("(?s-m)^");
        for part in &parts {
            match *part {
                Part::Literal(c) => {
                    min_len += c.len_utf8();
                    max_len = max_len.map(|m| m + c.len_utf8());
                    source.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
                }
                Part::Any { min, max } => {
                    min_len += min;
                    max_len = match (max_len, max) {
                        (Some(m), Some(n)) => Some(m + n * MAX_UTF8_WIDTH),
                        _ => None,
                    };
                    match max {
                        Some(n) => source.push_str(&format!(".{{{},{}}}", min, n)),
                        None => source.push_str(&format!(".{{{},}}", min)),
                    }
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| WildcardError::Regex(e.to_string()))?;

        Ok(Self {
            prefix: prefix.into_bytes(),
            min_len,
            max_len,
            regex,
        })
    }

    /// Literal bytes every match starts with
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Shortest possible match in bytes
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Longest possible match in bytes, `None` when unbounded
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    /// Whether the pattern has no wildcard at all
    pub fn is_literal(&self) -> bool {
        self.max_len == Some(self.prefix.len()) && self.min_len == self.prefix.len()
    }

    /// Test a whole token
    pub fn matches(&self, token: &[u8]) -> bool {
        token.starts_with(&self.prefix) && self.regex.is_match(token)
    }
}

fn parse_parts(pattern: &str) -> Result<Vec<Part>, WildcardError> {
    let mut parts = Vec::new();
    let mut chars = pattern.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => parts.push(Part::Literal(escaped)),
                None => return Err(WildcardError::DanglingEscape),
            },
            '.' => {
                let part = match chars.peek().map(|&(_, c)| c) {
                    Some('?') => {
                        chars.next();
                        Part::Any { min: 0, max: Some(1) }
                    }
                    Some('*') => {
                        chars.next();
                        Part::Any { min: 0, max: None }
                    }
                    Some('+') => {
                        chars.next();
                        Part::Any { min: 1, max: None }
                    }
                    Some('{') => {
                        chars.next();
                        let mut body = String::new();
                        loop {
                            match chars.next() {
                                Some((_, '}')) => break,
                                Some((_, c)) => body.push(c),
                                None => return Err(WildcardError::BadQuantifier(offset)),
                            }
                        }
                        let (min, max) = parse_range(&body)
                            .ok_or(WildcardError::BadQuantifier(offset))?;
                        if min > max {
                            return Err(WildcardError::InvertedRange { min, max });
                        }
                        Part::Any { min, max: Some(max) }
                    }
                    _ => Part::Any { min: 1, max: Some(1) },
                };
                parts.push(part);
            }
            _ => parts.push(Part::Literal(c)),
        }
    }

    Ok(parts)
}

/// `m,n` with both bounds at most the longest indexable token length
fn parse_range(body: &str) -> Option<(usize, usize)> {
    let (min, max) = body.split_once(',')?;
    let min: usize = min.trim().parse().ok()?;
    let max: usize = max.trim().parse().ok()?;
    (min <= MAX_TOKEN_LEN_LIMIT && max <= MAX_TOKEN_LEN_LIMIT).then_some((min, max))
}
