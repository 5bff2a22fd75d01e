//! Extended glob matching for release-branch patterns.
//!
//! Branch configurations mix literal names with bash-style extended globs
//! such as `+([0-9])?(.{+([0-9]),x}).x`. This crate compiles those patterns
//! into anchored regular expressions once and matches branch names against
//! them.
//!
//! Supported syntax:
//!
//! | glob | meaning |
//! |---|---|
//! | `*` | any run of characters except `/` |
//! | `**` | any run of characters |
//! | `?` | one character except `/` |
//! | `[abc]`, `[a-z]`, `[!a]`, `[[:digit:]]` | character classes |
//! | `{a,b}` | brace alternation (nestable) |
//! | `?(a\|b)` | zero or one occurrence |
//! | `*(a\|b)` | zero or more occurrences |
//! | `+(a\|b)` | one or more occurrences |
//! | `@(a\|b)` | exactly one occurrence |
//! | `\x` | literal `x` |
//!
//! Negated groups (`!(...)`) are rejected.
//!
//! # Example
//!
//! ```
//! use conveyor_glob::Glob;
//!
//! let maintenance = Glob::new("+([0-9])?(.{+([0-9]),x}).x").expect("valid glob");
//! assert!(maintenance.is_match("5.x"));
//! assert!(maintenance.is_match("5.1.x"));
//! assert!(!maintenance.is_match("555"));
//! ```

use regex::Regex;

/// Errors produced while compiling a glob.
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("unbalanced `{open}` in glob pattern `{pattern}`")]
    Unbalanced { pattern: String, open: char },
    #[error("negated extglob groups are not supported: `{pattern}`")]
    UnsupportedNegation { pattern: String },
    #[error("glob pattern `{pattern}` produced an invalid expression")]
    Regex {
        pattern: String,
        source: regex::Error,
    },
}

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let body = Translator::new(pattern).translate()?;
        let regex = Regex::new(&format!("^(?:{body})$")).map_err(|source| GlobError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Whether the whole candidate matches the pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Compile `pattern` and test `candidate` against it.
pub fn matches(pattern: &str, candidate: &str) -> Result<bool, GlobError> {
    Ok(Glob::new(pattern)?.is_match(candidate))
}

struct Translator<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Translator<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            chars: pattern.chars().collect(),
            pos: 0,
        }
    }

    fn translate(mut self) -> Result<String, GlobError> {
        self.sequence(&[])
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn unbalanced(&self, open: char) -> GlobError {
        GlobError::Unbalanced {
            pattern: self.pattern.to_string(),
            open,
        }
    }

    /// Translate until end of input or an unconsumed character in `stops`.
    fn sequence(&mut self, stops: &[char]) -> Result<String, GlobError> {
        let mut out = String::new();

        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
            let next = self.peek();

            match (c, next) {
                ('\\', Some(escaped)) => {
                    self.pos += 1;
                    push_literal(&mut out, escaped);
                }
                ('*', Some('(')) => {
                    self.pos += 1;
                    let alternatives = self.group()?;
                    out.push_str(&format!("(?:{alternatives})*"));
                }
                ('*', Some('*')) => {
                    self.pos += 1;
                    out.push_str(".*");
                }
                ('*', _) => out.push_str("[^/]*"),
                ('?', Some('(')) => {
                    self.pos += 1;
                    let alternatives = self.group()?;
                    out.push_str(&format!("(?:{alternatives})?"));
                }
                ('?', _) => out.push_str("[^/]"),
                ('+', Some('(')) => {
                    self.pos += 1;
                    let alternatives = self.group()?;
                    out.push_str(&format!("(?:{alternatives})+"));
                }
                ('@', Some('(')) => {
                    self.pos += 1;
                    let alternatives = self.group()?;
                    out.push_str(&format!("(?:{alternatives})"));
                }
                ('!', Some('(')) => {
                    return Err(GlobError::UnsupportedNegation {
                        pattern: self.pattern.to_string(),
                    });
                }
                ('[', _) => match self.class() {
                    Some(class) => out.push_str(&class),
                    None => push_literal(&mut out, '['),
                },
                ('{', _) => {
                    let braces = self.braces()?;
                    out.push_str(&braces);
                }
                (other, _) => push_literal(&mut out, other),
            }
        }

        Ok(out)
    }

    /// Body of an extglob group; the opening `(` is already consumed.
    fn group(&mut self) -> Result<String, GlobError> {
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(self.sequence(&['|', ')'])?);
            match self.peek() {
                Some('|') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(alternatives.join("|"));
                }
                _ => return Err(self.unbalanced('(')),
            }
        }
    }

    /// Brace alternation; the opening `{` is already consumed.
    fn braces(&mut self) -> Result<String, GlobError> {
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(self.sequence(&[',', '}'])?);
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unbalanced('{')),
            }
        }

        // `{a}` has nothing to alternate and stays literal, as in bash.
        if alternatives.len() == 1 {
            return Ok(format!(r"\{{{}\}}", alternatives[0]));
        }
        Ok(format!("(?:{})", alternatives.join("|")))
    }

    /// Character class; the opening `[` is already consumed. Returns `None`
    /// (and rewinds) when the class is never closed.
    fn class(&mut self) -> Option<String> {
        let start = self.pos;
        let mut out = String::from("[");

        if matches!(self.peek(), Some('!' | '^')) {
            self.pos += 1;
            out.push('^');
        }

        let mut first = true;
        loop {
            let Some(c) = self.peek() else {
                self.pos = start;
                return None;
            };
            self.pos += 1;

            match c {
                ']' if !first => {
                    out.push(']');
                    return Some(out);
                }
                '[' if self.peek() == Some(':') => match self.posix_class() {
                    Some(name) => out.push_str(&format!("[:{name}:]")),
                    None => push_class_literal(&mut out, '['),
                },
                '\\' => match self.peek() {
                    Some(escaped) => {
                        self.pos += 1;
                        push_class_literal(&mut out, escaped);
                    }
                    None => push_class_literal(&mut out, '\\'),
                },
                '-' => out.push('-'),
                other => push_class_literal(&mut out, other),
            }
            first = false;
        }
    }

    /// `[:name:]` inside a class; positioned on the `:`.
    fn posix_class(&mut self) -> Option<String> {
        let name_start = self.pos + 1;
        let mut end = name_start;
        while end < self.chars.len() && self.chars[end].is_ascii_alphabetic() {
            end += 1;
        }

        let closed = self.chars.get(end) == Some(&':') && self.chars.get(end + 1) == Some(&']');
        if !closed || end == name_start {
            return None;
        }

        let name: String = self.chars[name_start..end].iter().collect();
        self.pos = end + 2;
        Some(name)
    }
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

fn push_class_literal(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~' | '-') {
        out.push('\\');
    }
    out.push(c);
}
