/*!
A small backtracking regular expression engine with POSIX ERE flavoured syntax.

Patterns are parsed into a chain of nodes and matched by a backtracking
matcher over bytes, with ASCII semantics.

```rust
use ere_grep::Regex;

let re = Regex::new(r"(\w+)@(\w+)\.com").unwrap();
let submatches = re.find_submatch(b"mail bob@example.com now");
assert_eq!(submatches[0].as_str(), "bob@example.com");
assert_eq!(submatches[1].as_str(), "bob");
assert_eq!(re.replace(b"mail bob@example.com now", b"$2: $1"), b"example: bob");
```

Supported syntax: literals, `.` (anything but `\n`), `[...]` and `[^...]`
with ranges, POSIX classes such as `[:alpha:]` and Perl classes `\d \s \w`
(also outside brackets, with upper case negations), groups, `|`, the greedy
quantifiers `? * + {m} {m,} {m,n}` and a leading `^` / trailing `$`.

Alternation is leftmost-first: `(a|ab)` matches `a` in `ab`.
*/

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

pub mod ast;
pub mod charclass;
mod error;
pub mod matcher;
pub mod parser;

use crate::ast::Node;
use crate::matcher::{Matcher, StackExhausted, DEFAULT_MAX_STACK};
use crate::parser::Parser;

pub use crate::error::{Error, ParseError, Result, SyntaxError};

/// A compiled regular expression.
#[derive(Clone)]
pub struct Regex {
    pattern: String,
    root: Arc<Node>,
    group_count: usize,
    strict_start: bool,
    strict_end: bool,
    options: RegexOptions,
}

#[derive(Debug, Clone, Copy)]
struct RegexOptions {
    max_stack: usize,
    trace: bool,
}

impl Default for RegexOptions {
    fn default() -> Self {
        RegexOptions {
            max_stack: DEFAULT_MAX_STACK,
            trace: false,
        }
    }
}

/// A builder for a [`Regex`] to allow configuring options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexBuilder(RegexOptions);

impl RegexBuilder {
    /// Create a new regex builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the [`Regex`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the pattern could not be parsed.
    pub fn build(&self, pattern: impl Into<String>) -> Result<Regex> {
        Regex::with_options(pattern.into(), self.0)
    }

    /// Limit how many backtrack branches a match attempt may keep pending.
    /// Greedy repetition keeps roughly one per repetition.
    ///
    /// When an attempt runs out, the search stops and reports only the
    /// matches found before it, so no match is ever reported at a later
    /// position than where the true leftmost one might be.
    ///
    /// Default is `1_000_000`.
    pub fn max_stack(&mut self, limit: usize) -> &mut Self {
        self.0.max_stack = limit;
        self
    }

    /// Print every step of the matcher to stderr. Only has an effect in
    /// debug builds.
    pub fn trace(&mut self, yes: bool) -> &mut Self {
        self.0.trace = yes;
        self
    }
}

/// Compile `pattern` with default options.
///
/// # Errors
///
/// Returns an [`Error`] if the pattern could not be parsed.
pub fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
}

impl Regex {
    /// Parse and compile a regex with default options, see [`RegexBuilder`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the pattern could not be parsed.
    pub fn new(pattern: impl Into<String>) -> Result<Regex> {
        RegexBuilder::new().build(pattern)
    }

    fn with_options(pattern: String, options: RegexOptions) -> Result<Regex> {
        let mut inner = pattern.as_str();
        let strict_start = inner.starts_with('^');
        if strict_start {
            inner = &inner[1..];
        }
        let strict_end = inner.ends_with('$') && !ends_with_escape(&inner[..inner.len() - 1]);
        if strict_end {
            inner = &inner[..inner.len() - 1];
        }

        let wrapped = format!("({inner})");
        let to_error = |source| Error::Parse {
            pattern: wrapped.clone(),
            source,
        };
        if ends_with_escape(inner) {
            let source = ParseError::new(wrapped.len() - 2, SyntaxError::TrailingBackslash);
            return Err(to_error(source));
        }

        let mut parser = Parser::new(wrapped.as_bytes());
        let root = parser.parse().map_err(to_error)?;

        Ok(Regex {
            group_count: parser.group_count(),
            pattern,
            root: Arc::new(root),
            strict_start,
            strict_end,
            options,
        })
    }

    /// Returns the original pattern string used to create this regex.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Returns the number of capturing groups, including the implicit group 0
    /// around the whole pattern.
    pub fn captures_len(&self) -> usize {
        self.group_count
    }

    /// Check if the regex matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        !self.find_submatch(haystack).is_empty()
    }

    /// Find the first match and the text of every group.
    ///
    /// Index 0 is the whole match. Groups that did not take part in the match
    /// are empty and positioned at the start of the match. Returns an empty
    /// vector if there is no match.
    pub fn find_submatch<'t>(&self, haystack: &'t [u8]) -> Vec<Submatch<'t>> {
        self.submatches_iter(haystack).next().unwrap_or_default()
    }

    /// Find up to `limit` successive non-overlapping matches, all of them if
    /// `limit` is `None`.
    pub fn find_all_submatches<'t>(&self, haystack: &'t [u8], limit: Option<usize>) -> Vec<Vec<Submatch<'t>>> {
        self.submatches_iter(haystack)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Returns an iterator over successive non-overlapping matches.
    pub fn submatches_iter<'r, 't>(&'r self, haystack: &'t [u8]) -> SubmatchesIter<'r, 't> {
        SubmatchesIter {
            re: self,
            haystack,
            cursor: 0,
            last_end: None,
        }
    }

    /// Expand `template` with the groups of the first match.
    ///
    /// `$N` (any number of digits) is replaced with the text of group `N`, or
    /// with nothing if there is no such group or no match; all other bytes are
    /// copied as is.
    pub fn replace(&self, haystack: &[u8], template: &[u8]) -> Vec<u8> {
        let submatches = self.find_submatch(haystack);
        let mut out = Vec::with_capacity(template.len());
        let mut i = 0;
        while i < template.len() {
            if template[i] == b'$' {
                let digits = template[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                if digits > 0 {
                    let index = template[i + 1..i + 1 + digits].iter().try_fold(0usize, |acc, d| {
                        acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
                    });
                    if let Some(submatch) = index.and_then(|index| submatches.get(index)) {
                        out.extend_from_slice(submatch.as_bytes());
                    }
                    i += 1 + digits;
                    continue;
                }
            }
            out.push(template[i]);
            i += 1;
        }
        out
    }

    /// Attempt a match starting exactly at `start`.
    fn match_at<'t>(&self, haystack: &'t [u8], start: usize) -> Result<Option<Vec<Submatch<'t>>>, StackExhausted> {
        let mut matcher = Matcher::new(haystack, self.group_count)
            .strict_end(self.strict_end)
            .max_stack(self.options.max_stack)
            .trace(self.options.trace);
        let Some(end) = matcher.run(&self.root, start)? else {
            return Ok(None);
        };

        let submatches = matcher
            .captures()
            .iter()
            .map(|span| {
                let span = span.clone().unwrap_or(start..start);
                Submatch {
                    haystack,
                    start: span.start,
                    end: span.end,
                }
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(submatches[0].range(), start..end);
        Ok(Some(submatches))
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Regex").field(&self.pattern).finish()
    }
}

impl FromStr for Regex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Regex> {
        Regex::new(s)
    }
}

/// True if `s` ends in a backslash that is not itself escaped.
fn ends_with_escape(s: &str) -> bool {
    s.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Iterator over successive non-overlapping matches, see [`Regex::submatches_iter`].
#[derive(Debug)]
pub struct SubmatchesIter<'r, 't> {
    re: &'r Regex,
    haystack: &'t [u8],
    cursor: usize,
    last_end: Option<usize>,
}

impl<'r, 't> Iterator for SubmatchesIter<'r, 't> {
    type Item = Vec<Submatch<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor <= self.haystack.len() {
            let start = self.cursor;
            self.cursor += 1;

            if self.re.strict_start && start != 0 && self.haystack[start - 1] != b'\n' {
                continue;
            }
            let submatches = match self.re.match_at(self.haystack, start) {
                Ok(Some(submatches)) => submatches,
                Ok(None) => continue,
                Err(StackExhausted) => {
                    // a later start could hide the leftmost match
                    self.cursor = usize::MAX;
                    return None;
                }
            };

            let end = submatches[0].end();
            // an empty match right where the previous one ended is not a new match
            if end == start && self.last_end == Some(start) {
                continue;
            }
            self.cursor = self.cursor.max(end);
            self.last_end = Some(end);
            return Some(submatches);
        }
        None
    }
}

/// The text matched by a group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Submatch<'t> {
    haystack: &'t [u8],
    start: usize,
    end: usize,
}

impl<'t> Submatch<'t> {
    /// Returns the byte offset of the submatch in the haystack.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the byte offset just past the submatch.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the matched bytes.
    pub fn as_bytes(&self) -> &'t [u8] {
        &self.haystack[self.start..self.end]
    }

    /// Returns the matched text, replacing invalid UTF-8 with U+FFFD.
    pub fn as_str(&self) -> Cow<'t, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    fn texts(submatches: &[Submatch<'_>]) -> Vec<String> {
        submatches.iter().map(|m| m.as_str().into_owned()).collect()
    }

    #[test]
    fn anchors_are_stripped() {
        let re = Regex::new("^ab$").unwrap();
        assert!(re.strict_start);
        assert!(re.strict_end);
        assert_eq!(re.as_str(), "^ab$");
        assert_eq!(re.captures_len(), 1);
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let re = Regex::new(r"a\$").unwrap();
        assert!(!re.strict_end);
        assert!(re.is_match(b"xa$"));
        assert!(!re.is_match(b"xa"));
    }

    #[test]
    fn trailing_backslash() {
        let err = Regex::new("ab\\").unwrap_err();
        assert_eq!(err.parse_error(), &ParseError::new(3, SyntaxError::TrailingBackslash));
        assert_eq!(err.to_string(), r#"failed to construct regex from "(ab\\)""#);
    }

    #[test]
    fn error_offsets_are_in_wrapped_pattern() {
        let err = Regex::new("^a(b").unwrap_err();
        assert_matches!(
            err,
            Error::Parse {
                source: ParseError {
                    offset: 5,
                    kind: SyntaxError::UnterminatedGroup
                },
                ..
            }
        );
    }

    #[test]
    fn from_str() {
        let re: Regex = "a+".parse().unwrap();
        assert!(re.is_match(b"baa"));
    }

    #[test]
    fn submatch_accessors() {
        let re = Regex::new("b(c)").unwrap();
        let m = re.find_submatch(b"abcd");
        assert_eq!(texts(&m), vec!["bc", "c"]);
        assert_eq!(m[0].range(), 1..3);
        assert_eq!(m[1].start(), 2);
        assert_eq!(m[1].len(), 1);
        assert_eq!(m[0].as_bytes(), b"bc");
        assert!(!m[1].is_empty());
    }

    #[test]
    fn strict_start_only_at_line_starts() {
        let re = Regex::new("^ab").unwrap();
        let all = re.find_all_submatches(b"ab ab\nab", None);
        let offsets: Vec<usize> = all.iter().map(|m| m[0].start()).collect();
        assert_eq!(offsets, vec![0, 6]);
    }

    #[test]
    fn empty_matches_advance() {
        let re = Regex::new("x*").unwrap();
        let all = re.find_all_submatches(b"axxb", None);
        let ranges: Vec<Range<usize>> = all.iter().map(|m| m[0].range()).collect();
        assert_eq!(ranges, vec![0..0, 1..3, 4..4]);
    }

    #[test]
    fn empty_haystack() {
        assert!(Regex::new("^$").unwrap().is_match(b""));
        assert!(Regex::new("a*").unwrap().is_match(b""));
        assert!(!Regex::new("a").unwrap().is_match(b""));
    }

    #[test]
    fn limit() {
        let re = Regex::new("a").unwrap();
        assert_eq!(re.find_all_submatches(b"aaa", Some(2)).len(), 2);
        assert_eq!(re.find_all_submatches(b"aaa", Some(0)).len(), 0);
    }

    #[test]
    fn replace_out_of_range_and_overflow() {
        let re = Regex::new("(a)").unwrap();
        assert_eq!(re.replace(b"a", b"[$1][$2][$99999999999999999999999]"), b"[a][][]");
        assert_eq!(re.replace(b"a", b"$x$"), b"$x$");
        assert_eq!(re.replace(b"b", b"<$0>"), b"<>");
    }

    #[test]
    fn stack_limit_is_a_non_match() {
        let re = RegexBuilder::new().max_stack(8).build("^a+$").unwrap();
        assert!(!re.is_match(&[b'a'; 64]));
        assert!(re.is_match(b"aa"));
    }

    #[test]
    fn stack_limit_stops_the_scan() {
        let re = RegexBuilder::new().max_stack(100).build(".*").unwrap();
        let haystack = vec![b'x'; 1_000];
        assert!(re.find_submatch(&haystack).is_empty());
        assert!(re.submatches_iter(&haystack).next().is_none());

        // earlier matches are still reported
        let mut haystack = b"xx\n".to_vec();
        haystack.extend(vec![b'x'; 1_000]);
        let ranges: Vec<Range<usize>> = re
            .find_all_submatches(&haystack, None)
            .iter()
            .map(|m| m[0].range())
            .collect();
        assert_eq!(ranges, vec![0..2]);
    }

    #[test]
    fn long_haystack_matches_from_the_left() {
        let re = Regex::new(".*").unwrap();
        let haystack = vec![b'x'; 15_000];
        assert_eq!(re.find_submatch(&haystack)[0].range(), 0..15_000);
    }

    #[test]
    fn end_anchor_backtracks_into_alternation() {
        let re = Regex::new("^(a|ab)$").unwrap();
        assert_eq!(texts(&re.find_submatch(b"ab")), vec!["ab", "ab"]);
        assert!(!re.is_match(b"abc"));
    }

    #[test]
    fn debug_shows_pattern() {
        assert_eq!(format!("{:?}", Regex::new("a+").unwrap()), r#"Regex("a+")"#);
    }
}
