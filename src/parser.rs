use crate::ast::{link, Chain, Node, Payload, Quantifier};
use crate::charclass::{self, CharRange};
use crate::error::{ParseError, SyntaxError};

type Result<T> = std::result::Result<T, ParseError>;

/// How deeply groups may nest, counting the implicit outer group.
pub const MAX_NESTING: usize = 250;

/// Recursive-descent parser for regular expressions.
///
/// Every `parse_*` method starts at the cursor. It either consumes a complete
/// construct and returns it, returns `Ok(None)` without moving the cursor when
/// the construct does not start there, or fails hard with a [`ParseError`].
pub struct Parser<'a> {
    pattern: &'a [u8],
    pos: usize,
    next_group_id: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given pattern.
    pub fn new(pattern: &'a [u8]) -> Self {
        Self {
            pattern,
            pos: 0,
            next_group_id: 0,
            depth: 0,
        }
    }

    /// Number of capturing groups allocated so far.
    pub fn group_count(&self) -> usize {
        self.next_group_id
    }

    /// Current offset into the pattern.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn alloc_group_id(&mut self) -> usize {
        let id = self.next_group_id;
        self.next_group_id += 1;
        id
    }

    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.pattern.get(self.pos + offset).copied()
    }

    fn error(&self, kind: SyntaxError) -> ParseError {
        ParseError::new(self.pos, kind)
    }

    /// Parse the whole pattern, which must be a single group such as `(a|b)`.
    pub fn parse(&mut self) -> Result<Node> {
        match self.parse_group()? {
            Some(node) => Ok(node),
            None => Err(self.error(SyntaxError::UnterminatedGroup)),
        }
    }

    /// `Sequence ('|' Sequence)*`
    ///
    /// A single sequence is returned as-is; several become one alternation node.
    fn parse_alternation(&mut self) -> Result<Chain> {
        let mut branches = vec![self.parse_sequence()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            branches.push(self.parse_sequence()?);
        }
        if branches.len() == 1 {
            return Ok(branches.pop().flatten());
        }
        let node = Node::new(Payload::Alternation(branches), Quantifier::ONE);
        Ok(Some(Box::new(node)))
    }

    fn parse_sequence(&mut self) -> Result<Chain> {
        let mut nodes = Vec::new();
        while let Some(node) = self.parse_term()? {
            nodes.push(node);
        }
        Ok(link(nodes))
    }

    fn parse_term(&mut self) -> Result<Option<Node>> {
        if let Some(group) = self.parse_group()? {
            return Ok(Some(group));
        }
        if let Some(bracket) = self.parse_bracket()? {
            return Ok(Some(bracket));
        }
        self.parse_char()
    }

    /// `(...)` followed by an optional quantifier.
    fn parse_group(&mut self) -> Result<Option<Node>> {
        if self.peek() != Some(b'(') {
            return Ok(None);
        }
        if self.depth >= MAX_NESTING {
            return Err(self.error(SyntaxError::NestingTooDeep));
        }
        self.pos += 1;
        self.depth += 1;
        let index = self.alloc_group_id();
        let body = self.parse_alternation()?;
        if self.peek() != Some(b')') {
            return Err(self.error(SyntaxError::UnterminatedGroup));
        }
        self.pos += 1;
        self.depth -= 1;

        let quantifier = self.parse_quantifier()?;
        Ok(Some(Node::new(Payload::Group { index, body }, quantifier)))
    }

    /// `[...]` or `[^...]` followed by an optional quantifier.
    ///
    /// Backslash escapes and Perl classes are honoured inside brackets, so a
    /// literal `\` must be written as `\\`.
    fn parse_bracket(&mut self) -> Result<Option<Node>> {
        if self.peek() != Some(b'[') {
            return Ok(None);
        }
        self.pos += 1;

        let negate = self.peek() == Some(b'^');
        if negate {
            self.pos += 1;
        }

        let mut pending: Vec<u8> = Vec::with_capacity(3);
        let mut ranges = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error(SyntaxError::UnterminatedBracket)),
                Some(b']') => break,
                Some(b'[') if self.peek_at(1) == Some(b':') => {
                    let Some((class, len)) = charclass::posix_class(&self.pattern[self.pos..])
                    else {
                        return Err(self.error(SyntaxError::InvalidPosixClass));
                    };
                    ranges.extend_from_slice(class);
                    self.pos += len;
                }
                Some(b'\\') => {
                    let Some(c) = self.peek_at(1) else {
                        return Err(self.error(SyntaxError::TrailingBackslash));
                    };
                    match charclass::perl_class(c) {
                        Some(class) => ranges.extend(class),
                        None => ranges.push(CharRange::single(charclass::escaped_byte(c))),
                    }
                    self.pos += 2;
                }
                Some(c) => {
                    pending.push(c);
                    self.pos += 1;

                    // `a-b` collapses to a range, otherwise the oldest byte is a literal
                    if let &[from, b'-', to] = pending.as_slice() {
                        ranges.push(CharRange::new(from, to));
                        pending.clear();
                    } else if pending.len() == 3 {
                        ranges.push(CharRange::single(pending.remove(0)));
                    }
                }
            }
        }
        ranges.extend(pending.into_iter().map(CharRange::single));
        self.pos += 1;
        // `[]` and `[^]` alike never match
        let negate = negate && !ranges.is_empty();

        let quantifier = self.parse_quantifier()?;
        Ok(Some(Node::new(Payload::CharClass { negate, ranges }, quantifier)))
    }

    /// A literal, an escape, a Perl class or `.`, followed by an optional quantifier.
    fn parse_char(&mut self) -> Result<Option<Node>> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let payload = match c {
            // only the final byte may close the outermost group
            b')' if self.depth == 1 && self.pos + 1 < self.pattern.len() => {
                return Err(self.error(SyntaxError::UnmatchedParen))
            }
            b')' | b'|' => return Ok(None),
            b'^' | b'$' => return Err(self.error(SyntaxError::UnexpectedMeta(c as char))),
            b'?' | b'+' | b'*' => return Err(self.error(SyntaxError::NothingToRepeat(c as char))),
            b'\\' => {
                let Some(escaped) = self.peek_at(1) else {
                    return Err(self.error(SyntaxError::TrailingBackslash));
                };
                self.pos += 1;
                match charclass::perl_class(escaped) {
                    Some(ranges) => Payload::CharClass {
                        negate: false,
                        ranges,
                    },
                    None => Payload::Literal(charclass::escaped_byte(escaped)),
                }
            }
            // everything except newline
            b'.' => Payload::CharClass {
                negate: true,
                ranges: vec![CharRange::single(b'\n')],
            },
            _ => Payload::Literal(c),
        };
        self.pos += 1;

        let quantifier = self.parse_quantifier()?;
        Ok(Some(Node::new(payload, quantifier)))
    }

    /// `?`, `*`, `+`, `{m}`, `{m,}` or `{m,n}`.
    ///
    /// Malformed brace content is not a quantifier and consumes nothing; only a
    /// missing `}` is an error.
    fn parse_quantifier(&mut self) -> Result<Quantifier> {
        let quantifier = match self.peek() {
            Some(b'?') => Quantifier::ZERO_OR_ONE,
            Some(b'*') => Quantifier::ZERO_OR_MORE,
            Some(b'+') => Quantifier::ONE_OR_MORE,
            Some(b'{') => {
                let rest = &self.pattern[self.pos..];
                let Some(close) = rest.iter().position(|&b| b == b'}') else {
                    return Err(self.error(SyntaxError::UnterminatedBrace));
                };
                let Some(quantifier) = parse_bounds(&rest[1..close]) else {
                    return Ok(Quantifier::ONE);
                };
                self.pos += close + 1;
                return Ok(quantifier);
            }
            _ => return Ok(Quantifier::ONE),
        };
        self.pos += 1;
        Ok(quantifier)
    }
}

/// Parses the inside of `{...}`.
fn parse_bounds(content: &[u8]) -> Option<Quantifier> {
    let mut parts = content.splitn(2, |&b| b == b',');
    let min = parse_number(parts.next()?)?;
    let max = match parts.next() {
        None => min,
        Some([]) => usize::MAX,
        Some(digits) => parse_number(digits)?,
    };
    (min <= max).then_some(Quantifier::new(min, max))
}

fn parse_number(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0usize, |acc, &d| {
        acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
    })
}
