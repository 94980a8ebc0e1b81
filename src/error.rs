use thiserror::Error;

/// What went wrong while parsing a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("unterminated group, did not find closing ')'")]
    UnterminatedGroup,
    #[error("unmatched ')'")]
    UnmatchedParen,
    #[error("groups are nested too deeply")]
    NestingTooDeep,
    #[error("unterminated bracket expression, did not find closing ']'")]
    UnterminatedBracket,
    #[error("unterminated repetition, did not find closing '}}'")]
    UnterminatedBrace,
    #[error("invalid POSIX character class")]
    InvalidPosixClass,
    #[error("unexpected end of pattern after '\\'")]
    TrailingBackslash,
    #[error("unexpected meta character '{0}'")]
    UnexpectedMeta(char),
    #[error("repetition operator '{0}' has nothing to repeat")]
    NothingToRepeat(char),
}

/// A syntax error together with the offset it was found at.
///
/// The offset is measured in the pattern after anchor stripping and wrapping
/// in the implicit outer group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parser error at {offset}: {kind}")]
pub struct ParseError {
    pub offset: usize,
    #[source]
    pub kind: SyntaxError,
}

impl ParseError {
    pub(crate) fn new(offset: usize, kind: SyntaxError) -> Self {
        Self { offset, kind }
    }
}

/// Error returned when compiling a [`Regex`](crate::Regex) fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("failed to construct regex from {pattern:?}")]
    Parse {
        pattern: String,
        #[source]
        source: ParseError,
    },
}

impl Error {
    /// The underlying parse error.
    pub fn parse_error(&self) -> &ParseError {
        match self {
            Error::Parse { source, .. } => source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
