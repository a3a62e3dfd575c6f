#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the operator console.
//!
//! The lexer uses `regal` to produce a bounded token stream; a small
//! `winnow` parser over those tokens classifies each input line. The
//! protocol is deliberately flat: a line is a bare command keyword, a bare
//! integer (consumed by the `new` wizard), or blank. Keywords match
//! case-insensitively.

use core::fmt;
use core::ops::Range;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9]*")]
    Ident,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        span: Range<usize>,
        lexeme: &'a str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl<'a> fmt::Display for GrammarErrorKind<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::UnknownCommand { lexeme, .. } => {
                write!(f, "unknown command `{lexeme}`")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl<'a> fmt::Display for GrammarError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn unknown_command(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::UnknownCommand {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl<'a> fmt::Display for ParseError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Operator commands accepted by the rig.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    New,
    Stop,
    Toggle,
    Debug,
}

/// Classified console input line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line {
    /// A recognized command keyword.
    Command(Command),
    /// A bare integer, consumed by the `new` wizard prompts.
    Number(u32),
    /// Nothing but whitespace.
    Empty,
}

const COMMANDS: &[(&str, Command)] = &[
    ("pause", Command::Pause),
    ("resume", Command::Resume),
    ("new", Command::New),
    ("stop", Command::Stop),
    ("toggle", Command::Toggle),
    ("debug", Command::Debug),
];

/// Looks up a command keyword, ignoring ASCII case.
#[must_use]
pub fn find_command(keyword: &str) -> Option<Command> {
    COMMANDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(keyword))
        .map(|(_, command)| *command)
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        let span = start..end;
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console line.
pub fn parse(line: &str) -> Result<Line, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    for token in tokens.iter() {
        if token.kind == TokenKind::Error {
            return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
        }
    }

    let mut input: Input<'_, '_> = tokens.as_slice();
    let parsed = line_parser()
        .parse_next(&mut input)
        .map_err(|err| match err {
            ErrMode::Backtrack(err) | ErrMode::Cut(err) => ParseError::Grammar(err),
            ErrMode::Incomplete(_) => {
                ParseError::Grammar(GrammarError::unexpected("token", input.first()))
            }
        })?;

    let mut rest = input;
    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(parsed)
}

fn line_parser<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Line, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        None => Ok(Line::Empty),
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(Line::Empty),
        Some((token, rest)) if token.kind == TokenKind::Ident => match find_command(token.lexeme) {
            Some(command) => {
                *input = rest;
                Ok(Line::Command(command))
            }
            None => Err(ErrMode::Cut(GrammarError::unknown_command(token))),
        },
        Some((token, rest)) if token.kind == TokenKind::Integer => {
            let value = parse_integer(token).map_err(ErrMode::Cut)?;
            *input = rest;
            Ok(Line::Number(value))
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "command keyword or integer",
            Some(token),
        ))),
    }
}

fn parse_integer<'a>(token: &Token<'a>) -> Result<u32, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u32>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Line {
        parse(input).expect("line should parse")
    }

    #[test]
    fn parses_every_command_keyword() {
        assert_eq!(parse_ok("pause"), Line::Command(Command::Pause));
        assert_eq!(parse_ok("resume"), Line::Command(Command::Resume));
        assert_eq!(parse_ok("new"), Line::Command(Command::New));
        assert_eq!(parse_ok("stop"), Line::Command(Command::Stop));
        assert_eq!(parse_ok("toggle"), Line::Command(Command::Toggle));
        assert_eq!(parse_ok("debug"), Line::Command(Command::Debug));
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert_eq!(parse_ok("PAUSE"), Line::Command(Command::Pause));
        assert_eq!(parse_ok("StOp"), Line::Command(Command::Stop));
    }

    #[test]
    fn parses_bare_integers() {
        assert_eq!(parse_ok("4"), Line::Number(4));
        assert_eq!(parse_ok("45"), Line::Number(45));
        assert_eq!(parse_ok("  7  "), Line::Number(7));
    }

    #[test]
    fn blank_lines_are_empty() {
        assert_eq!(parse_ok(""), Line::Empty);
        assert_eq!(parse_ok("   "), Line::Empty);
        assert_eq!(parse_ok("\r\n"), Line::Empty);
    }

    #[test]
    fn trailing_newline_is_accepted() {
        assert_eq!(parse_ok("stop\n"), Line::Command(Command::Stop));
        assert_eq!(parse_ok("12\r\n"), Line::Number(12));
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        match parse("reboot") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::UnknownCommand { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        match parse("pause now") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::UnexpectedToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("stop$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn integer_overflow_is_invalid() {
        match parse("99999999999999999999") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("stop$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
