use std::{iter::Peekable, str::Chars};

use crate::token::{Position, Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The buffer always ends with a single [`TokenKind::Eof`] token.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    position: Position,
    current_lo: usize,
    current_start: Position,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            self.skip_whitespace();
            let next = self.scan_token_kind();
            let is_eof = next == TokenKind::Eof;
            self.produce(next);
            if is_eof {
                break;
            }
        }
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        let Some(c) = self.mark_advance() else {
            return Eof;
        };
        match c {
            '+' => self.with_eq(Plus, PlusEq),
            '-' => self.with_eq(Minus, MinusEq),
            '*' => self.with_eq(Star, StarEq),
            '/' => self.with_eq(Slash, SlashEq),
            '=' => self.with_eq(Assign, EqEq),
            '!' => self.with_eq(Bang, NotEq),
            '<' => self.with_eq(Less, LessEq),
            '>' => self.with_eq(Greater, GreaterEq),
            '&' => self.with('&', AndAnd, Unknown),
            '|' => self.with('|', OrOr, Unknown),
            '%' => Percent,
            '~' => Tilde,
            ':' => Colon,
            ';' => Semicolon,
            ',' => Comma,
            '.' => Dot,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '"' => String,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            _ => Unknown,
        }
    }

    /// Picks `double` if the next character is `=`, advancing past it.
    fn with_eq(&mut self, single: TokenKind, double: TokenKind) -> TokenKind {
        self.with('=', double, single)
    }

    fn with(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.advance_with(matched)
        } else {
            otherwise
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';
        while self.peek().is_some_and(valid_identifier_suffix) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        self.digits();
        // A dot only makes a float when a digit follows it.
        let mut ahead = self.iter.clone();
        if ahead.next() == Some('.') && ahead.next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.digits();
            TokenKind::Float
        } else {
            TokenKind::Number
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            position: Position::START,
            current_lo: 0,
            current_start: Position::START,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.current_start = self.position;
        self.advance()
    }

    /// Returns the next character and advances the iterator, keeping track of
    /// the current line and column.
    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        self.cursor += c.len_utf8();
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(c)
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().copied()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new(self.current_lo, self.cursor, self.current_start)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    ///
    /// Strings are scanned here, since their lexeme excludes the quotes.
    fn produce(&mut self, kind: TokenKind) {
        let lexeme = match kind {
            TokenKind::String => self.string_body(),
            TokenKind::Eof => "<EOF>".into(),
            _ => self.substr().into(),
        };
        let span = self.span();
        self.tokens.push(Token::new(kind, lexeme, span));
    }

    /// Consumes raw characters up to the closing quote (or the end of input).
    /// No escape sequences are decoded.
    fn string_body(&mut self) -> Box<str> {
        let body_lo = self.cursor;
        let mut body_hi = body_lo;
        while let Some(c) = self.advance() {
            if c == '"' {
                break;
            }
            body_hi = self.cursor;
        }
        self.src[body_lo..body_hi].into()
    }
}
