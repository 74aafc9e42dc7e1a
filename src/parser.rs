use tracing::debug;

use crate::{
    ast::{
        BinaryOperator, Block, Capsule, Expr, ExprKind, Func, Ident, Item, Literal, LiteralKind,
        Param, Program, Stmt, StmtKind, UnaryOperator,
    },
    lexer,
    token::{Position, Span, Spanned, Token, TokenKind},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T>;

/// Lexes and parses a whole program.
pub fn parse(src: &str) -> ParseResult<Program> {
    let tokens = lexer::tokenize(src);
    parse_program(&tokens)
}

/// Parses a token sequence (which must end with [`TokenKind::Eof`]) into a
/// program. The first mismatch aborts the parse.
pub fn parse_program(tokens: &[Token]) -> ParseResult<Program> {
    let program = Parser::new(tokens)?.parse_program()?;
    debug!(items = program.items.len(), "parsed program");
    Ok(program)
}

/// Parses a single expression spanning the whole token sequence.
pub fn parse_expr(tokens: &[Token]) -> ParseResult<Expr> {
    let mut p = Parser::new(tokens)?;
    let expr = p.parse_expr()?;
    p.consume(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
}

impl<'tok> Parser<'tok> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::with_capacity(4);
        while !self.is(TokenKind::Eof) {
            let item = match self.peek().kind {
                TokenKind::Capsule => Item::Capsule(self.parse_capsule()?),
                TokenKind::Func => Item::Func(self.parse_func()?),
                _ => {
                    return Err(self.unexpected_any(&[TokenKind::Capsule, TokenKind::Func]));
                }
            };
            items.push(item);
        }
        Ok(Program { items })
    }

    fn parse_capsule(&mut self) -> Result<Capsule> {
        self.consume(TokenKind::Capsule)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Colon)?;
        let body = self.parse_stmts()?;
        self.consume(TokenKind::End)?;
        Ok(Capsule { name, body })
    }

    fn parse_func(&mut self) -> Result<Func> {
        self.consume(TokenKind::Func)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, |p| {
            p.parse_ident().map(|name| Param { name })
        })?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Func { name, params, body })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.consume(TokenKind::Colon)?;
        let stmts = self.parse_stmts()?;
        let end = self.consume(TokenKind::End)?;
        Ok(Block {
            stmts,
            span: start.span.to(end.span),
        })
    }

    /// Parses statements up to (but not including) `end`.
    fn parse_stmts(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.is(TokenKind::End) && !self.is(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.peek().span;
        let (kind, end) = match self.peek().kind {
            TokenKind::Let => {
                self.advance();
                let name = self.parse_ident()?;
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Let { name, value }, end.span)
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.is(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Return(value), end.span)
            }
            TokenKind::If => {
                self.advance();
                self.consume(TokenKind::LParen)?;
                let predicate = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                let then_block = self.parse_block()?;
                let else_block = if self.take(TokenKind::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                let end = else_block.as_ref().unwrap_or(&then_block).span;
                let kind = StmtKind::If {
                    predicate,
                    then_block,
                    else_block,
                };
                (kind, end)
            }
            TokenKind::Loop => {
                self.advance();
                let var = self.parse_ident()?;
                self.consume(TokenKind::From)?;
                let from = self.parse_expr()?;
                self.consume(TokenKind::To)?;
                let to = self.parse_expr()?;
                let body = self.parse_block()?;
                let end = body.span;
                let kind = StmtKind::Loop {
                    var,
                    from,
                    to,
                    body,
                };
                (kind, end)
            }
            TokenKind::Say => {
                self.advance();
                let text = self.consume(TokenKind::String)?.lexeme.clone();
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Say(text), end.span)
            }
            // One token of lookahead tells an assignment from an expression
            // statement that merely starts with a name.
            TokenKind::Identifier if self.peek_nth(1).kind == TokenKind::Assign => {
                let target = self.parse_ident()?;
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Assign { target, value }, end.span)
            }
            _ => {
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::Semicolon)?;
                (StmtKind::Expr(expr), end.span)
            }
        };
        Ok(Stmt {
            kind,
            span: start.to(end),
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: token.lexeme.clone(),
            span: token.span,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// Precedence climbing: folds every binary operator binding at least as
    /// tightly as `min_bp`. The right operand is parsed one level higher, so
    /// each level is left-associative.
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some((bp, op)) = Self::infix_binding_power(self.peek().kind) {
            if bp < min_bp {
                break;
            }
            self.advance(); // Operator
            let rhs = self.parse_expr_bp(bp + 1)?;

            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOperator::Neg,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Tilde => UnaryOperator::Inverse,
            _ => return self.parse_postfix(),
        };
        let token = self.advance();
        let expr = self.parse_unary()?;
        let span = token.span.to(expr.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        })
    }

    /// Parses a primary followed by any number of call suffixes.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.take(TokenKind::LParen) {
            let args = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
            let end = self.consume(TokenKind::RParen)?;
            let span = expr.span.to(end.span);
            expr = Expr {
                kind: ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                span,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        let literal = |kind| {
            ExprKind::Literal(Literal {
                kind,
                text: token.lexeme.clone(),
            })
        };
        let kind = match token.kind {
            TokenKind::Number => literal(LiteralKind::Int),
            TokenKind::Float => literal(LiteralKind::Float),
            TokenKind::String => literal(LiteralKind::String),
            TokenKind::Identifier => ExprKind::Var(Ident {
                name: token.lexeme.clone(),
                span: token.span,
            }),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                return Ok(expr);
            }
            other => {
                let error = Error::UnexpectedTokenInExpr {
                    token: other,
                    lexeme: token.lexeme.clone(),
                };
                return Err(token.span.wrap(error));
            }
        };
        Ok(Expr {
            kind,
            span: token.span,
        })
    }

    /// Parses `item (',' item)*` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter. The list may be empty.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.is(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, BinaryOperator)> {
        let bp = match kind {
            TokenKind::OrOr => (1, BinaryOperator::Or),

            TokenKind::AndAnd => (2, BinaryOperator::And),

            TokenKind::Less => (3, BinaryOperator::Lt),
            TokenKind::LessEq => (3, BinaryOperator::Le),
            TokenKind::Greater => (3, BinaryOperator::Gt),
            TokenKind::GreaterEq => (3, BinaryOperator::Ge),
            TokenKind::EqEq => (3, BinaryOperator::Eq),
            TokenKind::NotEq => (3, BinaryOperator::Ne),

            TokenKind::Plus => (4, BinaryOperator::Add),
            TokenKind::Minus => (4, BinaryOperator::Sub),

            TokenKind::Star => (5, BinaryOperator::Mul),
            TokenKind::Slash => (5, BinaryOperator::Div),
            TokenKind::Percent => (5, BinaryOperator::Mod),

            _ => return None,
        };
        Some(bp)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Result<Parser<'tok>> {
        match tokens.last() {
            Some(last) if last.is_eof() => Ok(Parser { tokens, cursor: 0 }),
            Some(last) => Err(last.span.wrap(Error::MissingEof)),
            None => Err(Span::new(0, 0, Position::START).wrap(Error::MissingEof)),
        }
    }

    /// Returns the current token. Past the end, keeps returning `Eof`.
    fn peek(&self) -> &'tok Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &'tok Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + n).min(last)]
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> &'tok Token {
        let c = self.peek();
        self.cursor += 1;
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails the parse.
    fn consume(&mut self, expect: TokenKind) -> Result<&'tok Token> {
        let c = self.peek();
        if c.kind == expect {
            Ok(self.advance())
        } else {
            Err(c.span.wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }

    fn unexpected_any(&self, expected: &'static [TokenKind]) -> Spanned<Error> {
        let c = self.peek();
        c.span.wrap(Error::UnexpectedAny {
            actual: c.kind,
            expected,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected token {expected:?}, but got {actual:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("expected one of {expected:?}, but got {actual:?}")]
    UnexpectedAny {
        actual: TokenKind,
        expected: &'static [TokenKind],
    },
    #[error("unexpected token {token:?} `{lexeme}` in expression")]
    UnexpectedTokenInExpr { token: TokenKind, lexeme: Box<str> },
    #[error("token stream does not end with Eof")]
    MissingEof,
}
